//! Integration tests for the store harvester
//!
//! A wiremock server stands in for the faceted query endpoint.

use async_trait::async_trait;
use profesia_harvest::config::{
    Config, CrawlerConfig, InputConfig, OutputConfig, SiteConfig, StoreConfig, UserAgentConfig,
};
use profesia_harvest::crawler::HttpFetcher;
use profesia_harvest::storage::{RecordSink, SqliteSink};
use profesia_harvest::store::{
    run_store_harvest, EndpointSession, InterceptedRequest, StoreHarvester, StoreSession,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY_PATH: &str = "/1/indexes/prod_PUBLIC_STORE/query";

fn store_config(server: &MockServer, categories: &[&str]) -> StoreConfig {
    StoreConfig {
        endpoint_url: format!("{}{}", server.uri(), QUERY_PATH),
        api_key: "test-key".to_string(),
        application_id: "TESTAPP".to_string(),
        query: None,
        categories: categories.iter().map(|c| c.to_string()).collect(),
        hits_per_page: 500,
        page_pause_ms: 1,
        facet_wait_ms: 5000,
        settle_ms: 1,
        dataset_id: "store".to_string(),
    }
}

fn create_test_config(server: &MockServer, db_path: &Path, categories: &[&str]) -> Config {
    Config {
        site: SiteConfig::default(),
        input: InputConfig::default(),
        crawler: CrawlerConfig::default(),
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().to_string(),
            dataset_id: "default".to_string(),
            reporting_dataset_id: "REPORTING".to_string(),
        },
        store: Some(store_config(server, categories)),
    }
}

fn fetcher() -> Arc<HttpFetcher> {
    Arc::new(
        HttpFetcher::new(&UserAgentConfig::default(), Duration::from_secs(10))
            .expect("Failed to build fetcher"),
    )
}

fn hits(ids: &[&str], nb_hits: u64) -> ResponseTemplate {
    let hits: Vec<_> = ids
        .iter()
        .map(|id| json!({"objectID": id, "title": format!("Actor {}", id)}))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({"hits": hits, "nbHits": nb_hits}))
}

/// Mounts the AI facet (two pages) and the JOBS facet (one page)
async fn mount_facets(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(header("x-algolia-api-key", "test-key"))
        .and(body_partial_json(json!({"filters": "categories:AI", "page": 0, "hitsPerPage": 500})))
        .respond_with(hits(&["scraper-a", "scraper-b"], 3))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(body_partial_json(json!({"filters": "categories:AI", "page": 1})))
        .respond_with(hits(&["scraper-c"], 3))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(body_partial_json(json!({"filters": "categories:JOBS", "page": 0})))
        .respond_with(hits(&["scraper-b", "jobs-d"], 2))
        .expect(1)
        .mount(server)
        .await;
}

/// Selects every category twice, as a page re-rendering its sidebar would
struct RepeatingSession {
    inner: EndpointSession,
}

#[async_trait]
impl StoreSession for RepeatingSession {
    fn intercept(&mut self, requests: mpsc::Sender<InterceptedRequest>) {
        self.inner.intercept(requests);
    }

    async fn category_texts(&mut self) -> profesia_harvest::Result<Vec<String>> {
        self.inner.category_texts().await
    }

    async fn select_category(&mut self, text: &str) -> profesia_harvest::Result<()> {
        self.inner.select_category(text).await?;
        self.inner.select_category(text).await
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

#[tokio::test]
async fn test_repeated_facet_is_fetched_once_and_merged() {
    let server = MockServer::start().await;
    mount_facets(&server).await;

    let config = store_config(&server, &["AI", "jobs"]);
    let harvester = StoreHarvester::new(config.clone(), fetcher()).unwrap();
    let mut session = RepeatingSession {
        inner: EndpointSession::new(
            harvester.endpoint().clone(),
            profesia_harvest::store::default_headers(&config),
        ),
    };

    let outcome = harvester.harvest(&mut session).await.unwrap();

    assert_eq!(outcome.categories_selected, 2);
    assert_eq!(outcome.intercept.requests_seen, 4);
    assert_eq!(outcome.intercept.facets, 2);
    assert_eq!(outcome.intercept.pages_fetched, 3);
    assert_eq!(outcome.items.len(), 4);

    let shared = outcome
        .items
        .iter()
        .find(|item| item.object_id == "scraper-b")
        .unwrap();
    let mut labels = shared.categories.clone();
    labels.sort();
    assert_eq!(labels, vec!["AI", "JOBS"]);

    let only_ai = outcome
        .items
        .iter()
        .find(|item| item.object_id == "scraper-c")
        .unwrap();
    assert_eq!(only_ai.categories, vec!["AI"]);
    assert_eq!(only_ai.fields["title"], "Actor scraper-c");
}

#[tokio::test]
async fn test_store_harvest_persists_items() {
    let server = MockServer::start().await;
    mount_facets(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("store.db");
    let config = create_test_config(&server, &db_path, &["ai", "jobs"]);

    let outcome = run_store_harvest(config, "hash").await.expect("Harvest failed");
    assert_eq!(outcome.items.len(), 4);

    let sink = SqliteSink::new(&db_path).unwrap();
    let stored = sink.items("store").unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored
        .iter()
        .all(|item| item["categories"].as_array().map_or(false, |c| !c.is_empty())));

    let runs = sink.runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status.to_db_string(), "completed");
}

#[tokio::test]
async fn test_query_override_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(body_partial_json(json!({"filters": "categories:NEWS", "query": "rss"})))
        .respond_with(hits(&[], 0))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = store_config(&server, &["news"]);
    config.query = Some("rss".to_string());
    let harvester = StoreHarvester::new(config.clone(), fetcher()).unwrap();
    let mut session = EndpointSession::new(
        harvester.endpoint().clone(),
        profesia_harvest::store::default_headers(&config),
    );

    let outcome = harvester.harvest(&mut session).await.unwrap();
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.intercept.pages_fetched, 1);
}
