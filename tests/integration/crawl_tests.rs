//! Integration tests for the catalog crawler
//!
//! These tests use wiremock to serve catalog pages and run the full
//! coordinator against a temporary dataset store.

use profesia_harvest::config::{
    Config, CrawlerConfig, DatasetType, InputConfig, OutputConfig, SiteConfig, UserAgentConfig,
};
use profesia_harvest::crawler::Coordinator;
use profesia_harvest::storage::{redaction_marker, RecordSink, SqliteSink};
use std::ops::Range;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing the catalog at the mock server
fn create_test_config(base_url: &str, db_path: &Path, input: InputConfig) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
        },
        input,
        crawler: CrawlerConfig {
            max_concurrency: 2,
            max_request_retries: 1,
            request_timeout_secs: 10,
            listing_timeout_secs: 20,
            retry_backoff_ms: 1,
            detail_pause_ms: 1,
            page_size: 20,
            max_requests_per_crawl: None,
        },
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
        store: None,
    }
}

fn job_offers() -> InputConfig {
    InputConfig {
        dataset_type: Some(DatasetType::JobOffers),
        ..InputConfig::default()
    }
}

/// Listing page with one row per offer id in `ids`
fn listing_html(ids: Range<usize>, total: usize) -> String {
    let rows: String = ids
        .clone()
        .map(|n| {
            format!(
                r#"<li class="list-row"><span class="employer">Employer {n}</span>
                <h2><a href="/praca/employer-{n}/O{id}">Offer {n}</a></h2>
                <span class="job-location">Bratislava</span></li>"#,
                n = n,
                id = 1000 + n
            )
        })
        .collect();

    format!(
        r#"<html><body class="listing">
        <span class="offer-counter">{} - {} z {}</span>
        <ul>{}</ul></body></html>"#,
        ids.start + 1,
        ids.end,
        total,
        rows
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn open_sink(db_path: &Path) -> SqliteSink {
    SqliteSink::new(db_path).expect("Failed to open dataset store")
}

#[tokio::test]
async fn test_entry_limit_spans_two_pages() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("limit.db");

    // More specific mocks first: the first matching mock wins
    Mock::given(method("GET"))
        .and(path("/praca/"))
        .and(query_param("page_num", "2"))
        .respond_with(html(listing_html(20..40, 100)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .and(query_param("page_num", "3"))
        .respond_with(html(listing_html(40..60, 100)))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .respond_with(html(listing_html(0..20, 100)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            max_entries: Some(21),
            ..job_offers()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.records_written, 21);
    assert_eq!(stats.tasks_enqueued, 2);
    assert_eq!(stats.pool.failed, 0);

    let sink = open_sink(&db_path);
    let items = sink.items("default").unwrap();
    assert_eq!(items.len(), 21);
    assert!(items.iter().any(|item| item["offerId"] == "O1020"));
    assert!(!items.iter().any(|item| item["offerId"] == "O1021"));
}

#[tokio::test]
async fn test_count_only_extracts_nothing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("count.db");

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .respond_with(html(listing_html(0..20, 1234)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            count_only: true,
            ..job_offers()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.tasks_enqueued, 1);
    assert_eq!(stats.records_written, 0);
    assert_eq!(open_sink(&db_path).count("default").unwrap(), 0);
}

#[tokio::test]
async fn test_home_page_redirects_to_listing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("redirect.db");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>home</body></html>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .and(query_param("page_num", "2"))
        .respond_with(html(listing_html(0..0, 3)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .respond_with(html(listing_html(0..3, 3)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            start_urls: vec![format!("{}/", mock_server.uri())],
            ..InputConfig::default()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    // home, first listing page, empty second page
    assert_eq!(stats.tasks_enqueued, 3);
    assert_eq!(stats.records_written, 3);
}

#[tokio::test]
async fn test_custom_company_page_is_skipped() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("company.db");

    Mock::given(method("GET"))
        .and(path("/praca/acme/C12345"))
        .respond_with(html(
            r#"<html><body class="listing custom-design">
            <ul><li class="list-row"><h2><a href="/praca/acme/O77">Hidden</a></h2></li></ul>
            </body></html>"#
                .to_string(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            start_urls: vec![format!("{}/praca/acme/C12345", mock_server.uri())],
            ..InputConfig::default()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.pool.succeeded, 1);
    assert_eq!(stats.pool.failed, 0);
    assert_eq!(stats.records_written, 0);

    let sink = open_sink(&db_path);
    assert_eq!(sink.count("REPORTING").unwrap(), 0);
    assert!(sink.failed_requests().unwrap().is_empty());
}

#[tokio::test]
async fn test_detailed_listing_redacts_personal_data() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("detailed.db");

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .and(query_param("page_num", "2"))
        .respond_with(html(listing_html(0..0, 2)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .respond_with(html(listing_html(0..2, 2)))
        .expect(1)
        .mount(&mock_server)
        .await;

    for n in 0..2 {
        Mock::given(method("GET"))
            .and(path(format!("/praca/employer-{}/O{}", n, 1000 + n)))
            .respond_with(html(format!(
                r#"<html><body><div id="content"><div class="container">
                <div id="detail"><div class="card-content">
                  <h1 itemprop="title">Detailed offer {n}</h1>
                  <div class="details-section"><span class="tel">+421 900 000 00{n}</span></div>
                  <div class="company-info"><h3>Kontakt</h3><div>Recruiter {n}</div></div>
                </div></div></div></div></body></html>"#,
                n = n
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            detailed: true,
            ..job_offers()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");
    assert_eq!(stats.records_written, 2);

    let items = open_sink(&db_path).items("default").unwrap();
    for item in &items {
        assert_eq!(item["employerContact"], redaction_marker("employerContact"));
        assert_eq!(item["phoneNumbers"], redaction_marker("phoneNumbers"));
        assert!(item["offerName"]
            .as_str()
            .unwrap()
            .starts_with("Detailed offer"));
        assert!(item["listingUrl"].as_str().unwrap().ends_with("/praca/"));
    }
}

#[tokio::test]
async fn test_failing_listing_is_reported() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("failing.db");

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &db_path, job_offers());

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let run_id = coordinator.run_id();
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.pool.failed, 1);
    assert_eq!(stats.pool.retries, 1);

    let sink = open_sink(&db_path);
    let reports = sink.items("REPORTING").unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["errorName"], "HttpStatusError");
    assert!(reports[0]["pageHtmlSnapshot"].is_null());

    let failed = sink.failed_requests().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].run_id, run_id);
    assert_eq!(failed[0].retry_count, 1);
    assert!(failed[0].url.ends_with("/praca/"));
}

/// Mounts a three-row detailed listing whose second detail page fails once
async fn mount_flaky_detailed_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/praca/"))
        .and(query_param("page_num", "2"))
        .respond_with(html(listing_html(0..0, 3)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/"))
        .respond_with(html(listing_html(0..3, 3)))
        .expect(2)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/praca/employer-1/O1001"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;

    for n in 0..3 {
        Mock::given(method("GET"))
            .and(path(format!("/praca/employer-{}/O{}", n, 1000 + n)))
            .respond_with(html(format!(
                r#"<html><body><div id="content"><div class="container">
                <div id="detail"><div class="card-content">
                  <h1 itemprop="title">Detailed offer {n}</h1>
                </div></div></div></div></body></html>"#,
                n = n
            )))
            .expect(1)
            .mount(server)
            .await;
    }
}

fn offer_ids(db_path: &Path) -> Vec<String> {
    let mut ids: Vec<String> = open_sink(db_path)
        .items("default")
        .unwrap()
        .iter()
        .map(|item| item["offerId"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_retried_detailed_listing_keeps_its_entries_under_limit() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("retry-limit.db");
    mount_flaky_detailed_listing(&mock_server).await;

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            detailed: true,
            max_entries: Some(3),
            ..job_offers()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.pool.retries, 1);
    assert_eq!(stats.pool.failed, 0);
    assert_eq!(stats.tasks_enqueued, 1);
    // three offers plus the report of the failed attempt
    assert_eq!(stats.records_written, 4);
    assert_eq!(offer_ids(&db_path), vec!["O1000", "O1001", "O1002"]);
    assert_eq!(open_sink(&db_path).count("REPORTING").unwrap(), 1);
}

#[tokio::test]
async fn test_retried_detailed_listing_schedules_next_page_once() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("retry-unlimited.db");
    mount_flaky_detailed_listing(&mock_server).await;

    let config = create_test_config(
        &mock_server.uri(),
        &db_path,
        InputConfig {
            detailed: true,
            ..job_offers()
        },
    );

    let mut coordinator = Coordinator::new(config, "hash").expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");

    assert_eq!(stats.pool.retries, 1);
    assert_eq!(stats.pool.failed, 0);
    // first listing page and its successor, enqueued once despite the retry
    assert_eq!(stats.tasks_enqueued, 2);
    assert_eq!(stats.pool.started, 2);
    // three offers plus the report of the failed attempt
    assert_eq!(stats.records_written, 4);
    assert_eq!(offer_ids(&db_path), vec!["O1000", "O1001", "O1002"]);

    let page_two_fetches = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.query() == Some("page_num=2"))
        .count();
    assert_eq!(page_two_fetches, 1);
}
