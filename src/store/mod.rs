//! Marketplace store harvesting
//!
//! Items on the store page only carry their categories implicitly: a
//! category's items are whatever its filtered query returns. The harvester
//! therefore selects every category, lets the [`FacetInterceptor`] page
//! through each facet it sees, and merges the results by `objectID` so each
//! item ends up once, with every category it was found under.

mod facets;
mod intercept;
mod payload;
mod session;

pub use facets::{
    category_by_filter, category_by_text, facet_key, Category, FacetTracker, ItemsById, StoreItem,
    CATEGORIES, UNRECOGNIZED_LABEL,
};
pub use intercept::{FacetInterceptor, FacetPage, FetchSettings, InterceptStats, InterceptedRequest};
pub use payload::{narrow_headers, QueryEndpoint, QueryPayload, QueryResponse, FORWARDED_HEADERS};
pub use session::{EndpointSession, StoreSession};

use crate::config::{Config, StoreConfig};
use crate::crawler::{Fetch, HttpFetcher};
use crate::storage::{PushOptions, RecordPipeline, RecordSink, RunStatus, SqliteSink};
use crate::url::parse_http_url;
use crate::{ConfigError, Result, ScrapeError};
use facets::normalize_text;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

/// Result of one harvest
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub items: Vec<StoreItem>,
    pub categories_selected: usize,
    pub intercept: InterceptStats,
}

/// Headers the store page sends to the query endpoint
pub fn default_headers(config: &StoreConfig) -> Vec<(String, String)> {
    vec![
        ("accept".to_string(), "*/*".to_string()),
        (
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ),
        ("x-algolia-api-key".to_string(), config.api_key.clone()),
        (
            "x-algolia-application-id".to_string(),
            config.application_id.clone(),
        ),
    ]
}

pub struct StoreHarvester {
    config: StoreConfig,
    endpoint: QueryEndpoint,
    fetcher: Arc<dyn Fetch>,
}

impl StoreHarvester {
    pub fn new(config: StoreConfig, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let endpoint = QueryEndpoint::new(parse_http_url(&config.endpoint_url)?);
        Ok(Self {
            config,
            endpoint,
            fetcher,
        })
    }

    pub fn endpoint(&self) -> &QueryEndpoint {
        &self.endpoint
    }

    /// Selects the configured categories on `session` and collects every item
    ///
    /// Returns once the session is closed and every facet loop has finished.
    pub async fn harvest<S: StoreSession>(&self, session: &mut S) -> Result<HarvestOutcome> {
        let tracker = FacetTracker::new();
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (page_tx, mut page_rx) = mpsc::channel::<FacetPage>(CHANNEL_CAPACITY);

        let interceptor = FacetInterceptor::new(
            self.endpoint.clone(),
            self.fetcher.clone(),
            tracker.clone(),
            FetchSettings {
                hits_per_page: self.config.hits_per_page,
                query: self.config.query.clone(),
                page_pause: Duration::from_millis(self.config.page_pause_ms),
                default_headers: default_headers(&self.config),
            },
        );
        let interception = tokio::spawn(interceptor.run(request_rx, page_tx));

        let merger = tokio::spawn(async move {
            let mut items = ItemsById::new();
            while let Some(page) = page_rx.recv().await {
                for item in page.items {
                    items.add(item, &page.label);
                }
            }
            items
        });

        session.intercept(request_tx);
        let selected = self.select_categories(session, &tracker).await;
        session.close().await;

        let intercept = interception
            .await
            .map_err(|e| ScrapeError::Channel(format!("interceptor failed: {}", e)))?;
        let items = merger
            .await
            .map_err(|e| ScrapeError::Channel(format!("item merger failed: {}", e)))?;

        let categories_selected = selected?;
        tracing::info!(
            "Harvested {} items from {} categories",
            items.len(),
            intercept.facets
        );

        Ok(HarvestOutcome {
            items: items.into_items(),
            categories_selected,
            intercept,
        })
    }

    async fn select_categories<S: StoreSession>(
        &self,
        session: &mut S,
        tracker: &FacetTracker,
    ) -> Result<usize> {
        let available = session.category_texts().await?;
        let texts = self.wanted_categories(available);

        let facet_wait = Duration::from_millis(self.config.facet_wait_ms);
        let settle = Duration::from_millis(self.config.settle_ms);

        for text in &texts {
            tracing::info!("Selecting category \"{}\"", text);
            session.select_category(text).await?;

            match category_by_text(text) {
                Some(category) => {
                    if !tracker.wait_discovered(category.filter, facet_wait).await {
                        tracing::warn!(
                            "No query seen for category \"{}\" within {:?}",
                            text,
                            facet_wait
                        );
                    }
                }
                None => tracing::warn!(
                    "Unrecognized filter category \"{}\", not waiting for its query",
                    text
                ),
            }

            tokio::time::sleep(settle).await;
        }

        Ok(texts.len())
    }

    fn wanted_categories(&self, available: Vec<String>) -> Vec<String> {
        if self.config.categories.is_empty() {
            return available;
        }

        let wanted: Vec<String> = self.config.categories.iter().map(|t| normalize_text(t)).collect();
        let matched: Vec<String> = available
            .into_iter()
            .filter(|text| wanted.contains(&normalize_text(text)))
            .collect();

        if matched.is_empty() {
            tracing::info!("None of the available categories matched {:?}", wanted);
        } else {
            tracing::info!("{} categories matched {:?}", matched.len(), wanted);
        }
        matched
    }
}

/// Runs a store harvest against the configured endpoint and stores the items
///
/// # Returns
///
/// * `Ok(HarvestOutcome)` - Items written to the store dataset
/// * `Err(ScrapeError)` - Missing `[store]` section, or the harvest failed
pub async fn run_store_harvest(config: Config, config_hash: &str) -> Result<HarvestOutcome> {
    let store = config
        .store
        .clone()
        .ok_or_else(|| ConfigError::Validation("missing [store] section".to_string()))?;

    let mut sink = SqliteSink::new(Path::new(&config.output.database_path))?;
    let run_id = sink.create_run(config_hash)?;
    let sink = Arc::new(Mutex::new(sink));

    let fetcher = HttpFetcher::new(
        &config.user_agent,
        Duration::from_secs(config.crawler.request_timeout_secs),
    )?;
    let harvester = StoreHarvester::new(store.clone(), Arc::new(fetcher))?;
    let mut session = EndpointSession::new(harvester.endpoint().clone(), default_headers(&store));

    let result = harvest_into(&harvester, &mut session, sink.clone(), &store.dataset_id).await;

    let status = if result.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    sink.lock()
        .map_err(|e| ScrapeError::Channel(format!("sink lock poisoned: {}", e)))?
        .finish_run(run_id, status)?;

    result
}

async fn harvest_into<S: StoreSession>(
    harvester: &StoreHarvester,
    session: &mut S,
    sink: Arc<Mutex<SqliteSink>>,
    dataset: &str,
) -> Result<HarvestOutcome> {
    let outcome = harvester.harvest(session).await?;

    let pipeline = RecordPipeline::spawn(sink, CHANNEL_CAPACITY);
    pipeline
        .handle()
        .push(dataset, &outcome.items, PushOptions::default(), None)
        .await?;
    let stats = pipeline.finish().await?;

    tracing::info!("Stored {} store items in dataset '{}'", stats.written, dataset);
    Ok(outcome)
}
