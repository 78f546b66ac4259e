//! Facet interception
//!
//! The store page fetches items through a faceted query endpoint. Each time
//! a category is selected, it sends a query filtered by that category. The
//! [`FacetInterceptor`] watches those requests. The first time a facet key
//! appears, it starts one cursor loop that pages through every item of that
//! facet. Fetched pages go out on a channel to whoever merges them.

use crate::crawler::Fetch;
use crate::store::facets::{category_by_filter, facet_key, FacetTracker, StoreItem, UNRECOGNIZED_LABEL};
use crate::store::payload::{narrow_headers, QueryEndpoint, QueryPayload, QueryResponse};
use crate::{Result, ScrapeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use url::Url;

/// A request the store page sent, as seen by the session
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// One cursor page of a facet
#[derive(Debug, Clone)]
pub struct FacetPage {
    pub facet: String,
    /// Label merged into the items' `categories`
    pub label: String,
    pub page: u32,
    pub items: Vec<StoreItem>,
}

/// How facet loops query the endpoint
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub hits_per_page: u32,
    /// Replaces the query of intercepted requests when set and non-empty
    pub query: Option<String>,
    pub page_pause: Duration,
    /// Used for forwarded headers an intercepted request lacks
    pub default_headers: Vec<(String, String)>,
}

/// Totals of one interception session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptStats {
    pub requests_seen: usize,
    pub facets: usize,
    pub pages_fetched: usize,
    pub failed_facets: usize,
}

pub struct FacetInterceptor {
    endpoint: QueryEndpoint,
    fetcher: Arc<dyn Fetch>,
    tracker: FacetTracker,
    settings: FetchSettings,
}

impl FacetInterceptor {
    pub fn new(
        endpoint: QueryEndpoint,
        fetcher: Arc<dyn Fetch>,
        tracker: FacetTracker,
        settings: FetchSettings,
    ) -> Self {
        Self {
            endpoint,
            fetcher,
            tracker,
            settings,
        }
    }

    /// Watches intercepted requests until the channel closes, then waits for
    /// every facet loop it started
    ///
    /// # Arguments
    ///
    /// * `requests` - Requests sent by the store page
    /// * `pages` - Receives every fetched facet page
    pub async fn run(
        self,
        mut requests: mpsc::Receiver<InterceptedRequest>,
        pages: mpsc::Sender<FacetPage>,
    ) -> InterceptStats {
        let mut stats = InterceptStats::default();
        let mut loops: JoinSet<(String, Result<usize>)> = JoinSet::new();

        while let Some(request) = requests.recv().await {
            if !self.endpoint.matches(&request.url) {
                continue;
            }
            stats.requests_seen += 1;

            let Some((facet, payload)) = self.discover(&request) else {
                continue;
            };
            stats.facets += 1;

            let label = match category_by_filter(&facet) {
                Some(category) => category.filter.to_string(),
                None => {
                    tracing::warn!(
                        "Unrecognized filter category \"{}\", items are stored as \"{}\"",
                        facet,
                        UNRECOGNIZED_LABEL
                    );
                    UNRECOGNIZED_LABEL.to_string()
                }
            };

            let facet_loop = FacetLoop {
                fetcher: self.fetcher.clone(),
                url: request.url.clone(),
                headers: narrow_headers(&request.headers, &self.settings.default_headers),
                payload: self.prepare_payload(payload),
                facet: facet.clone(),
                label,
                page_pause: self.settings.page_pause,
                pages: pages.clone(),
            };
            loops.spawn(async move { (facet, facet_loop.run().await) });
        }

        // Only the loops hold senders from here on
        drop(pages);

        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok((_, Ok(fetched))) => stats.pages_fetched += fetched,
                Ok((facet, Err(e))) => {
                    stats.failed_facets += 1;
                    tracing::error!("Fetching facet \"{}\" failed: {}", facet, e);
                }
                Err(e) => {
                    stats.failed_facets += 1;
                    tracing::error!("Facet loop panicked: {}", e);
                }
            }
        }

        tracing::info!(
            "Interception finished: {} facets, {} pages fetched",
            stats.facets,
            stats.pages_fetched
        );
        stats
    }

    /// Returns the facet of a request seen for the first time
    fn discover(&self, request: &InterceptedRequest) -> Option<(String, QueryPayload)> {
        let payload = match QueryPayload::from_body(&request.body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Unreadable query payload on {}: {}", request.url, e);
                return None;
            }
        };

        // The unfiltered listing carries no facet
        let filters = payload.filters.as_deref()?;
        let Some(key) = facet_key(filters) else {
            tracing::warn!("Filter \"{}\" has no facet key", filters);
            return None;
        };

        if !self.tracker.mark_discovered(key) {
            tracing::debug!("Facet \"{}\" already being fetched", key);
            return None;
        }

        tracing::info!("Found store category filter \"{}\"", filters);
        Some((key.to_string(), payload))
    }

    fn prepare_payload(&self, mut payload: QueryPayload) -> QueryPayload {
        if let Some(query) = self.settings.query.as_deref().filter(|q| !q.is_empty()) {
            payload.query = query.to_string();
        }
        payload.hits_per_page = self.settings.hits_per_page;
        payload
    }
}

struct FacetLoop {
    fetcher: Arc<dyn Fetch>,
    url: Url,
    headers: Vec<(String, String)>,
    payload: QueryPayload,
    facet: String,
    label: String,
    page_pause: Duration,
    pages: mpsc::Sender<FacetPage>,
}

impl FacetLoop {
    /// Pages through the facet until an empty page or until `nbHits` items were seen
    async fn run(mut self) -> Result<usize> {
        let mut seen: u64 = 0;
        let mut fetched = 0;

        loop {
            tracing::info!(
                "Fetching page {} for category \"{}\" (query \"{}\")",
                self.payload.page + 1,
                self.facet,
                self.payload.query
            );

            let body = serde_json::to_value(&self.payload)?;
            let raw = self.fetcher.post_json(&self.url, &self.headers, &body).await?;
            let response: QueryResponse = serde_json::from_value(raw)?;
            fetched += 1;

            let hits = response.hits.unwrap_or_default();
            let hit_count = hits.len() as u64;
            seen += hit_count;

            let items: Vec<StoreItem> = hits.into_iter().filter_map(StoreItem::from_hit).collect();
            self.pages
                .send(FacetPage {
                    facet: self.facet.clone(),
                    label: self.label.clone(),
                    page: self.payload.page,
                    items,
                })
                .await
                .map_err(|_| ScrapeError::Channel("facet page receiver dropped".to_string()))?;

            let exhausted = response.nb_hits.map(|total| seen >= total).unwrap_or(false);
            if hit_count == 0 || exhausted {
                tracing::info!(
                    "DONE fetching category \"{}\" after {} pages",
                    self.facet,
                    fetched
                );
                return Ok(fetched);
            }

            self.payload.page += 1;
            tokio::time::sleep(self.page_pause).await;
        }
    }
}
