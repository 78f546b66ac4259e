//! Store page sessions
//!
//! A [`StoreSession`] stands for the store page: it lists the category
//! buttons, selects them one by one, and reports every query request the
//! page sends while doing so.

use crate::store::facets::{category_by_text, CATEGORIES};
use crate::store::intercept::InterceptedRequest;
use crate::store::payload::{QueryEndpoint, QueryPayload};
use crate::{Result, ScrapeError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Attribute the store filters categories by
const CATEGORY_ATTRIBUTE: &str = "categories";

#[async_trait]
pub trait StoreSession: Send {
    /// Starts reporting outgoing requests to `requests`
    fn intercept(&mut self, requests: mpsc::Sender<InterceptedRequest>);

    /// Texts of the category buttons on the page
    async fn category_texts(&mut self) -> Result<Vec<String>>;

    /// Selects a category, which makes the page query its items
    async fn select_category(&mut self, text: &str) -> Result<()>;

    /// Stops reporting requests
    async fn close(&mut self);
}

/// Session that replays category selections as the query requests the
/// store page sends for them
///
/// Requests are only reported, not sent: the interceptor does the fetching.
pub struct EndpointSession {
    endpoint: QueryEndpoint,
    headers: Vec<(String, String)>,
    requests: Option<mpsc::Sender<InterceptedRequest>>,
}

impl EndpointSession {
    pub fn new(endpoint: QueryEndpoint, headers: Vec<(String, String)>) -> Self {
        Self {
            endpoint,
            headers,
            requests: None,
        }
    }
}

#[async_trait]
impl StoreSession for EndpointSession {
    fn intercept(&mut self, requests: mpsc::Sender<InterceptedRequest>) {
        self.requests = Some(requests);
    }

    async fn category_texts(&mut self) -> Result<Vec<String>> {
        Ok(CATEGORIES.iter().map(|c| c.text.to_string()).collect())
    }

    async fn select_category(&mut self, text: &str) -> Result<()> {
        let Some(category) = category_by_text(text) else {
            tracing::warn!("No filter known for category \"{}\"", text);
            return Ok(());
        };

        let Some(requests) = &self.requests else {
            return Ok(());
        };

        let payload = QueryPayload::for_facet(CATEGORY_ATTRIBUTE, category.filter);
        let request = InterceptedRequest {
            url: self.endpoint.url().clone(),
            headers: self.headers.clone(),
            body: serde_json::to_string(&payload)?,
        };

        requests
            .send(request)
            .await
            .map_err(|_| ScrapeError::Channel("request interceptor stopped".to_string()))
    }

    async fn close(&mut self) {
        self.requests = None;
    }
}
