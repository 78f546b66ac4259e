//! Query endpoint wire format
//!
//! Intercepted request bodies are decoded on top of [`QueryPayload::default`],
//! so fields the store page leaves out keep their default values and fields
//! this crate does not know about are sent back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Header names the endpoint needs; everything else on an intercepted request is dropped
pub const FORWARDED_HEADERS: [&str; 4] = [
    "accept",
    "content-type",
    "x-algolia-api-key",
    "x-algolia-application-id",
];

const RETRIEVED_ATTRIBUTES: [&str; 10] = [
    "title",
    "name",
    "username",
    "userFullName",
    "stats",
    "description",
    "pictureUrl",
    "userPictureUrl",
    "notice",
    "currentPricingInfo",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryPayload {
    pub query: String,
    /// Zero-based cursor page
    pub page: u32,
    pub hits_per_page: u32,
    pub restrict_searchable_attributes: Vec<String>,
    pub attributes_to_highlight: Vec<String>,
    pub attributes_to_retrieve: Vec<String>,
    /// Facet filter such as `categories:AI`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for QueryPayload {
    fn default() -> Self {
        Self {
            query: String::new(),
            page: 0,
            hits_per_page: 24,
            restrict_searchable_attributes: Vec::new(),
            attributes_to_highlight: Vec::new(),
            attributes_to_retrieve: RETRIEVED_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            filters: None,
            extra: Map::new(),
        }
    }
}

impl QueryPayload {
    /// Decodes an intercepted request body; an empty body yields the defaults
    pub fn from_body(body: &str) -> serde_json::Result<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(body)
    }

    /// Payload for a category selection, as the store page sends it
    pub fn for_facet(attribute: &str, filter: &str) -> Self {
        Self {
            filters: Some(format!("{}:{}", attribute, filter)),
            ..Self::default()
        }
    }
}

/// Response body; both fields may be missing on error responses
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub hits: Option<Vec<Value>>,
    #[serde(default)]
    pub nb_hits: Option<u64>,
}

/// Recognizes requests sent to the query endpoint
///
/// Host and path must match; the query string (which carries client
/// identification on the real store) is ignored.
#[derive(Debug, Clone)]
pub struct QueryEndpoint {
    url: Url,
}

impl QueryEndpoint {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn matches(&self, candidate: &Url) -> bool {
        candidate.host_str().map(str::to_lowercase) == self.url.host_str().map(str::to_lowercase)
            && candidate.port_or_known_default() == self.url.port_or_known_default()
            && candidate.path().trim_end_matches('/') == self.url.path().trim_end_matches('/')
    }
}

/// Keeps only the forwarded headers, filling in defaults for those the request lacked
///
/// # Arguments
///
/// * `intercepted` - Headers found on the intercepted request
/// * `defaults` - Fallback values, used when a forwarded header is missing
pub fn narrow_headers(
    intercepted: &[(String, String)],
    defaults: &[(String, String)],
) -> Vec<(String, String)> {
    let lookup = |headers: &[(String, String)], name: &str| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    };

    FORWARDED_HEADERS
        .iter()
        .filter_map(|name| {
            lookup(intercepted, name)
                .or_else(|| lookup(defaults, name))
                .map(|value| (name.to_string(), value))
        })
        .collect()
}
