//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for HTML pages
//! - JSON POST requests against the store query endpoint
//! - Error classification for the retry policy

use crate::config::UserAgentConfig;
use crate::extract::Page;
use crate::{Result, ScrapeError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Network access used by the crawl handlers and the store harvester
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches an HTML page
    ///
    /// The returned page carries the final URL after redirects.
    async fn get_html(&self, url: &Url) -> Result<Page>;

    /// POSTs a JSON body and decodes the JSON response
    async fn post_json(&self, url: &Url, headers: &[(String, String)], body: &Value)
        -> Result<Value>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Timeout for a whole request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use profesia_harvest::config::UserAgentConfig;
/// use profesia_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "profesia-harvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL)
    let user_agent = format!(
        "{}/{} (+{})",
        config.crawler_name, config.crawler_version, config.contact_url
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetch`] over a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig, timeout: Duration) -> Result<Self> {
        let client = build_http_client(config, timeout).map_err(|e| ScrapeError::Http {
            url: String::new(),
            source: e,
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_html(&self, url: &Url) -> Result<Page> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        Ok(Page::new(final_url, body))
    }

    async fn post_json(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    header_map.insert(name, value);
                }
                _ => tracing::warn!("Skipping invalid header '{}'", name),
            }
        }

        let response = self
            .client
            .post(url.clone())
            .headers(header_map)
            .body(serde_json::to_string(body)?)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| classify_error(url, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> ScrapeError {
    if error.is_timeout() {
        ScrapeError::Timeout {
            url: url.to_string(),
        }
    } else {
        ScrapeError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        }
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&create_test_config(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_get_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/praca/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>ok</body></html>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/praca/", server.uri())).unwrap();
        let page = fetcher().get_html(&url).await.unwrap();
        assert_eq!(page.url, url);
        assert!(page.body.contains("ok"));
    }

    #[tokio::test]
    async fn test_get_html_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = fetcher().get_html(&url).await.unwrap_err();
        assert!(matches!(err, ScrapeError::HttpStatus { status: 404, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_post_json_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/store/query"))
            .and(header("x-algolia-api-key", "secret"))
            .and(body_partial_json(serde_json::json!({"page": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hits": [],
                "nbHits": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/1/indexes/store/query", server.uri())).unwrap();
        let response = fetcher()
            .post_json(
                &url,
                &[("x-algolia-api-key".to_string(), "secret".to_string())],
                &serde_json::json!({"page": 2, "query": ""}),
            )
            .await
            .unwrap();
        assert_eq!(response["nbHits"], 0);
    }
}
