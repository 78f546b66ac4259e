//! Profesia-Harvest: route-driven scraper for a job catalog and its companion store
//!
//! This crate classifies catalog URLs into handlers, walks paginated listings
//! under a global record limit, and harvests a faceted store endpoint by
//! intercepting the query requests the store makes per category.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod router;
pub mod storage;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for scraping operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extraction error for {url}: {message}")]
    Extract { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Channel closed: {0}")]
    Channel(String),
}

impl ScrapeError {
    /// Short machine-friendly name used in error reports
    pub fn name(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Http { .. } => "HttpError",
            Self::HttpStatus { .. } => "HttpStatusError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Storage(_) => "StorageError",
            Self::Url(_) | Self::UrlParse(_) => "UrlError",
            Self::Json(_) => "JsonError",
            Self::Extract { .. } => "ExtractError",
            Self::Io(_) => "IoError",
            Self::Channel(_) => "ChannelError",
        }
    }

    /// Whether the task that produced this error may be retried
    ///
    /// Client errors other than 408 and 429 are terminal, as are errors
    /// that would reproduce identically on a second attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            Self::Http { .. } | Self::Timeout { .. } | Self::Extract { .. } | Self::Io(_) => true,
            Self::Storage(_) => true,
            Self::Config(_)
            | Self::Url(_)
            | Self::UrlParse(_)
            | Self::Json(_)
            | Self::Channel(_) => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing instruction: set either start-urls or dataset-type")]
    MissingStartMode,

    #[error("Ambiguous instruction: start-urls and dataset-type are mutually exclusive")]
    AmbiguousStartMode,
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Invalid route pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type alias for scraping operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use router::{Classification, Dispatch, RouteAction, RouteLabel, Router};
pub use url::{ListingFilters, SiteProfile};
