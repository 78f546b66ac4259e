//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every check runs before a crawl starts, so a bad start mode or an unknown
//! dataset type never reaches the worker pool.
//!
//! # Example
//!
//! ```no_run
//! use profesia_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Listing timeout: {}s", config.crawler.listing_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DatasetType, EmploymentType, InputConfig, OutputConfig,
    RemoteWorkType, SalaryPeriod, SiteConfig, StoreConfig, UserAgentConfig, DEFAULT_BASE_URL,
    DEFAULT_STORE_ENDPOINT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
