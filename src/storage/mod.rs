//! Storage module for persisting extracted records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Named datasets of JSON records, with field redaction
//! - Run tracking and the failed-request ledger
//! - The bounded writer task handlers push records through

mod pipeline;
mod schema;
mod sqlite;
mod traits;

pub use pipeline::{PipelineHandle, PipelineStats, RecordPipeline};
pub use sqlite::SqliteSink;
pub use traits::{redaction_marker, PushOptions, RecordSink, StorageError, StorageResult};

use chrono::Utc;
use serde::Serialize;

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A task that failed after all retries
#[derive(Debug, Clone)]
pub struct FailedRequestRecord {
    pub run_id: i64,
    pub url: String,
    pub label: Option<String>,
    pub error: String,
    pub retry_count: u32,
    pub failed_at: String,
}

/// Context captured when a handler fails, stored in the reporting dataset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub url: String,
    pub label: Option<String>,
    pub error_name: String,
    pub error_message: String,
    pub page_html_snapshot: Option<String>,
    pub created_at: String,
}

impl ErrorReport {
    pub fn new(url: &str, label: Option<&str>, error: &crate::ScrapeError) -> Self {
        Self {
            url: url.to_string(),
            label: label.map(str::to_string),
            error_name: error.name().to_string(),
            error_message: error.to_string(),
            page_html_snapshot: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_snapshot(mut self, html: Option<String>) -> Self {
        self.page_html_snapshot = html;
        self
    }
}
