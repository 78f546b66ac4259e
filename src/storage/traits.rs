//! Record sink trait and error types
//!
//! This module defines the interface the crawl handlers persist through,
//! plus field redaction applied before records reach a backend.

use crate::storage::{FailedRequestRecord, RunRecord, RunStatus};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Per-push options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Top-level fields replaced by a redaction marker before persisting
    pub redact_fields: BTreeSet<String>,
}

impl PushOptions {
    pub fn redacting<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            redact_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Applies the redaction to one record
    ///
    /// Only fields present on the record are replaced; non-object records
    /// pass through untouched.
    pub fn apply(&self, mut record: Value) -> Value {
        if let Value::Object(map) = &mut record {
            for field in &self.redact_fields {
                if let Some(value) = map.get_mut(field) {
                    *value = Value::String(redaction_marker(field));
                }
            }
        }
        record
    }
}

pub fn redaction_marker(field: &str) -> String {
    format!("<Redacted property \"{}\">", field)
}

/// Trait for record persistence backends
///
/// Records are schemaless JSON values grouped into named datasets. Run
/// bookkeeping and the failed-request ledger live next to them.
pub trait RecordSink: Send {
    // ===== Datasets =====

    /// Appends records to a dataset as they are
    ///
    /// # Arguments
    ///
    /// * `dataset` - Dataset name
    /// * `items` - Records to append, in order
    /// * `source_url` - Page the records were extracted from, if any
    ///
    /// # Returns
    ///
    /// The number of records written
    fn push_items(
        &mut self,
        dataset: &str,
        items: &[Value],
        source_url: Option<&str>,
    ) -> StorageResult<usize>;

    /// Appends records after applying `options`
    fn push(
        &mut self,
        dataset: &str,
        items: Vec<Value>,
        options: &PushOptions,
        source_url: Option<&str>,
    ) -> StorageResult<usize> {
        let items: Vec<Value> = items.into_iter().map(|item| options.apply(item)).collect();
        self.push_items(dataset, &items, source_url)
    }

    /// Number of records in a dataset
    fn count(&self, dataset: &str) -> StorageResult<u64>;

    /// All records of a dataset, in insertion order
    fn items(&self, dataset: &str) -> StorageResult<Vec<Value>>;

    /// Record count per dataset, sorted by dataset name
    fn dataset_counts(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Runs =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// All runs, newest first
    fn runs(&self) -> StorageResult<Vec<RunRecord>>;

    // ===== Failed requests =====

    /// Records a task that failed for good
    fn record_failed_request(
        &mut self,
        run_id: i64,
        url: &str,
        label: Option<&str>,
        error: &str,
        retry_count: u32,
    ) -> StorageResult<()>;

    /// All failed requests, oldest first
    fn failed_requests(&self) -> StorageResult<Vec<FailedRequestRecord>>;
}
