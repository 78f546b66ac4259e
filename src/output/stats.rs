//! Statistics from the dataset store
//!
//! This module provides functionality for extracting and displaying
//! dataset sizes, run history and failed requests.

use crate::crawler::RunStats;
use crate::storage::{FailedRequestRecord, RecordSink, RunRecord, StorageResult};

/// Dataset store summary
#[derive(Debug, Clone)]
pub struct DatasetStatistics {
    /// Item count per dataset, sorted by dataset name
    pub dataset_counts: Vec<(String, u64)>,

    /// Runs, newest first
    pub runs: Vec<RunRecord>,

    pub failed_requests: Vec<FailedRequestRecord>,
}

impl DatasetStatistics {
    pub fn total_items(&self) -> u64 {
        self.dataset_counts.iter().map(|(_, count)| count).sum()
    }
}

/// Loads statistics from the sink
///
/// # Arguments
///
/// * `sink` - The store to query
///
/// # Returns
///
/// * `Ok(DatasetStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(sink: &dyn RecordSink) -> StorageResult<DatasetStatistics> {
    Ok(DatasetStatistics {
        dataset_counts: sink.dataset_counts()?,
        runs: sink.runs()?,
        failed_requests: sink.failed_requests()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics ===\n");

    println!("Datasets ({} items in total):", stats.total_items());
    if stats.dataset_counts.is_empty() {
        println!("  (none)");
    }
    for (dataset, count) in &stats.dataset_counts {
        println!("  {}: {}", dataset, count);
    }
    println!();

    println!("Runs ({}):", stats.runs.len());
    for run in stats.runs.iter().take(10) {
        println!(
            "  #{} {} started {} finished {}",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
    }
    println!();

    if !stats.failed_requests.is_empty() {
        println!("Failed Requests ({}):", stats.failed_requests.len());
        for failed in &stats.failed_requests {
            println!(
                "  - [run {}] {} ({}) after {} retries: {}",
                failed.run_id,
                failed.url,
                failed.label.as_deref().unwrap_or("unlabelled"),
                failed.retry_count,
                failed.error
            );
        }
        println!();
    }
}

/// One-line summary of a finished catalog run
pub fn format_run_summary(stats: &RunStats) -> String {
    format!(
        "Run {}: {} tasks started ({} succeeded, {} failed, {} retries), {} tasks enqueued, {} records written in {:.1}s",
        stats.run_id,
        stats.pool.started,
        stats.pool.succeeded,
        stats.pool.failed,
        stats.pool.retries,
        stats.tasks_enqueued,
        stats.records_written,
        stats.duration.as_secs_f64()
    )
}
