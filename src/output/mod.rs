//! Output module for reporting on the dataset store
//!
//! This module handles:
//! - Summaries of finished runs
//! - Dataset, run and failed-request statistics
//! - Exporting datasets as JSON

mod export;
pub mod stats;

pub use export::{export_dataset, OutputError, OutputResult};
pub use stats::{format_run_summary, load_statistics, print_statistics, DatasetStatistics};
