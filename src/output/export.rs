//! Dataset export
//!
//! Writes the items of one dataset as a pretty-printed JSON array.

use crate::storage::{RecordSink, StorageError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Dataset '{0}' is empty or does not exist")]
    EmptyDataset(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Exports a dataset to a JSON file
///
/// # Arguments
///
/// * `sink` - The store holding the dataset
/// * `dataset` - Dataset name, e.g. `default` or `REPORTING`
/// * `output_path` - File to create or overwrite
///
/// # Returns
///
/// * `Ok(usize)` - Number of items written
/// * `Err(OutputError)` - Dataset empty, or the file could not be written
pub fn export_dataset(sink: &dyn RecordSink, dataset: &str, output_path: &Path) -> OutputResult<usize> {
    let items = sink.items(dataset)?;
    if items.is_empty() {
        return Err(OutputError::EmptyDataset(dataset.to_string()));
    }

    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, &items)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(
        "Exported {} items from '{}' to {}",
        items.len(),
        dataset,
        output_path.display()
    );
    Ok(items.len())
}
