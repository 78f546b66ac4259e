//! Bounded writer in front of a record sink
//!
//! Handlers send batches through a [`PipelineHandle`]; a single writer task
//! drains the channel into the sink. A full channel makes senders wait, and
//! [`RecordPipeline::finish`] is the point at which every sent batch has been
//! written.

use crate::storage::{PushOptions, RecordSink};
use crate::{Result, ScrapeError};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct SinkBatch {
    dataset: String,
    items: Vec<Value>,
    options: PushOptions,
    source_url: Option<String>,
}

/// Totals reported by the writer once the pipeline is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub batches: usize,
    pub written: usize,
    pub failed_batches: usize,
}

pub struct RecordPipeline {
    tx: mpsc::Sender<SinkBatch>,
    writer: JoinHandle<PipelineStats>,
}

impl RecordPipeline {
    /// Spawns the writer task
    ///
    /// # Arguments
    ///
    /// * `sink` - Shared sink; locked only while a batch is written
    /// * `capacity` - Number of batches that may wait in the channel
    pub fn spawn<S>(sink: Arc<Mutex<S>>, capacity: usize) -> Self
    where
        S: RecordSink + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<SinkBatch>(capacity.max(1));

        let writer = tokio::spawn(async move {
            let mut stats = PipelineStats::default();

            while let Some(batch) = rx.recv().await {
                stats.batches += 1;
                let count = batch.items.len();

                let result = match sink.lock() {
                    Ok(mut sink) => sink
                        .push(
                            &batch.dataset,
                            batch.items,
                            &batch.options,
                            batch.source_url.as_deref(),
                        )
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(format!("sink lock poisoned: {}", e)),
                };

                match result {
                    Ok(written) => stats.written += written,
                    Err(e) => {
                        stats.failed_batches += 1;
                        tracing::error!(
                            "Failed to store {} items in dataset '{}': {}",
                            count,
                            batch.dataset,
                            e
                        );
                    }
                }
            }

            tracing::debug!(
                "Record writer finished: {} items in {} batches",
                stats.written,
                stats.batches
            );
            stats
        });

        Self { tx, writer }
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            tx: self.tx.clone(),
        }
    }

    /// Closes the pipeline and waits until every queued batch is written
    ///
    /// Batches sent through handles that are still alive keep the writer
    /// running, so drop them before calling this.
    pub async fn finish(self) -> Result<PipelineStats> {
        drop(self.tx);
        self.writer
            .await
            .map_err(|e| ScrapeError::Channel(format!("record writer failed: {}", e)))
    }
}

/// Cloneable sender side of a [`RecordPipeline`]
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<SinkBatch>,
}

impl PipelineHandle {
    /// Queues records for a dataset
    ///
    /// # Arguments
    ///
    /// * `dataset` - Target dataset name
    /// * `records` - Records to persist, in order
    /// * `options` - Redaction applied before writing
    /// * `source_url` - Page the records came from
    pub async fn push<T: Serialize>(
        &self,
        dataset: &str,
        records: &[T],
        options: PushOptions,
        source_url: Option<&str>,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let items = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.tx
            .send(SinkBatch {
                dataset: dataset.to_string(),
                items,
                options,
                source_url: source_url.map(str::to_string),
            })
            .await
            .map_err(|_| ScrapeError::Channel("record pipeline closed".to_string()))
    }
}
