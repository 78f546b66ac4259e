//! Global record limit for listing pagination
//!
//! One counter per run holds the number of listing records already emitted.
//! Every batch reserves its share under the counter's lock, so concurrently
//! extracted pages can never emit more than the configured maximum between
//! them. The persisted record count and the page-offset estimate only raise
//! the "already emitted" figure; they never lower it.
//!
//! Reservations are remembered per listing page, so a retried page gets the
//! same share back instead of being counted twice.

use crate::storage::{RecordSink, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of reserving room for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// How many records of the batch may be emitted, from its head
    pub take: usize,
    /// No further pages should be scheduled
    pub limit_reached: bool,
}

/// Records persisted to a dataset since the run started
pub struct PersistedCount {
    sink: Arc<Mutex<dyn RecordSink>>,
    dataset: String,
    baseline: u64,
}

impl PersistedCount {
    /// Captures the dataset's current size as the baseline
    ///
    /// # Returns
    ///
    /// * `Ok(PersistedCount)` - Baseline captured
    /// * `Err(StorageError)` - The dataset could not be counted
    pub fn new(sink: Arc<Mutex<dyn RecordSink>>, dataset: &str) -> StorageResult<Self> {
        let baseline = sink
            .lock()
            .map_err(|e| StorageError::Database(format!("sink lock poisoned: {}", e)))?
            .count(dataset)?;

        Ok(Self {
            sink,
            dataset: dataset.to_string(),
            baseline,
        })
    }

    fn total(&self) -> Option<u64> {
        let sink = self.sink.lock().ok()?;
        match sink.count(&self.dataset) {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Could not count dataset '{}': {}", self.dataset, e);
                None
            }
        }
    }

    pub fn current(&self) -> Option<u64> {
        self.total().map(|total| total.saturating_sub(self.baseline))
    }
}

#[derive(Debug, Default)]
struct Ledger {
    emitted: usize,
    /// Reservation granted to each listing page, keyed by its URL
    pages: HashMap<String, Reservation>,
}

pub struct LimitState {
    max_count: Option<usize>,
    page_size: usize,
    ledger: Mutex<Ledger>,
    persisted: Option<PersistedCount>,
}

impl LimitState {
    /// # Arguments
    ///
    /// * `max_count` - Maximum records per run; `None` disables the limit
    /// * `page_size` - Rows per listing page, used for the page-offset estimate
    pub fn new(max_count: Option<usize>, page_size: usize) -> Self {
        Self {
            max_count,
            page_size,
            ledger: Mutex::new(Ledger::default()),
            persisted: None,
        }
    }

    pub fn with_persisted(mut self, persisted: PersistedCount) -> Self {
        self.persisted = Some(persisted);
        self
    }

    pub fn max_count(&self) -> Option<usize> {
        self.max_count
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records emitted so far in this run
    pub fn emitted(&self) -> usize {
        self.ledger().emitted
    }

    /// Reserves room for a batch extracted from listing page `page_num`
    ///
    /// A page that already holds a reservation gets it back unchanged.
    ///
    /// # Arguments
    ///
    /// * `page_key` - Identity of the listing page, its canonical URL
    /// * `batch_len` - Number of rows extracted from the page
    /// * `page_num` - 1-based position of the page in its pagination run
    ///
    /// # Returns
    ///
    /// How many rows to keep and whether pagination should stop
    pub fn reserve(&self, page_key: &str, batch_len: usize, page_num: u32) -> Reservation {
        let mut ledger = self.ledger();

        if let Some(previous) = ledger.pages.get(page_key) {
            tracing::debug!("Reusing reservation of {} rows for {}", previous.take, page_key);
            return Reservation {
                take: previous.take.min(batch_len),
                limit_reached: previous.limit_reached,
            };
        }

        let reservation = self.decide(ledger.emitted, batch_len, page_num);
        ledger.emitted += reservation.take;
        ledger.pages.insert(page_key.to_string(), reservation);
        reservation
    }

    fn decide(&self, emitted: usize, batch_len: usize, page_num: u32) -> Reservation {
        let Some(max) = self.max_count else {
            return Reservation {
                take: batch_len,
                limit_reached: false,
            };
        };

        let persisted = self
            .persisted
            .as_ref()
            .and_then(PersistedCount::current)
            .unwrap_or(0) as usize;
        let page_offset = (page_num.saturating_sub(1) as usize).saturating_mul(self.page_size);
        let already = emitted.max(persisted).max(page_offset);

        let take = batch_len.min(max.saturating_sub(already));
        let limit_reached = already + batch_len >= max;

        if take < batch_len {
            tracing::info!(
                "Entry limit of {} reached, dropping {} of {} rows",
                max,
                batch_len - take,
                batch_len
            );
        }

        Reservation {
            take,
            limit_reached,
        }
    }
}
