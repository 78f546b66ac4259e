//! Task queue and worker pool
//!
//! This module handles:
//! - The FIFO task queue, with front insertion for redirects and one task per URL
//! - Global concurrency limiting via a semaphore
//! - Per-task timeouts (longer for listing pages)
//! - Retry with exponential backoff and the terminal failure callback
//! - Stopping once the queue drains or the task cap is reached

use crate::config::CrawlerConfig;
use crate::extract::JobOffer;
use crate::router::RouteLabel;
use crate::{Result, ScrapeError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use url::Url;

/// State carried from the task that enqueued this one
#[derive(Debug, Clone, Default)]
pub struct UserData {
    /// Position of a listing page within its pagination run (1-based)
    pub listing_page_num: Option<u32>,
    /// Listing row a detail page was reached from
    pub partial_offer: Option<JobOffer>,
}

#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: Url,
    /// Handler to use; unlabelled tasks are classified by the router
    pub label: Option<RouteLabel>,
    pub user_data: UserData,
    pub retry_count: u32,
}

impl CrawlTask {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            label: None,
            user_data: UserData::default(),
            retry_count: 0,
        }
    }

    pub fn with_label(mut self, label: RouteLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_user_data(mut self, user_data: UserData) -> Self {
        self.user_data = user_data;
        self
    }

    /// Key under which the queue accepts a task at most once
    ///
    /// The fragment never reaches the server, so it is not part of the key.
    pub fn unique_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    fn label_name(&self) -> &'static str {
        self.label.map(|l| l.as_str()).unwrap_or("UNLABELLED")
    }
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<CrawlTask>,
    seen: HashSet<String>,
    total_enqueued: usize,
}

/// Shared FIFO of pending tasks
///
/// Clones share the same queue. A URL is accepted once per run; pushing it
/// again is a no-op, so a retried handler cannot schedule its follow-ups
/// twice.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a task to the back of the queue
    ///
    /// Returns `false` when the task's URL was already enqueued.
    pub fn push(&self, task: CrawlTask) -> bool {
        self.insert(task, false)
    }

    /// Puts a task at the front of the queue
    ///
    /// Returns `false` when the task's URL was already enqueued.
    pub fn push_front(&self, task: CrawlTask) -> bool {
        self.insert(task, true)
    }

    fn insert(&self, task: CrawlTask, front: bool) -> bool {
        {
            let mut state = self.lock();
            if !state.seen.insert(task.unique_key()) {
                tracing::debug!("Already enqueued {}, skipping", task.url);
                return false;
            }

            tracing::debug!(
                "Enqueued {}{} ({})",
                task.url,
                if front { " at the front" } else { "" },
                task.label_name()
            );
            if front {
                state.tasks.push_front(task);
            } else {
                state.tasks.push_back(task);
            }
            state.total_enqueued += 1;
        }
        self.notify.notify_one();
        true
    }

    pub fn pop(&self) -> Option<CrawlTask> {
        self.lock().tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks ever added to the queue
    pub fn total_enqueued(&self) -> usize {
        self.lock().total_enqueued
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Work performed for each task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &CrawlTask) -> Result<()>;
}

/// Called once for every task that failed for good
pub type FailureCallback = Arc<dyn Fn(&CrawlTask, &ScrapeError) + Send + Sync>;

/// Worker pool limits
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub listing_timeout: Duration,
    pub retry_backoff: Duration,
    pub max_tasks: Option<usize>,
}

impl PoolSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1) as usize,
            max_retries: config.max_request_retries,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            listing_timeout: Duration::from_secs(config.listing_timeout_secs),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_tasks: config.max_requests_per_crawl,
        }
    }

    /// Listing tasks may expand detail pages inline, so they get the longer
    /// timeout. Unlabelled tasks are not classified yet and get it too.
    fn timeout_for(&self, task: &CrawlTask) -> Duration {
        match task.label {
            Some(RouteLabel::JobListing) | None => self.listing_timeout,
            Some(_) => self.request_timeout,
        }
    }

    fn backoff_for(&self, retry_count: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(retry_count.saturating_sub(1)))
    }
}

/// Totals of a pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub retries: usize,
    /// Tasks left in the queue when the task cap stopped the run
    pub skipped: usize,
}

enum TaskOutcome {
    Succeeded { retries: u32 },
    Failed { retries: u32 },
}

/// Runs queued tasks with bounded concurrency until the queue drains
pub struct TaskPool {
    queue: TaskQueue,
    settings: PoolSettings,
}

impl TaskPool {
    pub fn new(queue: TaskQueue, settings: PoolSettings) -> Self {
        Self { queue, settings }
    }

    /// Processes tasks until the queue is empty and nothing is in flight, or
    /// until the task cap has been reached
    ///
    /// # Arguments
    ///
    /// * `handler` - Work done for each task; may enqueue further tasks
    /// * `on_failed` - Called for tasks that failed for good
    ///
    /// # Returns
    ///
    /// Totals of the run
    pub async fn run<H>(&self, handler: Arc<H>, on_failed: FailureCallback) -> PoolStats
    where
        H: TaskHandler + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency));
        let mut in_flight: JoinSet<TaskOutcome> = JoinSet::new();
        let mut stats = PoolStats::default();

        loop {
            let cap_reached = self
                .settings
                .max_tasks
                .map(|max| stats.started >= max)
                .unwrap_or(false);

            let next = if cap_reached { None } else { self.queue.pop() };

            match next {
                Some(task) => {
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    stats.started += 1;

                    let handler = handler.clone();
                    let on_failed = on_failed.clone();
                    let settings = self.settings.clone();
                    in_flight.spawn(async move {
                        let outcome = run_task(handler.as_ref(), task, &settings, &on_failed).await;
                        drop(permit);
                        outcome
                    });
                }
                None if in_flight.is_empty() => break,
                None if cap_reached => {
                    if let Some(result) = in_flight.join_next().await {
                        record_outcome(&mut stats, result);
                    }
                }
                None => {
                    tokio::select! {
                        Some(result) = in_flight.join_next() => record_outcome(&mut stats, result),
                        _ = self.queue.notified() => {}
                    }
                }
            }
        }

        while let Some(result) = in_flight.join_next().await {
            record_outcome(&mut stats, result);
        }

        stats.skipped = self.queue.len();
        if stats.skipped > 0 {
            tracing::warn!(
                "Task cap of {:?} reached, {} queued tasks were not processed",
                self.settings.max_tasks,
                stats.skipped
            );
        }

        stats
    }
}

fn record_outcome(
    stats: &mut PoolStats,
    result: std::result::Result<TaskOutcome, tokio::task::JoinError>,
) {
    match result {
        Ok(TaskOutcome::Succeeded { retries }) => {
            stats.succeeded += 1;
            stats.retries += retries as usize;
        }
        Ok(TaskOutcome::Failed { retries }) => {
            stats.failed += 1;
            stats.retries += retries as usize;
        }
        Err(e) => {
            stats.failed += 1;
            tracing::error!("Task panicked: {}", e);
        }
    }
}

/// Runs one task, retrying retryable errors with exponential backoff
async fn run_task<H: TaskHandler + ?Sized>(
    handler: &H,
    mut task: CrawlTask,
    settings: &PoolSettings,
    on_failed: &FailureCallback,
) -> TaskOutcome {
    let retries_before = task.retry_count;

    loop {
        let timeout = settings.timeout_for(&task);
        let result = match tokio::time::timeout(timeout, handler.handle(&task)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout {
                url: task.url.to_string(),
            }),
        };

        let error = match result {
            Ok(()) => {
                return TaskOutcome::Succeeded {
                    retries: task.retry_count - retries_before,
                }
            }
            Err(e) => e,
        };

        if error.is_retryable() && task.retry_count < settings.max_retries {
            task.retry_count += 1;
            let backoff = settings.backoff_for(task.retry_count);
            tracing::warn!(
                "Task {} failed ({}), retry {}/{} in {:?}",
                task.url,
                error,
                task.retry_count,
                settings.max_retries,
                backoff
            );
            tokio::time::sleep(backoff).await;
            continue;
        }

        tracing::error!(
            "Task {} failed after {} retries: {}",
            task.url,
            task.retry_count,
            error
        );
        on_failed(&task, &error);
        return TaskOutcome::Failed {
            retries: task.retry_count - retries_before,
        };
    }
}
