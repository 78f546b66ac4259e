//! Crawl coordinator - per-run orchestration
//!
//! This module wires one catalog run together:
//! - Opening the dataset store and registering the run
//! - Building the route table, queue, record pipeline and entry limit
//! - Seeding start tasks and driving the worker pool
//! - Closing the pipeline and recording the run outcome

use crate::config::Config;
use crate::crawler::fetcher::{Fetch, HttpFetcher};
use crate::crawler::handlers::{CrawlContext, HandlerSettings};
use crate::crawler::limit::{LimitState, PersistedCount};
use crate::crawler::pagination::PaginationController;
use crate::crawler::scheduler::{
    CrawlTask, FailureCallback, PoolSettings, PoolStats, TaskPool, TaskQueue,
};
use crate::extract::{Extractor, ProfesiaExtractor};
use crate::router::{site_rules, Router};
use crate::storage::{RecordPipeline, RecordSink, RunStatus, SqliteSink};
use crate::url::{parse_http_url, ListingFilters, SiteProfile};
use crate::{ConfigError, Result, ScrapeError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Batches that may wait for the writer before handlers block
const PIPELINE_CAPACITY: usize = 64;

/// Totals of a finished catalog run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub run_id: i64,
    pub pool: PoolStats,
    pub records_written: usize,
    pub tasks_enqueued: usize,
    pub duration: Duration,
}

/// Builds the initial tasks from the configured start mode
///
/// Start tasks carry no label; the router classifies them once their page
/// has been loaded.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `site` - The catalog origin dataset types resolve against
///
/// # Returns
///
/// * `Ok(Vec<CrawlTask>)` - One task per start URL
/// * `Err(ScrapeError)` - No start mode, or an unparsable start URL
pub fn start_tasks(config: &Config, site: &SiteProfile) -> Result<Vec<CrawlTask>> {
    let input = &config.input;

    if !input.start_urls.is_empty() {
        return input
            .start_urls
            .iter()
            .map(|raw| Ok(CrawlTask::new(parse_http_url(raw)?)))
            .collect();
    }

    let dataset = input.dataset_type.ok_or(ConfigError::MissingStartMode)?;
    Ok(vec![CrawlTask::new(site.dataset_url(dataset)?)])
}

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    sink: Arc<Mutex<SqliteSink>>,
    fetcher: Arc<dyn Fetch>,
    extractor: Arc<dyn Extractor>,
    run_id: i64,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the config file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Store opened and run registered
    /// * `Err(ScrapeError)` - Failed to initialize
    pub fn new(config: Config, config_hash: &str) -> Result<Self> {
        let mut sink = SqliteSink::new(Path::new(&config.output.database_path))?;

        let fetcher = HttpFetcher::new(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        let run_id = sink.create_run(config_hash)?;
        tracing::info!("Registered run {}", run_id);

        Ok(Self {
            config: Arc::new(config),
            sink: Arc::new(Mutex::new(sink)),
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(ProfesiaExtractor::new()),
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs the crawl until the queue drains or the task cap is reached
    pub async fn run(&mut self) -> Result<RunStats> {
        let result = self.run_pool().await;

        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.sink
            .lock()
            .map_err(|e| ScrapeError::Channel(format!("sink lock poisoned: {}", e)))?
            .finish_run(self.run_id, status)?;

        result
    }

    async fn run_pool(&self) -> Result<RunStats> {
        let config = self.config.as_ref();
        let started = Instant::now();

        let site = SiteProfile::from_config(&config.site)?;
        let router = Router::new(site_rules(&site)?);

        let queue = TaskQueue::new();
        for task in start_tasks(config, &site)? {
            tracing::info!("Seeding {}", task.url);
            queue.push(task);
        }

        let pipeline = RecordPipeline::spawn(self.sink.clone(), PIPELINE_CAPACITY);

        let dyn_sink: Arc<Mutex<dyn RecordSink>> = self.sink.clone();
        let limit = LimitState::new(config.input.max_entries, config.crawler.page_size)
            .with_persisted(PersistedCount::new(dyn_sink, &config.output.dataset_id)?);

        let pagination = PaginationController::new(
            ListingFilters::from_input(&config.input),
            config.input.count_only,
            Arc::new(limit),
            self.extractor.clone(),
            self.fetcher.clone(),
        );

        let context = Arc::new(CrawlContext::new(
            router,
            self.extractor.clone(),
            self.fetcher.clone(),
            pagination,
            queue.clone(),
            pipeline.handle(),
            HandlerSettings::from_config(config),
        ));

        let pool = TaskPool::new(queue.clone(), PoolSettings::from_config(&config.crawler));
        let pool_stats = pool.run(context.clone(), self.failure_callback()).await;

        // The context owns the last pipeline handle
        drop(context);
        let pipeline_stats = pipeline.finish().await?;

        let stats = RunStats {
            run_id: self.run_id,
            pool: pool_stats,
            records_written: pipeline_stats.written,
            tasks_enqueued: queue.total_enqueued(),
            duration: started.elapsed(),
        };

        tracing::info!(
            "Crawl completed: {} tasks ({} failed), {} records written in {:?}",
            stats.pool.started,
            stats.pool.failed,
            stats.records_written,
            stats.duration
        );

        Ok(stats)
    }

    fn failure_callback(&self) -> FailureCallback {
        let sink = self.sink.clone();
        let run_id = self.run_id;

        Arc::new(move |task: &CrawlTask, error: &ScrapeError| {
            let label = task.label.map(|l| l.as_str());
            let recorded = match sink.lock() {
                Ok(mut sink) => sink
                    .record_failed_request(
                        run_id,
                        task.url.as_str(),
                        label,
                        &error.to_string(),
                        task.retry_count,
                    )
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = recorded {
                tracing::warn!("Could not record failed request {}: {}", task.url, e);
            }
        })
    }
}

/// Main entry point for running a catalog crawl
///
/// # Example
///
/// ```no_run
/// use profesia_harvest::config::load_config_with_hash;
/// use profesia_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let stats = run_crawl(config, &hash).await?;
/// println!("{} records", stats.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: &str) -> Result<RunStats> {
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
