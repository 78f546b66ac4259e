//! Crawler module for the catalog site
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetch`] trait
//! - The task queue and bounded worker pool
//! - Listing pagination under the run's entry limit
//! - Per-label page handlers and overall run coordination

mod coordinator;
mod fetcher;
mod handlers;
mod limit;
mod pagination;
mod scheduler;

pub use coordinator::{run_crawl, start_tasks, Coordinator, RunStats};
pub use fetcher::{build_http_client, Fetch, HttpFetcher};
pub use handlers::{CrawlContext, HandlerSettings};
pub use limit::{LimitState, PersistedCount, Reservation};
pub use pagination::{ListingPage, PaginationController};
pub use scheduler::{
    CrawlTask, FailureCallback, PoolSettings, PoolStats, TaskHandler, TaskPool, TaskQueue,
    UserData,
};
