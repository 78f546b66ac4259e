//! Per-task page handling
//!
//! [`CrawlContext`] fetches a task's page, classifies it when the task has no
//! label yet, and dispatches on the label. Every handler error is reported to
//! the reporting dataset before being handed back to the worker pool.
//!
//! Handlers that store records page by page (detail expansion, related-list
//! tabs) remember what they stored, so a retried task resumes instead of
//! storing the same records twice.

use crate::config::Config;
use crate::crawler::fetcher::Fetch;
use crate::crawler::pagination::PaginationController;
use crate::crawler::scheduler::{CrawlTask, TaskHandler, TaskQueue, UserData};
use crate::extract::{Extractor, JobOffer, Page, RelatedListKind};
use crate::router::{Dispatch, RouteAction, RouteLabel, Router};
use crate::storage::{ErrorReport, PipelineHandle, PushOptions};
use crate::url::{resolve_link, with_query_param};
use crate::{Result, ScrapeError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Detail-page fields holding personal data
const PERSONAL_FIELDS: [&str; 2] = ["employerContact", "phoneNumbers"];

#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub dataset_id: String,
    pub reporting_dataset_id: String,
    /// Follow every listing row to its detail page
    pub detailed: bool,
    pub include_personal_data: bool,
    pub detail_pause: Duration,
}

impl HandlerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dataset_id: config.output.dataset_id.clone(),
            reporting_dataset_id: config.output.reporting_dataset_id.clone(),
            detailed: config.input.detailed,
            include_personal_data: config.input.include_personal_data,
            detail_pause: Duration::from_millis(config.crawler.detail_pause_ms),
        }
    }

    fn detail_push_options(&self) -> PushOptions {
        if self.include_personal_data {
            PushOptions::default()
        } else {
            PushOptions::redacting(PERSONAL_FIELDS)
        }
    }
}

/// Everything a task needs, shared by all tasks of a run
pub struct CrawlContext {
    router: Router,
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn Fetch>,
    pagination: PaginationController,
    queue: TaskQueue,
    records: PipelineHandle,
    settings: HandlerSettings,
    /// Sub-pages whose records were already stored this run
    stored: Mutex<HashSet<String>>,
}

impl CrawlContext {
    pub fn new(
        router: Router,
        extractor: Arc<dyn Extractor>,
        fetcher: Arc<dyn Fetch>,
        pagination: PaginationController,
        queue: TaskQueue,
        records: PipelineHandle,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            router,
            extractor,
            fetcher,
            pagination,
            queue,
            records,
            settings,
            stored: Mutex::new(HashSet::new()),
        }
    }

    fn stored(&self) -> MutexGuard<'_, HashSet<String>> {
        self.stored.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_stored(&self, url: &url::Url) -> bool {
        self.stored().contains(url.as_str())
    }

    fn mark_stored(&self, url: &url::Url) {
        self.stored().insert(url.to_string());
    }

    async fn process(&self, task: &CrawlTask, page: Page) -> Result<()> {
        let label = match task.label {
            Some(label) => label,
            None => match self.router.classify(&page.url, Some(&page)).dispatch {
                Dispatch::Handle(label) => label,
                Dispatch::Override(action) => {
                    self.run_action(action, &page);
                    return Ok(());
                }
                Dispatch::Unmatched => return Ok(()),
            },
        };

        match label {
            RouteLabel::JobListing => self.handle_listing(task, page).await,
            RouteLabel::JobDetail => self.handle_detail(task, page).await,
            RouteLabel::JobRelatedList => self.handle_related_list(page).await,
            RouteLabel::Partners => self.handle_partners(page).await,
        }
    }

    fn run_action(&self, action: RouteAction, page: &Page) {
        match action {
            RouteAction::Redirect(url) => {
                tracing::info!("Redirecting to {}", url);
                self.queue.push_front(CrawlTask::new(url));
            }
            RouteAction::Unsupported(reason) => {
                tracing::error!(
                    "UNSUPPORTED PAGE TYPE DETECTED - {}. URL will not be processed. URL: {}",
                    reason,
                    page.url
                );
            }
        }
    }

    async fn handle_listing(&self, task: &CrawlTask, page: Page) -> Result<()> {
        let page_num = task.user_data.listing_page_num.unwrap_or(1);
        let listing = self.pagination.extract_page(page, page_num).await?;

        // Scheduled before the rows are forwarded so the next page loads
        // while detail pages of this one are fetched
        if let Some(next) = &listing.next_page_url {
            self.queue.push(
                CrawlTask::new(next.clone())
                    .with_label(RouteLabel::JobListing)
                    .with_user_data(UserData {
                        listing_page_num: Some(page_num + 1),
                        partial_offer: None,
                    }),
            );
        }

        if listing.records.is_empty() {
            return Ok(());
        }

        let source = listing.canonical_url.to_string();
        if !self.settings.detailed {
            return self
                .records
                .push(
                    &self.settings.dataset_id,
                    &listing.records,
                    PushOptions::default(),
                    Some(&source),
                )
                .await;
        }

        tracing::info!("Fetching details page of {} entries", listing.records.len());
        for offer in &listing.records {
            self.expand_detail(offer, &listing.canonical_url).await?;
            tokio::time::sleep(self.settings.detail_pause).await;
        }
        Ok(())
    }

    /// Fetches a listing row's detail page and stores the merged record
    async fn expand_detail(&self, offer: &JobOffer, listing_url: &url::Url) -> Result<()> {
        let Some(offer_url) = offer
            .offer_url
            .as_deref()
            .and_then(|href| resolve_link(href, listing_url))
        else {
            tracing::info!(
                "Skipping details page, URL is missing (ID: {:?})",
                offer.offer_id
            );
            return Ok(());
        };

        if self.is_stored(&offer_url) {
            tracing::debug!("Details page already stored (ID: {:?})", offer.offer_id);
            return Ok(());
        }

        tracing::debug!("Fetching details page (ID: {:?}) {}", offer.offer_id, offer_url);
        let detail_page = self.fetcher.get_html(&offer_url).await?;
        let detailed = self.extractor.job_detail(&detail_page, Some(offer));

        self.records
            .push(
                &self.settings.dataset_id,
                &[detailed],
                self.settings.detail_push_options(),
                Some(offer_url.as_str()),
            )
            .await?;
        self.mark_stored(&offer_url);
        Ok(())
    }

    async fn handle_detail(&self, task: &CrawlTask, page: Page) -> Result<()> {
        let offer = self
            .extractor
            .job_detail(&page, task.user_data.partial_offer.as_ref());

        self.records
            .push(
                &self.settings.dataset_id,
                &[offer],
                self.settings.detail_push_options(),
                Some(page.url.as_str()),
            )
            .await
    }

    /// Extracts every tab of a related-list page, one tab at a time
    async fn handle_related_list(&self, page: Page) -> Result<()> {
        let kind = if page.url.path().starts_with("/praca/zoznam-lokalit") {
            RelatedListKind::Locations
        } else {
            RelatedListKind::Generic
        };

        let tabs = self.extractor.list_tabs(&page);
        tracing::info!("Found {} tabs on {}", tabs.len(), page.url);

        // Pages without tabs are still extracted once
        let tab_count = tabs.len().max(1);
        for index in 0..tab_count {
            let tab_url = with_query_param(&page.url, "tab_index", &index.to_string());
            let tab_name = tabs.get(index).map(String::as_str).unwrap_or("-");

            if self.is_stored(&tab_url) {
                tracing::debug!("Entries for tab {} already stored", tab_name);
                continue;
            }

            tracing::info!("Fetching entries for tab {}", tab_name);
            let tab_page = self.fetcher.get_html(&tab_url).await?;
            let entries = self.extractor.list_entries(&tab_page, kind, index);
            tracing::info!("Extracted {} entries from tab {}", entries.len(), tab_name);

            self.records
                .push(
                    &self.settings.dataset_id,
                    &entries,
                    PushOptions::default(),
                    Some(tab_url.as_str()),
                )
                .await?;
            self.mark_stored(&tab_url);
        }
        Ok(())
    }

    async fn handle_partners(&self, page: Page) -> Result<()> {
        let entries = self.extractor.partners(&page);
        tracing::info!("Extracted {} partner entries", entries.len());

        self.records
            .push(
                &self.settings.dataset_id,
                &entries,
                PushOptions::default(),
                Some(page.url.as_str()),
            )
            .await
    }

    async fn report_error(&self, task: &CrawlTask, error: &ScrapeError, snapshot: Option<String>) {
        let report = ErrorReport::new(
            task.url.as_str(),
            task.label.map(|l| l.as_str()),
            error,
        )
        .with_snapshot(snapshot);

        if let Err(e) = self
            .records
            .push(
                &self.settings.reporting_dataset_id,
                &[report],
                PushOptions::default(),
                Some(task.url.as_str()),
            )
            .await
        {
            tracing::error!("Failed to report error for {}: {}", task.url, e);
        }
    }
}

#[async_trait]
impl TaskHandler for CrawlContext {
    async fn handle(&self, task: &CrawlTask) -> Result<()> {
        let page = match self.fetcher.get_html(&task.url).await {
            Ok(page) => page,
            Err(e) => {
                self.report_error(task, &e, None).await;
                return Err(e);
            }
        };

        let snapshot = page.body.clone();
        match self.process(task, page).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.report_error(task, &e, Some(snapshot)).await;
                Err(e)
            }
        }
    }
}
