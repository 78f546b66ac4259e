//! Listing pagination
//!
//! One call to [`PaginationController::extract_page`] handles one listing
//! page: it makes sure the page reflects the configured filters, extracts the
//! rows, trims them to the run's entry limit and works out the next page.
//! Scheduling that next page and forwarding the rows is up to the caller.

use crate::crawler::fetcher::Fetch;
use crate::crawler::limit::LimitState;
use crate::extract::{Extractor, JobOffer, Page, PageCountInfo};
use crate::url::{next_page_url, urls_equal, ListingFilters};
use crate::Result;
use std::sync::Arc;
use url::Url;

/// Result of extracting one listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// Filtered URL the rows were extracted from
    pub canonical_url: Url,
    /// Rows to forward, already trimmed to the entry limit
    pub records: Vec<JobOffer>,
    /// Following page, when pagination should continue
    pub next_page_url: Option<Url>,
    pub page_count: Option<PageCountInfo>,
}

pub struct PaginationController {
    filters: ListingFilters,
    count_only: bool,
    limit: Arc<LimitState>,
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn Fetch>,
}

impl PaginationController {
    pub fn new(
        filters: ListingFilters,
        count_only: bool,
        limit: Arc<LimitState>,
        extractor: Arc<dyn Extractor>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            filters,
            count_only,
            limit,
            extractor,
            fetcher,
        }
    }

    pub fn limit(&self) -> &LimitState {
        &self.limit
    }

    /// Extracts one listing page
    ///
    /// # Arguments
    ///
    /// * `page` - The fetched listing page
    /// * `listing_page_num` - 1-based position of the page in its pagination run
    ///
    /// # Returns
    ///
    /// * `Ok(ListingPage)` - Rows to forward and the next page, if any
    /// * `Err(ScrapeError)` - Re-fetching the filtered URL failed
    pub async fn extract_page(&self, page: Page, listing_page_num: u32) -> Result<ListingPage> {
        let canonical_url = self.filters.apply(&page.url);

        let page = if urls_equal(&canonical_url, &page.url) {
            page
        } else {
            tracing::info!("Loading filtered listing {}", canonical_url);
            self.fetcher.get_html(&canonical_url).await?
        };

        let page_count = self.extractor.page_count(&page);

        if self.count_only {
            match &page_count {
                Some(count) => tracing::info!(
                    "Found {} offers in total (showing {} - {}) at {}",
                    count.total,
                    count.range_lower,
                    count.range_upper,
                    canonical_url
                ),
                None => tracing::warn!("Result count not found on {}", canonical_url),
            }
            return Ok(ListingPage {
                canonical_url,
                records: Vec::new(),
                next_page_url: None,
                page_count,
            });
        }

        let mut records = self.extractor.listing_rows(&page);
        if records.is_empty() {
            tracing::info!("No entries on {}, pagination finished", canonical_url);
            return Ok(ListingPage {
                canonical_url,
                records,
                next_page_url: None,
                page_count,
            });
        }

        let reservation =
            self.limit
                .reserve(canonical_url.as_str(), records.len(), listing_page_num);
        records.truncate(reservation.take);

        let listing_url = canonical_url.to_string();
        for record in &mut records {
            record.listing_url = Some(listing_url.clone());
        }

        let next_page_url = if reservation.limit_reached || records.is_empty() {
            tracing::info!("Not scheduling next listing page after {}", canonical_url);
            None
        } else {
            Some(next_page_url(&canonical_url))
        };

        tracing::info!(
            "Extracted {} entries from listing page {} ({})",
            records.len(),
            listing_page_num,
            canonical_url
        );

        Ok(ListingPage {
            canonical_url,
            records,
            next_page_url,
            page_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteWorkType;
    use crate::extract::{ListEntry, PartnerEntry, RelatedListKind};
    use crate::ScrapeError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Serves a fixed number of rows per page until `total` rows are used up
    struct StubExtractor {
        total: usize,
        page_size: usize,
    }

    impl Extractor for StubExtractor {
        fn page_count(&self, _page: &Page) -> Option<PageCountInfo> {
            Some(PageCountInfo {
                total: self.total as u64,
                range_lower: 1,
                range_upper: self.page_size as u64,
            })
        }

        fn listing_rows(&self, page: &Page) -> Vec<JobOffer> {
            let page_num = crate::url::page_number(&page.url) as usize;
            let start = (page_num - 1) * self.page_size;
            let end = (start + self.page_size).min(self.total);
            (start..end.max(start))
                .map(|n| JobOffer {
                    offer_id: Some(format!("O{}", 100 + n)),
                    listing_url: Some(page.url.to_string()),
                    ..JobOffer::default()
                })
                .collect()
        }

        fn job_detail(&self, _page: &Page, partial: Option<&JobOffer>) -> JobOffer {
            partial.cloned().unwrap_or_default()
        }

        fn list_tabs(&self, _page: &Page) -> Vec<String> {
            Vec::new()
        }

        fn list_entries(&self, _page: &Page, _kind: RelatedListKind, _tab: usize) -> Vec<ListEntry> {
            Vec::new()
        }

        fn partners(&self, _page: &Page) -> Vec<PartnerEntry> {
            Vec::new()
        }
    }

    /// Records every URL it is asked for and serves an empty page
    #[derive(Default)]
    struct RecordingFetcher {
        fetched: Mutex<Vec<Url>>,
    }

    #[async_trait]
    impl Fetch for RecordingFetcher {
        async fn get_html(&self, url: &Url) -> Result<Page> {
            self.fetched.lock().unwrap().push(url.clone());
            Ok(Page::new(url.clone(), String::new()))
        }

        async fn post_json(
            &self,
            url: &Url,
            _headers: &[(String, String)],
            _body: &Value,
        ) -> Result<Value> {
            Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status: 405,
            })
        }
    }

    fn controller(
        filters: ListingFilters,
        count_only: bool,
        max: Option<usize>,
        total: usize,
        fetcher: Arc<RecordingFetcher>,
    ) -> PaginationController {
        PaginationController::new(
            filters,
            count_only,
            Arc::new(LimitState::new(max, 20)),
            Arc::new(StubExtractor {
                total,
                page_size: 20,
            }),
            fetcher,
        )
    }

    fn page(raw: &str) -> Page {
        Page::new(Url::parse(raw).unwrap(), String::new())
    }

    #[tokio::test]
    async fn test_pagination_terminates_at_end_of_results() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let controller = controller(ListingFilters::default(), false, None, 45, fetcher.clone());

        let mut url = Url::parse("https://www.profesia.sk/praca/").unwrap();
        let mut page_num = 1;
        let mut total = 0;
        loop {
            let result = controller
                .extract_page(Page::new(url.clone(), String::new()), page_num)
                .await
                .unwrap();
            total += result.records.len();
            match result.next_page_url {
                Some(next) => {
                    url = next;
                    page_num += 1;
                }
                None => break,
            }
            assert!(page_num < 10, "pagination did not terminate");
        }

        assert_eq!(total, 45);
        assert_eq!(page_num, 4);
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limit_truncates_second_page() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let controller = controller(ListingFilters::default(), false, Some(21), 100, fetcher);

        let first = controller
            .extract_page(page("https://www.profesia.sk/praca/"), 1)
            .await
            .unwrap();
        assert_eq!(first.records.len(), 20);
        let next = first.next_page_url.unwrap();
        assert_eq!(next.as_str(), "https://www.profesia.sk/praca/?page_num=2");

        let second = controller
            .extract_page(Page::new(next, String::new()), 2)
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].offer_id.as_deref(), Some("O120"));
        assert!(second.next_page_url.is_none());
    }

    #[tokio::test]
    async fn test_count_only_extracts_nothing() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let controller = controller(ListingFilters::default(), true, None, 100, fetcher);

        let result = controller
            .extract_page(page("https://www.profesia.sk/praca/"), 1)
            .await
            .unwrap();
        assert!(result.records.is_empty());
        assert!(result.next_page_url.is_none());
        assert_eq!(result.page_count.unwrap().total, 100);
    }

    #[tokio::test]
    async fn test_refetches_filtered_url() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let filters = ListingFilters {
            remote_work_type: Some(RemoteWorkType::FullRemote),
            ..ListingFilters::default()
        };
        let controller = controller(filters, false, None, 5, fetcher.clone());

        let result = controller
            .extract_page(page("https://www.profesia.sk/praca/"), 1)
            .await
            .unwrap();

        let expected = "https://www.profesia.sk/praca/?remote_work=1";
        assert_eq!(result.canonical_url.as_str(), expected);
        assert_eq!(fetcher.fetched.lock().unwrap()[0].as_str(), expected);
        assert!(result
            .records
            .iter()
            .all(|r| r.listing_url.as_deref() == Some(expected)));
    }
}
