//! Page extraction
//!
//! Handlers pass a fetched [`Page`] (URL plus raw body) around; HTML is only
//! parsed inside the synchronous [`Extractor`] calls, so a parsed document
//! never lives across an await point.

mod profesia;
mod types;

pub use profesia::ProfesiaExtractor;
pub use types::{
    CategoryLink, ChangeType, JobDetailFields, JobOffer, ListEntry, PageCountInfo, PartnerEntry,
    RelatedListKind, SalaryFields,
};

use scraper::{Html, Selector};
use url::Url;

/// A fetched page: the URL it was loaded from and its body
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

impl Page {
    pub fn new(url: Url, body: String) -> Self {
        Self { url, body }
    }

    /// Parses the body as an HTML document
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// Whether any element of the document matches `css`
    ///
    /// An invalid selector never matches.
    pub fn has_match(&self, css: &str) -> bool {
        let Ok(selector) = Selector::parse(css) else {
            tracing::warn!("Invalid selector '{}'", css);
            return false;
        };
        self.document().select(&selector).next().is_some()
    }
}

/// Turns fetched pages into records
///
/// Implementations are synchronous and shared between concurrently running
/// tasks.
pub trait Extractor: Send + Sync {
    /// Reported result count above a listing, when present
    fn page_count(&self, page: &Page) -> Option<PageCountInfo>;

    /// Job offers listed on a listing page, in page order
    fn listing_rows(&self, page: &Page) -> Vec<JobOffer>;

    /// Job offer from a detail page, merged over `partial` when the offer
    /// was reached from a listing row
    fn job_detail(&self, page: &Page, partial: Option<&JobOffer>) -> JobOffer;

    /// Names of the navigation tabs on a related-list page
    fn list_tabs(&self, page: &Page) -> Vec<String>;

    /// Entries of one related-list tab
    fn list_entries(&self, page: &Page, kind: RelatedListKind, tab_index: usize) -> Vec<ListEntry>;

    /// Entries of the partners page
    fn partners(&self, page: &Page) -> Vec<PartnerEntry>;
}
