use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://www.profesia.sk";
pub const DEFAULT_STORE_ENDPOINT: &str =
    "https://ow0o5i3qo7-dsn.algolia.net/1/indexes/prod_PUBLIC_STORE/query";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub store: Option<StoreConfig>,
}

/// Which catalog site the router and the dataset URLs point at
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin of the catalog, e.g. `https://www.profesia.sk`
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Named entry points of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatasetType {
    JobOffers,
    Industries,
    Professions,
    Companies,
    Locations,
    Languages,
    Partners,
}

impl DatasetType {
    /// Path of the canonical start page for this dataset, relative to the site origin
    pub fn path(&self) -> &'static str {
        match self {
            Self::JobOffers => "/praca/",
            Self::Industries => "/praca/zoznam-pracovnych-oblasti/",
            Self::Professions => "/praca/zoznam-pozicii/",
            Self::Companies => "/praca/zoznam-spolocnosti/",
            Self::Locations => "/praca/zoznam-lokalit/",
            Self::Languages => "/praca/zoznam-jazykovych-znalosti/",
            Self::Partners => "/partneri",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryPeriod {
    Month,
    Hour,
}

impl SalaryPeriod {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Month => "m",
            Self::Hour => "h",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmploymentType {
    Fte,
    Pte,
    Selfemploy,
    Voluntary,
    Internship,
}

impl EmploymentType {
    pub const ALL: [EmploymentType; 5] = [
        Self::Fte,
        Self::Pte,
        Self::Selfemploy,
        Self::Voluntary,
        Self::Internship,
    ];

    /// Path segment the catalog uses to filter listings by this employment type
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Fte => "plny-uvazok",
            Self::Pte => "skrateny-uvazok",
            Self::Selfemploy => "zivnost",
            Self::Voluntary => "na-dohodu-brigady",
            Self::Internship => "internship-staz",
        }
    }

    /// Label shown on an offer's detail page
    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Fte => "plný úväzok",
            Self::Pte => "skrátený úväzok",
            Self::Selfemploy => "živnosť",
            Self::Voluntary => "na dohodu (brigády)",
            Self::Internship => "internship, stáž",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fte => "fte",
            Self::Pte => "pte",
            Self::Selfemploy => "selfemploy",
            Self::Voluntary => "voluntary",
            Self::Internship => "internship",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteWorkType {
    FullRemote,
    PartialRemote,
    NoRemote,
}

impl RemoteWorkType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::FullRemote => "1",
            Self::PartialRemote => "2",
            Self::NoRemote => "0",
        }
    }
}

/// What to crawl and how to filter it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    /// Explicit URLs to start from (exclusive with `dataset_type`)
    #[serde(rename = "start-urls", default)]
    pub start_urls: Vec<String>,

    /// Named dataset mapped to a canonical start URL (exclusive with `start_urls`)
    #[serde(rename = "dataset-type", default)]
    pub dataset_type: Option<DatasetType>,

    /// Follow each listing row to its detail page
    #[serde(default)]
    pub detailed: bool,

    /// Free-text search query
    #[serde(default)]
    pub query: Option<String>,

    #[serde(rename = "min-salary-value", default)]
    pub min_salary_value: Option<u32>,

    #[serde(rename = "min-salary-period", default)]
    pub min_salary_period: Option<SalaryPeriod>,

    #[serde(rename = "employment-type", default)]
    pub employment_type: Option<EmploymentType>,

    #[serde(rename = "remote-work-type", default)]
    pub remote_work_type: Option<RemoteWorkType>,

    /// Only offers added within the last N days
    #[serde(rename = "last-n-days", default)]
    pub last_n_days: Option<u32>,

    /// Maximum number of listing records emitted per run
    #[serde(rename = "max-entries", default)]
    pub max_entries: Option<usize>,

    /// Only log the reported result count, extract nothing
    #[serde(rename = "count-only", default)]
    pub count_only: bool,

    /// Keep contact details and phone numbers in detail records
    #[serde(rename = "include-personal-data", default)]
    pub include_personal_data: bool,
}

/// Worker pool behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of tasks running at once
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Retries per task before it is reported as failed
    #[serde(rename = "max-request-retries", default = "default_max_request_retries")]
    pub max_request_retries: u32,

    /// Timeout for a single task (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for listing tasks, which may expand details inline (seconds)
    #[serde(rename = "listing-timeout-secs", default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,

    /// Base delay before the first retry; doubles on each further attempt (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause between sequential detail fetches within one listing page (milliseconds)
    #[serde(rename = "detail-pause-ms", default = "default_detail_pause_ms")]
    pub detail_pause_ms: u64,

    /// Number of rows the catalog shows per listing page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: usize,

    /// Hard cap on the number of tasks started in one run
    #[serde(rename = "max-requests-per-crawl", default)]
    pub max_requests_per_crawl: Option<usize>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_request_retries: default_max_request_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            listing_timeout_secs: default_listing_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
            detail_pause_ms: default_detail_pause_ms(),
            page_size: default_page_size(),
            max_requests_per_crawl: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "profesia-harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/profesia-harvest".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Dataset receiving catalog records
    #[serde(rename = "dataset-id", default = "default_dataset_id")]
    pub dataset_id: String,

    /// Dataset receiving error reports
    #[serde(rename = "reporting-dataset-id", default = "default_reporting_dataset_id")]
    pub reporting_dataset_id: String,
}

/// Store harvest configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Faceted query endpoint the store page talks to
    #[serde(rename = "endpoint-url", default = "default_store_endpoint")]
    pub endpoint_url: String,

    #[serde(rename = "api-key", default)]
    pub api_key: String,

    #[serde(rename = "application-id", default)]
    pub application_id: String,

    /// Query that replaces the one found on intercepted requests
    #[serde(default)]
    pub query: Option<String>,

    /// Category texts to visit; empty means every known category
    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(rename = "hits-per-page", default = "default_hits_per_page")]
    pub hits_per_page: u32,

    /// Pause between cursor pages of one facet (milliseconds)
    #[serde(rename = "page-pause-ms", default = "default_page_pause_ms")]
    pub page_pause_ms: u64,

    /// How long to wait for a selected category to be intercepted (milliseconds)
    #[serde(rename = "facet-wait-ms", default = "default_facet_wait_ms")]
    pub facet_wait_ms: u64,

    /// Pause after each category selection (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(rename = "dataset-id", default = "default_store_dataset_id")]
    pub dataset_id: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_concurrency() -> u32 {
    5
}

fn default_max_request_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_listing_timeout_secs() -> u64 {
    180
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_detail_pause_ms() -> u64 {
    100
}

fn default_page_size() -> usize {
    20
}

fn default_dataset_id() -> String {
    "default".to_string()
}

fn default_reporting_dataset_id() -> String {
    "REPORTING".to_string()
}

fn default_store_endpoint() -> String {
    DEFAULT_STORE_ENDPOINT.to_string()
}

fn default_hits_per_page() -> u32 {
    500
}

fn default_page_pause_ms() -> u64 {
    300
}

fn default_facet_wait_ms() -> u64 {
    10_000
}

fn default_settle_ms() -> u64 {
    500
}

fn default_store_dataset_id() -> String {
    "store".to_string()
}
