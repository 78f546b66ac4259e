use crate::config::{DatasetType, SiteConfig};
use crate::{UrlError, UrlResult};
use regex::Regex;
use url::Url;

/// The catalog origin every route pattern and dataset URL is anchored to
///
/// Patterns are built around the host (plus port, when present) so the same
/// rule set classifies `https://www.profesia.sk/praca/` and a local mirror such
/// as `http://127.0.0.1:4000/praca/`.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    base: Url,
    host_pattern: String,
}

impl SiteProfile {
    /// Creates a profile for the given origin
    ///
    /// # Arguments
    ///
    /// * `base_url` - Catalog origin, e.g. `https://www.profesia.sk`
    ///
    /// # Returns
    ///
    /// * `Ok(SiteProfile)` - Origin parsed and host pattern prepared
    /// * `Err(UrlError)` - The origin is not an absolute HTTP(S) URL with a host
    pub fn new(base_url: &str) -> UrlResult<Self> {
        let base = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(base.scheme().to_string()));
        }

        let host = base.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let authority = match base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            host_pattern: regex::escape(&authority),
            base,
        })
    }

    pub fn from_config(config: &SiteConfig) -> UrlResult<Self> {
        Self::new(&config.base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Compiles a case-insensitive pattern matching `<host><suffix>`
    ///
    /// The host must be preceded by a non-word character, which accepts both
    /// `//host` and `www.host`.
    pub fn pattern(&self, suffix: &str) -> UrlResult<Regex> {
        Ok(Regex::new(&format!(
            r"(?i)[\W]{}{}",
            self.host_pattern, suffix
        ))?)
    }

    /// Canonical start URL for a named dataset
    pub fn dataset_url(&self, dataset: DatasetType) -> UrlResult<Url> {
        self.base
            .join(dataset.path())
            .map_err(|e| UrlError::Parse(e.to_string()))
    }

    /// Where the home page redirects to
    pub fn job_offers_url(&self) -> UrlResult<Url> {
        self.dataset_url(DatasetType::JobOffers)
    }
}
