//! Canonical listing URLs
//!
//! Filters are written onto a listing URL as query parameters (and, for the
//! employment type, as a path segment). Applying them is a set-or-replace
//! operation, so running [`ListingFilters::apply`] on its own output is a no-op.

use crate::config::{EmploymentType, InputConfig, RemoteWorkType, SalaryPeriod};
use url::Url;

const PAGE_PARAM: &str = "page_num";

/// Listing filters taken from the input configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilters {
    pub query: Option<String>,
    pub min_salary_value: Option<u32>,
    pub min_salary_period: Option<SalaryPeriod>,
    pub employment_type: Option<EmploymentType>,
    pub remote_work_type: Option<RemoteWorkType>,
    pub last_n_days: Option<u32>,
}

impl ListingFilters {
    pub fn from_input(input: &InputConfig) -> Self {
        Self {
            query: input.query.clone(),
            min_salary_value: input.min_salary_value,
            min_salary_period: input.min_salary_period,
            employment_type: input.employment_type,
            remote_work_type: input.remote_work_type,
            last_n_days: input.last_n_days,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Salary period to send, falling back to month for values of 100 or more
    pub fn effective_salary_period(&self) -> Option<SalaryPeriod> {
        let value = self.min_salary_value?;
        Some(self.min_salary_period.unwrap_or(if value >= 100 {
            SalaryPeriod::Month
        } else {
            SalaryPeriod::Hour
        }))
    }

    /// Builds the canonical URL for a listing page
    ///
    /// # Arguments
    ///
    /// * `url` - Listing URL as fetched
    ///
    /// # Returns
    ///
    /// A copy of `url` with every configured filter written onto it. Parameters
    /// unrelated to filtering (such as `page_num`) are kept in place.
    pub fn apply(&self, url: &Url) -> Url {
        let mut out = url.clone();

        if let Some(query) = &self.query {
            set_query_param(&mut out, "search_anywhere", query);
        }

        if let Some(days) = self.last_n_days {
            set_query_param(&mut out, "count_days", &days.to_string());
        }

        if let Some(remote) = self.remote_work_type {
            set_query_param(&mut out, "remote_work", remote.code());
        }

        if let Some(value) = self.min_salary_value {
            set_query_param(&mut out, "salary", &value.to_string());
            if self.min_salary_period.is_none() {
                tracing::warn!(
                    "Salary period is missing, using {:?} as fallback",
                    self.effective_salary_period()
                );
            }
            if let Some(period) = self.effective_salary_period() {
                set_query_param(&mut out, "salary_period", period.code());
            }
        }

        if let Some(employment) = self.employment_type {
            apply_employment_segment(&mut out, employment);
        }

        out
    }
}

/// Returns the listing page number encoded in the URL (1 when absent)
pub fn page_number(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(1)
}

/// Builds the URL of the following listing page
///
/// # Examples
///
/// ```
/// use profesia_harvest::url::next_page_url;
/// use url::Url;
///
/// let url = Url::parse("https://www.profesia.sk/praca/?search_anywhere=tech").unwrap();
/// let next = next_page_url(&url);
/// assert_eq!(next.as_str(), "https://www.profesia.sk/praca/?search_anywhere=tech&page_num=2");
/// ```
pub fn next_page_url(url: &Url) -> Url {
    let mut next = url.clone();
    let next_page = page_number(url).saturating_add(1);
    set_query_param(&mut next, PAGE_PARAM, &next_page.to_string());
    next
}

/// Returns a copy of `url` with `key` set to `value`
pub fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let mut out = url.clone();
    set_query_param(&mut out, key, value);
    out
}

/// Sets `key` to `value`, replacing the first occurrence in place and
/// dropping any duplicates, or appending when the key is absent.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;

    for (k, v) in url.query_pairs() {
        if k == key {
            if !replaced {
                pairs.push((k.into_owned(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }

    if !replaced {
        pairs.push((key.to_string(), value.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Inserts the employment type segment right after `/praca`
///
/// Company profiles and offer details keep their path, since the catalog
/// does not serve them under a category prefix.
fn apply_employment_segment(url: &mut Url, employment: EmploymentType) {
    let segment = employment.path_segment();
    let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();

    if segments.first() != Some(&"praca") {
        tracing::debug!("Not a listing path, employment filter skipped: {}", url);
        return;
    }

    if segments.contains(&segment) || segments.iter().any(|s| is_entity_id(s)) {
        return;
    }

    let mut rebuilt = vec!["praca", segment];
    rebuilt.extend_from_slice(&segments[1..]);
    let path = format!("/{}/", rebuilt.join("/"));
    url.set_path(&path);
}

/// `C1234` (company) or `O1234` (offer) path segments
fn is_entity_id(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some('C') | Some('O'))
        && segment.len() >= 3
        && chars.all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn full_filters() -> ListingFilters {
        ListingFilters {
            query: Some("tech lead".to_string()),
            min_salary_value: Some(500),
            min_salary_period: None,
            employment_type: Some(EmploymentType::Internship),
            remote_work_type: Some(RemoteWorkType::FullRemote),
            last_n_days: Some(21),
        }
    }

    #[test]
    fn test_apply_writes_every_filter() {
        let out = full_filters().apply(&url("https://www.profesia.sk/praca/"));
        let pairs: Vec<(String, String)> = out
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(out.path(), "/praca/internship-staz/");
        assert!(pairs.contains(&("search_anywhere".into(), "tech lead".into())));
        assert!(pairs.contains(&("count_days".into(), "21".into())));
        assert!(pairs.contains(&("remote_work".into(), "1".into())));
        assert!(pairs.contains(&("salary".into(), "500".into())));
        assert!(pairs.contains(&("salary_period".into(), "m".into())));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let filters = full_filters();
        for raw in [
            "https://www.profesia.sk/praca/",
            "https://www.profesia.sk/praca/bratislavsky-kraj/?page_num=3",
            "https://www.profesia.sk/praca/?search_anywhere=old&search_anywhere=dup",
            "https://www.profesia.sk/praca/accenture/C3691",
        ] {
            let once = filters.apply(&url(raw));
            let twice = filters.apply(&once);
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_apply_replaces_existing_values_in_place() {
        let filters = ListingFilters {
            query: Some("rust".to_string()),
            ..ListingFilters::default()
        };
        let out = filters.apply(&url(
            "https://www.profesia.sk/praca/?search_anywhere=java&page_num=2",
        ));
        assert_eq!(
            out.as_str(),
            "https://www.profesia.sk/praca/?search_anywhere=rust&page_num=2"
        );
    }

    #[test]
    fn test_empty_filters_keep_url() {
        let filters = ListingFilters::default();
        assert!(filters.is_empty());
        let original = url("https://www.profesia.sk/praca/?page_num=2");
        assert_eq!(filters.apply(&original), original);
    }

    #[test]
    fn test_salary_period_fallback() {
        let mut filters = ListingFilters {
            min_salary_value: Some(99),
            ..ListingFilters::default()
        };
        assert_eq!(filters.effective_salary_period(), Some(SalaryPeriod::Hour));

        filters.min_salary_value = Some(100);
        assert_eq!(filters.effective_salary_period(), Some(SalaryPeriod::Month));

        filters.min_salary_period = Some(SalaryPeriod::Hour);
        assert_eq!(filters.effective_salary_period(), Some(SalaryPeriod::Hour));
    }

    #[test]
    fn test_employment_segment_skips_entity_pages() {
        let filters = ListingFilters {
            employment_type: Some(EmploymentType::Fte),
            ..ListingFilters::default()
        };
        let company = url("https://www.profesia.sk/praca/accenture/C3691");
        assert_eq!(filters.apply(&company), company);

        let listing = filters.apply(&url("https://www.profesia.sk/praca"));
        assert_eq!(listing.path(), "/praca/plny-uvazok/");
    }

    #[test]
    fn test_next_page_url_increments() {
        let first = url("https://www.profesia.sk/praca/?search_anywhere=tech");
        let second = next_page_url(&first);
        assert_eq!(page_number(&first), 1);
        assert_eq!(page_number(&second), 2);
        assert_eq!(page_number(&next_page_url(&second)), 3);
    }
}
