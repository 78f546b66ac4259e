use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result count summary shown above a listing (`"1 - 20 z 1 234"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCountInfo {
    pub total: u64,
    pub range_lower: u64,
    pub range_upper: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
}

/// Salary fields shared by listing rows and detail pages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryFields {
    pub salary_range: Option<String>,
    pub salary_range_lower: Option<f64>,
    pub salary_range_upper: Option<f64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
}

impl SalaryFields {
    /// Parses texts like `Od 6,5 EUR/hod.` or `35 000 - 45 000 Kč/mesiac`
    ///
    /// Unparseable text is kept in `salary_range` with the other fields empty.
    pub fn parse(text: Option<&str>) -> Self {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::default();
        };

        let mut fields = Self {
            salary_range: Some(text.to_string()),
            ..Self::default()
        };

        let single = Regex::new(
            r"(?i)^[a-z]*\s*(?P<low>[\d, ]+)\s*(?P<curr>[\w\p{L}\p{M}\p{Zs}]+)/(?P<period>\w+)",
        );
        let range = Regex::new(
            r"(?i)^(?P<low>[\d,. ]+)\s*-\s*(?P<up>[\d,. ]+)(?P<curr>[\w\p{L}\p{M}\p{Zs}]+)/(?P<period>\w+)",
        );

        let captures = [single, range]
            .into_iter()
            .filter_map(Result::ok)
            .find_map(|re| re.captures(text));

        if let Some(caps) = captures {
            fields.salary_range_lower = caps.name("low").and_then(|m| parse_amount(m.as_str()));
            fields.salary_range_upper = caps.name("up").and_then(|m| parse_amount(m.as_str()));
            fields.salary_currency = caps
                .name("curr")
                .map(|m| m.as_str().trim().to_string())
                .filter(|c| !c.is_empty());
            fields.salary_period = caps.name("period").map(|m| m.as_str().to_string());
        }

        fields
    }
}

/// `"35 000"` -> 35000, `"6,5"` -> 6.5
fn parse_amount(raw: &str) -> Option<f64> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    compact.trim_matches('.').parse().ok()
}

/// Link to a location or position category on a detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLink {
    pub url: Option<String>,
    pub name: Option<String>,
}

/// Fields only available on an offer's detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailFields {
    #[serde(default)]
    pub employment_types: Vec<String>,
    pub start_date: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    pub date_posted: Option<String>,
    #[serde(default)]
    pub location_categs: Vec<CategoryLink>,
    #[serde(default)]
    pub position_categs: Vec<CategoryLink>,
    /// Description subsections keyed by field name (e.g. `jobInfoBenefits`)
    #[serde(flatten)]
    pub description: BTreeMap<String, String>,
}

/// One job offer, from a listing row and optionally enriched by its detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOffer {
    pub listing_url: Option<String>,

    pub employer_name: Option<String>,
    pub employer_url: Option<String>,
    pub employer_logo_url: Option<String>,

    pub offer_name: Option<String>,
    pub offer_url: Option<String>,
    pub offer_id: Option<String>,

    pub location: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub last_change_relative_time: Option<String>,
    pub last_change_type: Option<ChangeType>,

    #[serde(flatten)]
    pub salary: SalaryFields,

    #[serde(flatten)]
    pub detail: Option<JobDetailFields>,
}

impl JobOffer {
    /// Fills detail-page values over the listing values
    ///
    /// Listing values survive wherever the detail page had nothing.
    pub fn merge_detail(mut self, detail: JobOffer) -> JobOffer {
        fn pick(detail: Option<String>, listing: Option<String>) -> Option<String> {
            detail.or(listing)
        }

        self.employer_name = pick(detail.employer_name, self.employer_name);
        self.employer_url = pick(detail.employer_url, self.employer_url);
        self.employer_logo_url = pick(detail.employer_logo_url, self.employer_logo_url);
        self.offer_name = pick(detail.offer_name, self.offer_name);
        self.offer_url = pick(detail.offer_url, self.offer_url);
        self.offer_id = pick(detail.offer_id, self.offer_id);
        self.location = pick(detail.location, self.location);
        if !detail.labels.is_empty() {
            self.labels = detail.labels;
        }
        if detail.salary.salary_range.is_some() {
            self.salary = detail.salary;
        }
        self.detail = detail.detail;
        self
    }
}

/// Entry of a related-list directory page (industries, positions, companies...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub url: Option<String>,
    pub name: Option<String>,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Which related-list page is being extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedListKind {
    Generic,
    /// Location entries also carry region and country
    Locations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerEntry {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub category: Option<String>,
}
