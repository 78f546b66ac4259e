//! Extraction of the catalog's page layouts
//!
//! Handles:
//! - Listing rows and the result counter above them
//! - Offer detail pages (basic info, salary, description sections, categories)
//! - Related-list directory pages with their navigation tabs
//! - The partners page

use crate::config::EmploymentType;
use crate::extract::types::{
    CategoryLink, ChangeType, JobDetailFields, JobOffer, ListEntry, PageCountInfo, PartnerEntry,
    RelatedListKind, SalaryFields,
};
use crate::extract::{Extractor, Page};
use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

const LISTING_ROW: &str = ".list-row:not(.native-agent):not(.reach-list)";
const SALARY_LABEL: &str = r#".label-group > a[data-dimension7="Salary label"]"#;
const OTHER_LABELS: &str = r#".label-group > a:not([data-dimension7="Salary label"])"#;
const HOME_COUNTRY: &str = "Slovenská republika";

/// Description sections of a detail page: container selector, then
/// (field name, heading fragments that identify it)
const DESCRIPTION_SECTIONS: &[(&str, &[(&str, &[&str])])] = &[
    (
        ".job-info",
        &[
            (
                "jobInfoResponsibilities",
                &["náplň práce", "právomoci", "zodpovednosti"],
            ),
            ("jobInfoBenefits", &["výhody", "benefity"]),
            (
                "jobInfoDeadline",
                &["termín", "ukončenia", "výberového konania"],
            ),
        ],
    ),
    (
        ".job-requirements",
        &[
            ("jobReqEducation", &["vzdelaním"]),
            ("jobReqExpertise", &["vzdelanie v odbore"]),
            ("jobReqLanguage", &["jazykové"]),
            ("jobReqOther", &["ostatné"]),
            ("jobReqDriversLicense", &["vodičský"]),
            ("jobReqIndustry", &["pozícii", "v oblasti"]),
            ("jobReqSuitableForGraduate", &["absolventa"]),
            (
                "jobReqPersonalSkills",
                &["osobnostné", "predpoklady", "zručnosti"],
            ),
        ],
    ),
    (
        ".company-info",
        &[
            ("employerDescription", &["charakteristika spoločnosti"]),
            ("employeeCount", &["počet zamestnancov"]),
            ("employerContact", &["kontakt"]),
        ],
    ),
];

/// Selector-based extractor for the catalog's markup
#[derive(Debug, Clone, Default)]
pub struct ProfesiaExtractor;

impl ProfesiaExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ProfesiaExtractor {
    fn page_count(&self, page: &Page) -> Option<PageCountInfo> {
        let document = page.document();
        let text = first_text(document.root_element(), ".offer-counter")?;
        let info = parse_offer_counter(&text);
        tracing::debug!("Parsed results count {:?} from '{}'", info, text);
        info
    }

    fn listing_rows(&self, page: &Page) -> Vec<JobOffer> {
        let document = page.document();
        let rows = select_all(document.root_element(), LISTING_ROW);

        let offers: Vec<JobOffer> = rows
            .into_iter()
            .map(|row| extract_listing_row(row, &page.url))
            .collect();

        tracing::debug!("Found {} listing rows on {}", offers.len(), page.url);
        offers
    }

    fn job_detail(&self, page: &Page, partial: Option<&JobOffer>) -> JobOffer {
        let document = page.document();
        let detail = extract_job_detail(&document, &page.url);

        match partial {
            Some(listing) => listing.clone().merge_detail(detail),
            None => detail,
        }
    }

    fn list_tabs(&self, page: &Page) -> Vec<String> {
        let document = page.document();
        select_all(document.root_element(), ".nav-tabs a")
            .into_iter()
            .map(text_of)
            .collect()
    }

    fn list_entries(&self, page: &Page, kind: RelatedListKind, tab_index: usize) -> Vec<ListEntry> {
        let document = page.document();
        let entries = extract_list_entries(&document, &page.url);

        entries
            .into_iter()
            .map(|(mut entry, heading)| {
                if kind == RelatedListKind::Locations {
                    if tab_index == 0 {
                        entry.region = heading;
                        entry.country = Some(HOME_COUNTRY.to_string());
                    } else {
                        entry.region = None;
                        entry.country = heading;
                    }
                }
                entry
            })
            .collect()
    }

    fn partners(&self, page: &Page) -> Vec<PartnerEntry> {
        let document = page.document();
        let root = document.root_element();

        let categories: Vec<String> = select_all(root, ".nav-tabs a")
            .into_iter()
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect();
        tracing::debug!("Found {} partner categories", categories.len());

        select_all(root, ".tab-content .card")
            .into_iter()
            .enumerate()
            .flat_map(|(index, card)| {
                let category = categories.get(index).cloned();
                select_all(card, ".row")
                    .into_iter()
                    .map(move |row| extract_partner(row, &page.url, category.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// `"1 - 20 z 1 234"` -> total 1234, range 1..20
fn parse_offer_counter(text: &str) -> Option<PageCountInfo> {
    let (range, total) = text.split_once('z')?;
    let (lower, upper) = range.split_once('-').unwrap_or((range, range));

    Some(PageCountInfo {
        total: parse_count(total).unwrap_or(0),
        range_lower: parse_count(lower).unwrap_or(0),
        range_upper: parse_count(upper).unwrap_or(0),
    })
}

fn extract_listing_row(row: ElementRef<'_>, listing_url: &Url) -> JobOffer {
    let offer_link = select_first(row, "h2 a");
    let offer_url = offer_link.and_then(|a| href_of(a, listing_url));
    let offer_id = offer_url.as_deref().and_then(find_offer_id);

    let labels = select_all(row, OTHER_LABELS)
        .into_iter()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    let (last_change_relative_time, last_change_type) = match select_first(row, ".list-footer .info") {
        Some(info) => {
            let relative = first_text(info, "strong");
            let remainder = text_without(info, relative.as_deref()).to_lowercase();
            let change = if remainder == "pridané" {
                ChangeType::Added
            } else {
                ChangeType::Modified
            };
            (relative, Some(change))
        }
        None => (None, None),
    };

    JobOffer {
        listing_url: Some(listing_url.to_string()),
        employer_name: first_text(row, ".employer"),
        employer_url: select_first(row, ".offer-company-logo-link")
            .and_then(|a| href_of(a, listing_url)),
        employer_logo_url: first_attr_url(row, ".offer-company-logo-link img", "src", listing_url),
        offer_name: offer_link.map(text_of).filter(|t| !t.is_empty()),
        offer_url,
        offer_id,
        location: first_text(row, ".job-location"),
        labels,
        last_change_relative_time,
        last_change_type,
        salary: SalaryFields::parse(first_text(row, SALARY_LABEL).as_deref()),
        detail: None,
    }
}

fn extract_job_detail(document: &Html, page_url: &Url) -> JobOffer {
    let root = document.root_element();
    let container = select_first(root, "#content .container");
    let entry = container.and_then(|c| select_first(c, "#detail .card-content"));

    let labels = container
        .map(|c| {
            select_all(c, ".label")
                .into_iter()
                .map(|el| text_of(el).to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let Some(entry) = entry else {
        tracing::warn!("Detail container not found on {}", page_url);
        return JobOffer {
            offer_url: Some(page_url.to_string()),
            offer_id: find_offer_id(page_url.as_str()),
            labels,
            ..JobOffer::default()
        };
    };

    let employment_text = first_text(entry, r#"[itemprop="employmentType"]"#).unwrap_or_default();
    let employment_types = EmploymentType::ALL
        .iter()
        .filter(|t| employment_text.contains(t.display_text()))
        .map(|t| t.as_str().to_string())
        .collect();

    let phone_numbers = select_all(entry, ".details-section .tel")
        .into_iter()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    let (location_categs, position_categs) = extract_detail_categories(entry, page_url);

    JobOffer {
        listing_url: None,
        employer_name: first_text(entry, r#"[itemprop="hiringOrganization"]"#),
        employer_url: select_first(entry, ".easy-design-btn-offer-list")
            .and_then(|a| href_of(a, page_url)),
        employer_logo_url: first_attr_url(entry, ".easy-design-logo img", "src", page_url),
        offer_name: first_text(entry, r#"[itemprop="title"]"#),
        offer_url: Some(page_url.to_string()),
        offer_id: find_offer_id(page_url.as_str()),
        location: first_text(entry, r#"[itemprop="jobLocation"]"#),
        labels,
        last_change_relative_time: None,
        last_change_type: None,
        salary: SalaryFields::parse(first_text(entry, ".salary-range").as_deref()),
        detail: Some(JobDetailFields {
            employment_types,
            start_date: first_text(
                entry,
                ".panel-body > .row:nth-child(2) > div:nth-child(1) span",
            ),
            phone_numbers,
            date_posted: first_text(entry, r#"[itemprop="datePosted"]"#),
            location_categs,
            position_categs,
            description: extract_description(entry),
        }),
    }
}

/// Walks each description section as (heading, content) pairs of child elements
fn extract_description(entry: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut description = BTreeMap::new();

    for (section_css, subsections) in DESCRIPTION_SECTIONS {
        let Some(section) = select_first(entry, section_css) else {
            continue;
        };

        let children: Vec<ElementRef<'_>> = section
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| !has_class(*el, "subtitle-line"))
            .collect();

        for pair in children.chunks(2) {
            let [title, content] = pair else {
                continue;
            };
            let title_text = text_of(*title).to_lowercase();

            for (field, fragments) in subsections.iter() {
                if fragments.iter().any(|f| title_text.contains(f)) {
                    let muted: Vec<String> = select_all(*content, ".text-gray")
                        .into_iter()
                        .map(text_of)
                        .collect();
                    let mut text = text_of(*content);
                    for noise in muted.iter().filter(|m| !m.is_empty()) {
                        text = text.replacen(noise.as_str(), "", 1);
                    }
                    description.insert(field.to_string(), collapse_whitespace(&text));
                }
            }
        }
    }

    description
}

fn extract_detail_categories(
    entry: ElementRef<'_>,
    page_url: &Url,
) -> (Vec<CategoryLink>, Vec<CategoryLink>) {
    let mut locations = Vec::new();
    let mut positions = Vec::new();

    let Some(overview) = select_first(entry, ".overall-info .hidden-xs") else {
        return (locations, positions);
    };

    let mut heading = String::new();
    for child in overview.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "strong" => heading = text_of(child).to_lowercase(),
            "a" => {
                let link = CategoryLink {
                    url: href_of(child, page_url),
                    name: Some(text_of(child)).filter(|t| !t.is_empty()),
                };
                if heading.contains("lokalit") {
                    locations.push(link);
                } else if heading.contains("pozícia") {
                    positions.push(link);
                }
            }
            _ => {}
        }
    }

    (locations, positions)
}

/// Entries of one related-list tab, each paired with the heading it falls under
fn extract_list_entries(document: &Html, page_url: &Url) -> Vec<(ListEntry, Option<String>)> {
    let root = document.root_element();
    let container = select_first(root, "h1")
        .and_then(|h1| h1.parent())
        .and_then(ElementRef::wrap)
        .unwrap_or(root);

    let mut last_heading: Option<String> = None;
    let mut entries = Vec::new();

    for link in select_all(container, ".card a") {
        let Some(url) = href_of(link, page_url) else {
            continue;
        };

        let (name, count) = if select_first(link, "h2").is_some() {
            let count_text = first_text(link, "span");
            let name = text_without(link, count_text.as_deref());
            last_heading = Some(name.clone()).filter(|n| !n.is_empty());
            (name, count_text.as_deref().and_then(parse_count))
        } else {
            let count = link
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|parent| first_text(parent, "span"))
                .as_deref()
                .and_then(parse_count);
            (text_of(link), count)
        };

        entries.push((
            ListEntry {
                url: Some(url),
                name: Some(name).filter(|n| !n.is_empty()),
                count: count.unwrap_or(0),
                region: None,
                country: None,
            },
            last_heading.clone(),
        ));
    }

    tracing::debug!("Found {} list entries on {}", entries.len(), page_url);
    entries
}

fn extract_partner(row: ElementRef<'_>, page_url: &Url, category: Option<String>) -> PartnerEntry {
    let info = select_first(row, "div:nth-child(2)");
    let link = info.and_then(|i| select_first(i, "a"));
    let name = link.map(text_of).filter(|t| !t.is_empty());
    let description = info
        .map(|i| text_without(i, name.as_deref()))
        .filter(|t| !t.is_empty());

    PartnerEntry {
        name,
        url: link.and_then(|a| href_of(a, page_url)),
        description,
        logo_url: first_attr_url(row, "img", "src", page_url),
        category,
    }
}

fn find_offer_id(url: &str) -> Option<String> {
    let re = regex::Regex::new(r"O\d{2,}").ok()?;
    re.find(url).map(|m| m.as_str().to_string())
}

fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(e) => {
            tracing::warn!("Invalid selector '{}': {:?}", css, e);
            Vec::new()
        }
    }
}

fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    select_all(scope, css).into_iter().next()
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Non-empty text of the first element matching `css`
fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
    select_first(scope, css)
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Element text with the first occurrence of `part` taken out
fn text_without(el: ElementRef<'_>, part: Option<&str>) -> String {
    let text = text_of(el);
    match part.filter(|p| !p.is_empty()) {
        Some(part) => collapse_whitespace(&text.replacen(part, "", 1)),
        None => text,
    }
}

fn href_of(el: ElementRef<'_>, base: &Url) -> Option<String> {
    el.value()
        .attr("href")
        .and_then(|href| resolve_link(href, base))
        .map(|u| u.to_string())
}

fn first_attr_url(scope: ElementRef<'_>, css: &str, attr: &str, base: &Url) -> Option<String> {
    select_first(scope, css)
        .and_then(|el| el.value().attr(attr))
        .and_then(|value| resolve_link(value, base))
        .map(|u| u.to_string())
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Digits of a count, ignoring (non-breaking) spaces: `"1 234"` -> 1234
fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
