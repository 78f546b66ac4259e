use crate::router::{RouteAction, RouteLabel, RoutePredicate, RouteRule};
use crate::url::SiteProfile;
use crate::UrlResult;
use regex::Regex;

/// Builds the catalog's rule list, in priority order
///
/// 1. Home page, redirected to the job offers listing
/// 2. Related-list directory pages (`/praca/zoznam-...`)
/// 3. Company profiles with a custom layout, which are not supported
/// 4. Company profiles with the standard layout, handled as listings
/// 5. Offer detail pages
/// 6. Any other `/praca/` page, handled as a listing
/// 7. The partners page
///
/// # Arguments
///
/// * `site` - Catalog origin the patterns are anchored to
///
/// # Returns
///
/// * `Ok(Vec<RouteRule>)` - Rules ready for [`crate::Router::new`]
/// * `Err(UrlError)` - A pattern failed to compile
pub fn site_rules(site: &SiteProfile) -> UrlResult<Vec<RouteRule>> {
    let home = site.pattern(r"/?(?:[?#~]|$)")?;
    let related_list = site.pattern(r"/praca/zoznam-[a-z0-9-]+/?(?:[?#~]|$)")?;
    let praca = site.pattern(r"/praca/")?;
    let partners = site.pattern(r"/partneri/?(?:[?#~]|$)")?;
    let company = CompanyMatcher::new(praca.clone())?;
    let offer = Regex::new(r"/praca/.*?/O[0-9]{2,}")?;

    let standard_company = company.clone();
    let offer_praca = praca.clone();

    Ok(vec![
        RouteRule::overriding(
            "main-page",
            RoutePredicate::url(move |url| home.is_match(url.as_str())),
            RouteAction::Redirect(site.job_offers_url()?),
        ),
        RouteRule::handle(
            "job-related-list",
            RoutePredicate::url(move |url| related_list.is_match(url.as_str())),
            RouteLabel::JobRelatedList,
        ),
        RouteRule::overriding(
            "company-detail-custom",
            RoutePredicate::document(move |url, page| {
                company.is_match(url.as_str()) && page.has_match("body.listing.custom-design")
            }),
            RouteAction::Unsupported(
                "company page with custom design, these are not supported".to_string(),
            ),
        ),
        RouteRule::handle(
            "company-detail-standard",
            RoutePredicate::document(move |url, page| {
                standard_company.is_match(url.as_str())
                    && page.has_match("body.listing:not(.custom-design)")
            }),
            RouteLabel::JobListing,
        ),
        RouteRule::handle(
            "job-detail",
            RoutePredicate::url(move |url| {
                offer_praca.is_match(url.as_str()) && offer.is_match(url.as_str())
            }),
            RouteLabel::JobDetail,
        ),
        RouteRule::handle(
            "job-listing",
            RoutePredicate::url(move |url| praca.is_match(url.as_str())),
            RouteLabel::JobListing,
        ),
        RouteRule::handle(
            "partners",
            RoutePredicate::url(move |url| partners.is_match(url.as_str())),
            RouteLabel::Partners,
        ),
    ])
}

/// Company profile URLs: `/praca/<slug>/C<id>` or `?company_id=<id>`
#[derive(Debug, Clone)]
struct CompanyMatcher {
    praca: Regex,
    path_id: Regex,
    query_id: Regex,
}

impl CompanyMatcher {
    fn new(praca: Regex) -> UrlResult<Self> {
        Ok(Self {
            praca,
            path_id: Regex::new(r"/praca/.*?/C[0-9]{2,}")?,
            query_id: Regex::new(r"company_id=[0-9]{2,}")?,
        })
    }

    fn is_match(&self, url: &str) -> bool {
        self.praca.is_match(url) && (self.path_id.is_match(url) || self.query_id.is_match(url))
    }
}
