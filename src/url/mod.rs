//! URL handling
//!
//! This module provides the catalog origin ([`SiteProfile`]), canonical
//! filtered listing URLs and pagination ([`ListingFilters`], [`next_page_url`]),
//! and normalization used to decide whether two URLs point at the same page.

mod filters;
mod normalize;
mod site;

pub use filters::{next_page_url, page_number, with_query_param, ListingFilters};
pub use normalize::{normalize_url, urls_equal};
pub use site::SiteProfile;

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a URL and checks it is HTTP(S) with a host
///
/// # Arguments
///
/// * `raw` - The URL string to parse
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - Malformed URL, unsupported scheme, or missing host
pub fn parse_http_url(raw: &str) -> UrlResult<Url> {
    let url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Resolves a possibly relative link against the page it was found on
///
/// Fragment-only links and non-HTTP schemes (`mailto:`, `tel:`, `javascript:`)
/// resolve to `None`.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://www.profesia.sk/praca/").is_ok());
        assert!(matches!(
            parse_http_url("mailto:someone@profesia.sk"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(parse_http_url("not a url").is_err());
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("https://www.profesia.sk/praca/zoznam-lokalit/").unwrap();

        assert_eq!(
            resolve_link("/praca/bratislava/", &base).unwrap().as_str(),
            "https://www.profesia.sk/praca/bratislava/"
        );
        assert_eq!(
            resolve_link("okres-pezinok/", &base).unwrap().as_str(),
            "https://www.profesia.sk/praca/zoznam-lokalit/okres-pezinok/"
        );
        assert!(resolve_link("#A", &base).is_none());
        assert!(resolve_link("tel:+421900000000", &base).is_none());
        assert!(resolve_link("  ", &base).is_none());
    }
}
