use crate::UrlError;
use url::Url;

/// Query parameters that never change which listing the catalog serves
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Normalizes a URL for comparison purposes
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host and drop a `www.` prefix
/// 3. Remove dot segments, duplicate slashes and the trailing slash
/// 4. Remove the fragment
/// 5. Remove tracking query parameters and sort the rest by key
///
/// The scheme and port are kept, so `http://127.0.0.1:8080/` stays distinct
/// from `https://127.0.0.1/`.
///
/// # Examples
///
/// ```
/// use profesia_harvest::url::normalize_url;
///
/// let url = normalize_url("https://WWW.PROFESIA.SK/praca/?b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://profesia.sk/praca?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Compares two URLs after normalization
///
/// URLs that fail to normalize fall back to exact string comparison.
pub fn urls_equal(a: &Url, b: &Url) -> bool {
    match (normalize_url(a.as_str()), normalize_url(b.as_str())) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
