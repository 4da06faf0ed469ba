use crate::url::NormalizedUrl;
use crate::UrlError;
use serde::Deserialize;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// References that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// How the query string takes part in a URL's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryPolicy {
    /// Drop the query entirely; `/a?x=1` and `/a` are the same page
    #[default]
    Strip,
    /// Keep the query minus tracking parameters, sorted by key
    Preserve,
}

/// Normalizes a raw href found on `context` into its canonical form
///
/// # Normalization Steps
///
/// 1. Trim; reject empty, fragment-only and non-navigable references
/// 2. Resolve against the context URL
/// 3. Accept only http and https
/// 4. Lowercase the host (the `url` crate also drops default ports)
/// 5. Normalize path:
///    - Remove dot segments (. and ..) and duplicate slashes
///    - Remove trailing slash (except for root /)
/// 6. Remove fragment
/// 7. Apply the query policy
///
/// # Examples
///
/// ```
/// use pagebinder::url::{normalize, QueryPolicy};
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let url = normalize("/a?x=1#frag", &base, QueryPolicy::Strip).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/a");
/// ```
pub fn normalize(raw: &str, context: &Url, policy: QueryPolicy) -> Result<NormalizedUrl, UrlError> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with('#') {
        return Err(UrlError::NotNavigable(raw.to_string()));
    }

    let lowered = raw.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
        return Err(UrlError::NotNavigable(raw.to_string()));
    }

    let mut url = context
        .join(raw)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
        .ok_or_else(|| UrlError::MissingHost(raw.to_string()))?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    match policy {
        QueryPolicy::Strip => url.set_query(None),
        QueryPolicy::Preserve => {
            if url.query().is_some() {
                let params = filter_and_sort_query_params(&url);
                if params.is_empty() {
                    url.set_query(None);
                } else {
                    url.query_pairs_mut().clear().extend_pairs(params);
                }
            }
        }
    }

    Ok(NormalizedUrl::from_url(url))
}

/// Parses an absolute URL (a seed, or a persisted entry) into canonical form
pub fn normalize_absolute(raw: &str, policy: QueryPolicy) -> Result<NormalizedUrl, UrlError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;
    normalize(parsed.as_str(), &parsed, policy)
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

    if segments.is_empty() {
        return "/".to_string();
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
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
