//! URL handling module for pagebinder
//!
//! This module provides URL normalization, authority extraction and the
//! internal/external scope filter.

mod authority;
mod normalize;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;

// Re-export main functions
pub use authority::authority_of;
pub use normalize::{normalize, normalize_absolute, QueryPolicy};

/// A URL in canonical form; equality is the crawl's dedup key
///
/// Values are only produced by [`normalize`] and [`normalize_absolute`], so
/// two `NormalizedUrl`s are equal exactly when they name the same page.
/// Serializes as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    pub(crate) fn from_url(url: Url) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for NormalizedUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let url = Url::parse(&raw).map_err(serde::de::Error::custom)?;
        Ok(Self(url))
    }
}

/// Decides whether `url` belongs to the crawl rooted at `base`
///
/// With `include_external` set every URL is in scope. Otherwise the URL's
/// authority (scheme, host and port) must equal the base's authority.
///
/// # Examples
///
/// ```
/// use pagebinder::url::{is_in_scope, normalize_absolute, QueryPolicy};
///
/// let base = normalize_absolute("https://example.com/", QueryPolicy::Strip).unwrap();
/// let other = normalize_absolute("https://other.com/x", QueryPolicy::Strip).unwrap();
/// assert!(!is_in_scope(&other, &base, false));
/// assert!(is_in_scope(&other, &base, true));
/// ```
pub fn is_in_scope(url: &NormalizedUrl, base: &NormalizedUrl, include_external: bool) -> bool {
    if include_external {
        return true;
    }

    match (authority_of(url.as_url()), authority_of(base.as_url())) {
        (Some(candidate), Some(root)) => candidate == root,
        _ => false,
    }
}
