//! Cached robots.txt policy for one authority
//!
//! Entries are written once per authority and never refreshed during a crawl.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// A robots policy as obtained for an authority
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// `scheme://host[:port]` the policy applies to
    pub authority: String,
    pub policy: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
    fallback: bool,
}

impl CachedRobots {
    /// Rules read from the authority's robots.txt
    pub fn fetched(authority: impl Into<String>, policy: ParsedRobots) -> Self {
        Self {
            authority: authority.into(),
            policy,
            fetched_at: Utc::now(),
            fallback: false,
        }
    }

    /// Allow-all stand-in for a robots.txt that could not be obtained
    pub fn fallback(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            policy: ParsedRobots::allow_all(),
            fetched_at: Utc::now(),
            fallback: true,
        }
    }

    /// True when the robots.txt could not be obtained
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.policy.is_allowed(url, user_agent)
    }
}
