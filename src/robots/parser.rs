//! Robots.txt rule matching
//!
//! The robotstxt crate matches against the raw body, so a [`ParsedRobots`]
//! keeps the body and runs the matcher on demand. A policy without a body
//! allows everything.

use robotstxt::DefaultMatcher;

/// Crawl-permission rules for one authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRobots {
    body: Option<String>,
}

impl ParsedRobots {
    /// Wraps a fetched robots.txt body
    ///
    /// A blank body has no rules and is treated as allow-all.
    pub fn from_content(content: &str) -> Self {
        let body = Some(content)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string);
        Self { body }
    }

    /// A policy with no rules
    pub fn allow_all() -> Self {
        Self { body: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.body.is_none()
    }

    /// Checks a URL (or a bare path such as `/page.html`) for `user_agent`
    ///
    /// Longest match wins; `Allow` beats `Disallow` on equal length.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.body {
            None => true,
            Some(body) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, user_agent, url)
            }
        }
    }
}
