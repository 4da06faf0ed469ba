//! Robots.txt handling module
//!
//! The [`RobotsGate`] fetches `/robots.txt` once per authority on first use
//! and answers allow/deny questions from the cached policy afterwards.
//! Anything that goes wrong while obtaining a policy degrades to allow-all.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use crate::pipeline::Pipeline;
use crate::url::{authority_of, NormalizedUrl};
use crate::RobotsError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use url::Url;

type PolicySlot = Arc<OnceCell<CachedRobots>>;

/// Per-authority robots.txt cache shared by all units of work
#[derive(Debug)]
pub struct RobotsGate {
    /// Agent token matched against `User-agent` lines
    agent: String,
    policies: Mutex<HashMap<String, PolicySlot>>,
}

impl RobotsGate {
    /// Creates an empty gate for the given agent token
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Makes sure a policy for the URL's authority is cached
    ///
    /// The first caller for an authority performs the fetch; concurrent
    /// callers for the same authority wait for that fetch instead of
    /// issuing their own.
    pub async fn load(&self, url: &Url, pipeline: &dyn Pipeline) {
        let Some(authority) = authority_of(url) else {
            return;
        };

        let slot = self.slot(&authority);
        let cached = slot.get_or_init(|| fetch_policy(&authority, pipeline)).await;
        tracing::trace!(
            "Using robots.txt for {} fetched {}s ago",
            cached.authority,
            cached.age().num_seconds()
        );
    }

    /// Checks a URL against the cached policy for its authority
    ///
    /// An authority whose policy was never loaded is allowed.
    pub fn can_fetch(&self, url: &NormalizedUrl) -> bool {
        let Some(authority) = authority_of(url.as_url()) else {
            return true;
        };

        let slot = self.lock().get(&authority).cloned();
        match slot.as_ref().and_then(|slot| slot.get()) {
            Some(cached) => cached.is_allowed(url.as_str(), &self.agent),
            None => true,
        }
    }

    /// Returns the cached policy for an authority, if it has been loaded
    pub fn cached(&self, authority: &str) -> Option<CachedRobots> {
        self.lock()
            .get(authority)
            .and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, authority: &str) -> PolicySlot {
        self.lock()
            .entry(authority.to_string())
            .or_default()
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PolicySlot>> {
        self.policies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn fetch_policy(authority: &str, pipeline: &dyn Pipeline) -> CachedRobots {
    match fetch_content(authority, pipeline).await {
        Ok(content) => {
            tracing::debug!("Loaded robots.txt for {}", authority);
            CachedRobots::fetched(authority, ParsedRobots::from_content(&content))
        }
        Err(e) => {
            tracing::warn!("{}; allowing all URLs on {}", e, authority);
            CachedRobots::fallback(authority)
        }
    }
}

async fn fetch_content(authority: &str, pipeline: &dyn Pipeline) -> Result<String, RobotsError> {
    let robots_url = Url::parse(authority)
        .and_then(|base| base.join("/robots.txt"))
        .map_err(|_| RobotsError::Location(authority.to_string()))?;

    pipeline
        .fetch_robots(&robots_url)
        .await
        .map_err(|source| RobotsError::Fetch {
            url: robots_url.to_string(),
            source,
        })
}
