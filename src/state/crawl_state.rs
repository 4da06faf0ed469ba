//! Frontier and visited-set bookkeeping
//!
//! `CrawlState` is the unit of persistence. It is owned by the coordinator's
//! control loop; units of work never see it.

use crate::url::{authority_of, NormalizedUrl};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A URL waiting in the frontier together with its distance from the seed
///
/// Serializes as the two-element array `[url, depth]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(NormalizedUrl, u32)", into = "(NormalizedUrl, u32)")]
pub struct FrontierEntry {
    pub url: NormalizedUrl,
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(url: NormalizedUrl, depth: u32) -> Self {
        Self { url, depth }
    }

    /// The seed entry; always depth 0
    pub fn seed(url: NormalizedUrl) -> Self {
        Self { url, depth: 0 }
    }

    /// An entry discovered on the page this entry points to
    pub fn child(&self, url: NormalizedUrl) -> Self {
        Self {
            url,
            depth: self.depth + 1,
        }
    }
}

impl From<(NormalizedUrl, u32)> for FrontierEntry {
    fn from((url, depth): (NormalizedUrl, u32)) -> Self {
        Self { url, depth }
    }
}

impl From<FrontierEntry> for (NormalizedUrl, u32) {
    fn from(entry: FrontierEntry) -> Self {
        (entry.url, entry.depth)
    }
}

/// Visited set plus FIFO frontier
///
/// A URL is committed to `visited` when it is popped for dispatch, so a URL
/// can never be handed out twice. The frontier may hold transient duplicates
/// of a URL; the smallest pending depth is tracked on the side and used when
/// the first copy is popped, and later copies are dropped as visited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlState {
    visited: BTreeSet<NormalizedUrl>,
    frontier: VecDeque<FrontierEntry>,
    // Not persisted; rebuilt from `frontier` on load.
    pending: HashMap<NormalizedUrl, u32>,
}

impl CrawlState {
    /// Creates an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state whose frontier holds only the seed at depth 0
    pub fn seeded(seed: NormalizedUrl) -> Self {
        let mut state = Self::new();
        state.enqueue(FrontierEntry::seed(seed));
        state
    }

    /// Rebuilds a state from persisted parts
    pub fn from_parts(
        visited: impl IntoIterator<Item = NormalizedUrl>,
        frontier: impl IntoIterator<Item = FrontierEntry>,
    ) -> Self {
        let visited: BTreeSet<NormalizedUrl> = visited.into_iter().collect();
        let frontier: VecDeque<FrontierEntry> = frontier.into_iter().collect();

        let mut pending: HashMap<NormalizedUrl, u32> = HashMap::new();
        for entry in frontier.iter().filter(|e| !visited.contains(&e.url)) {
            pending
                .entry(entry.url.clone())
                .and_modify(|d| *d = (*d).min(entry.depth))
                .or_insert(entry.depth);
        }

        Self {
            visited,
            frontier,
            pending,
        }
    }

    /// Appends an entry to the back of the frontier
    ///
    /// Returns `false` without queueing when the URL is already visited or
    /// already pending at the same or a smaller depth.
    pub fn enqueue(&mut self, entry: FrontierEntry) -> bool {
        if self.visited.contains(&entry.url) {
            return false;
        }

        match self.pending.get(&entry.url) {
            Some(&depth) if depth <= entry.depth => false,
            _ => {
                self.pending.insert(entry.url.clone(), entry.depth);
                self.frontier.push_back(entry);
                true
            }
        }
    }

    /// Pops the next dispatchable entry and marks its URL visited
    ///
    /// Entries whose URL is already visited, or whose depth exceeds
    /// `max_depth`, are discarded along the way. The returned entry carries
    /// the smallest depth at which its URL was pending.
    pub fn pop_next(&mut self, max_depth: u32) -> Option<FrontierEntry> {
        while let Some(entry) = self.frontier.pop_front() {
            if self.visited.contains(&entry.url) {
                tracing::trace!("Dropping already visited {}", entry.url);
                continue;
            }

            let depth = self
                .pending
                .remove(&entry.url)
                .map_or(entry.depth, |pending| pending.min(entry.depth));

            if depth > max_depth {
                tracing::debug!("Dropping {} at depth {} (max {})", entry.url, depth, max_depth);
                continue;
            }

            self.visited.insert(entry.url.clone());
            return Some(FrontierEntry::new(entry.url, depth));
        }

        None
    }

    /// Returns a popped entry to the front of the frontier, un-visiting it
    ///
    /// Used for work that was abandoned before it finished, so that a resumed
    /// crawl picks it up again.
    pub fn requeue_front(&mut self, entry: FrontierEntry) {
        self.visited.remove(&entry.url);
        self.pending
            .entry(entry.url.clone())
            .and_modify(|d| *d = (*d).min(entry.depth))
            .or_insert(entry.depth);
        self.frontier.push_front(entry);
    }

    /// Returns true if the URL has been committed to processing
    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.visited.contains(url)
    }

    /// Returns the number of visited URLs
    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    /// Returns the number of frontier entries, duplicates included
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_frontier_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Returns true if there is nothing to resume
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty() && self.frontier.is_empty()
    }

    /// Returns true if this state comes from a crawl of `seed`'s site
    ///
    /// The seed is always visited or still queued, so a state for the same
    /// site holds at least one URL on the seed's authority.
    pub fn belongs_to(&self, seed: &NormalizedUrl) -> bool {
        let Some(root) = authority_of(seed.as_url()) else {
            return false;
        };
        self.visited
            .iter()
            .chain(self.frontier.iter().map(|e| &e.url))
            .any(|url| authority_of(url.as_url()).as_deref() == Some(root.as_str()))
    }

    /// Commits a URL as visited without dispatching it
    ///
    /// Used for the page a redirect landed on. Returns `false` if it was
    /// already visited.
    pub fn mark_visited(&mut self, url: NormalizedUrl) -> bool {
        self.pending.remove(&url);
        self.visited.insert(url)
    }

    pub fn visited(&self) -> impl Iterator<Item = &NormalizedUrl> {
        self.visited.iter()
    }

    pub fn frontier(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.frontier.iter()
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    visited: &'a BTreeSet<NormalizedUrl>,
    frontier: &'a VecDeque<FrontierEntry>,
}

#[derive(Deserialize)]
struct Snapshot {
    visited: Vec<NormalizedUrl>,
    frontier: Vec<FrontierEntry>,
}

impl Serialize for CrawlState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SnapshotRef {
            visited: &self.visited,
            frontier: &self.frontier,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CrawlState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = Snapshot::deserialize(deserializer)?;
        Ok(Self::from_parts(snapshot.visited, snapshot.frontier))
    }
}
