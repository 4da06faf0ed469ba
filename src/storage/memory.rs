//! In-memory implementation of [`StateStore`]
//!
//! Keeps every snapshot it is given, which makes it useful for inspecting
//! how a crawl progressed and for replaying a resume from any save point.

use crate::state::CrawlState;
use crate::storage::{StateStore, StorageResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// State store that lives in memory and records its save history
///
/// Cloning yields a handle onto the same history, so a test can keep one
/// handle while the coordinator owns the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    current: Option<CrawlState>,
    history: Vec<CrawlState>,
    clears: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `state`, as if saved by an earlier run
    pub fn with_state(state: CrawlState) -> Self {
        let store = Self::new();
        store.lock().current = Some(state);
        store
    }

    /// Every snapshot saved so far, oldest first
    pub fn history(&self) -> Vec<CrawlState> {
        self.lock().history.clone()
    }

    /// The snapshot a `load` would return right now, if any
    pub fn current(&self) -> Option<CrawlState> {
        self.lock().current.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().history.len()
    }

    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a panicking test; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn load(&mut self) -> StorageResult<CrawlState> {
        Ok(self.lock().current.clone().unwrap_or_default())
    }

    async fn save(&mut self, state: &CrawlState) -> StorageResult<()> {
        let mut inner = self.lock();
        inner.current = Some(state.clone());
        inner.history.push(state.clone());
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        let mut inner = self.lock();
        inner.current = None;
        inner.clears += 1;
        Ok(())
    }
}
