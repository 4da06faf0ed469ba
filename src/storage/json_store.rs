//! JSON file implementation of [`StateStore`]
//!
//! The whole state lives in one file:
//!
//! ```json
//! {"visited": ["https://example.com/"], "frontier": [["https://example.com/a", 1]]}
//! ```
//!
//! Saves go to a sibling temporary file which is then renamed over the real
//! one, so a crash mid-save leaves the previous snapshot intact.

use crate::state::CrawlState;
use crate::storage::{StateStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// State store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Creates a store for the given file path; nothing is touched on disk yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Writes `bytes` to `tmp_path`, syncs it and renames it over `path`
fn write_atomically(path: &Path, tmp_path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| JsonStateStore::io_error(parent, e))?;
    }

    let mut file = File::create(tmp_path).map_err(|e| JsonStateStore::io_error(tmp_path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| JsonStateStore::io_error(tmp_path, e))?;
    drop(file);

    fs::rename(tmp_path, path).map_err(|e| JsonStateStore::io_error(path, e))
}

#[async_trait]
impl StateStore for JsonStateStore {
    fn load(&mut self) -> StorageResult<CrawlState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No saved state at {}", self.path.display());
                return Ok(CrawlState::new());
            }
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            tracing::warn!("State file {} is empty, starting fresh", self.path.display());
            return Ok(CrawlState::new());
        }

        match serde_json::from_slice::<CrawlState>(&bytes) {
            Ok(state) => {
                tracing::info!(
                    "Loaded state from {}: {} visited, {} in frontier",
                    self.path.display(),
                    state.visited_len(),
                    state.frontier_len()
                );
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    "State file {} is unreadable ({}), starting fresh",
                    self.path.display(),
                    e
                );
                Ok(CrawlState::new())
            }
        }
    }

    async fn save(&mut self, state: &CrawlState) -> StorageResult<()> {
        let encoded = serde_json::to_vec(state)?;
        let path = self.path.clone();
        let tmp_path = self.temp_path();

        tokio::task::spawn_blocking(move || write_atomically(&path, &tmp_path, &encoded))
            .await??;

        tracing::trace!(
            "Saved state to {}: {} visited, {} in frontier",
            self.path.display(),
            state.visited_len(),
            state.frontier_len()
        );
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&self.path, e)),
        }
    }
}
