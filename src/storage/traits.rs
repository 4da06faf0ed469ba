//! Storage traits and error types
//!
//! This module defines the trait interface for crawl state backends and
//! associated error types.

use crate::state::CrawlState;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background save did not finish: {0}")]
    Background(#[from] tokio::task::JoinError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl state backends
///
/// Implementations are not required to serialize concurrent callers: the
/// coordinator is the only caller and never overlaps two operations.
#[async_trait]
pub trait StateStore: Send {
    /// Reads the last saved state
    ///
    /// A backend with nothing saved returns an empty state. So does one whose
    /// saved data is truncated or corrupt; that case is logged, not raised.
    fn load(&mut self) -> StorageResult<CrawlState>;

    /// Durably replaces the saved state with `state`
    async fn save(&mut self, state: &CrawlState) -> StorageResult<()>;

    /// Removes any saved state
    fn clear(&mut self) -> StorageResult<()>;
}
