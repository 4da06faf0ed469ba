//! Storage module for resumable crawl state
//!
//! A [`StateStore`] persists the coordinator's [`CrawlState`](crate::state::CrawlState)
//! after every finished page, so an interrupted crawl can pick up where it
//! stopped.
//!
//! # Example
//!
//! ```no_run
//! use pagebinder::storage::{JsonStateStore, StateStore};
//!
//! let mut store = JsonStateStore::new(".pagebinder-state.json");
//! let state = store.load().unwrap();
//! println!("{} URLs still queued", state.frontier_len());
//! ```

mod json_store;
mod memory;
mod traits;

pub use json_store::JsonStateStore;
pub use memory::MemoryStateStore;
pub use traits::{StateStore, StorageError, StorageResult};
