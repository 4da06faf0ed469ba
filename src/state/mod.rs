//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the visited set and FIFO frontier, the unit of persistence
//! - `FrontierEntry`: a pending URL and its depth from the seed
//! - `CrawlPhase`: the lifecycle of a crawl run

mod crawl_state;
mod phase;

// Re-export main types
pub use crawl_state::{CrawlState, FrontierEntry};
pub use phase::CrawlPhase;
