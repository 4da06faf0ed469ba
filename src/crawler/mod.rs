//! Crawler module for the crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The concurrency limiter bounding units of work
//! - The unit of work run for each dispatched URL
//! - Overall crawl coordination and resumable state handling

mod coordinator;
mod limiter;
mod stats;
mod worker;

pub use coordinator::{Coordinator, CrawlReport};
pub use limiter::{ConcurrencyLimiter, Permit};
pub use stats::CrawlStats;
pub use worker::{CrawlContext, ImageOutcome, OutcomeKind, ProcessedPage, WorkOutcome};

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::storage::StateStore;
use crate::BinderError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the saved state from `store`, or seed a new one
/// 2. Dispatch pages through `pipeline` until the frontier is exhausted
/// 3. Save the state and stop early when `cancel` fires
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The crawl completed or was interrupted
/// * `Err(BinderError)` - The crawl could not start
pub async fn crawl(
    config: Config,
    pipeline: Arc<dyn Pipeline>,
    store: Box<dyn StateStore>,
    cancel: CancellationToken,
) -> Result<CrawlReport, BinderError> {
    let ctx = CrawlContext::new(config, pipeline);
    let coordinator = Coordinator::new(ctx, store)?;
    Ok(coordinator.run(cancel).await)
}
