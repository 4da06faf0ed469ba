//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns the [`CrawlState`] and is the only code that mutates
//! it. Units of work run as tasks in a `JoinSet`, bounded by the
//! [`ConcurrencyLimiter`], and report back through their [`WorkOutcome`]s.
//! The state is saved after every finished unit of work.

use crate::crawler::limiter::ConcurrencyLimiter;
use crate::crawler::stats::CrawlStats;
use crate::crawler::worker::{run_unit, CrawlContext, ImageOutcome, OutcomeKind, WorkOutcome};
use crate::state::{CrawlPhase, CrawlState, FrontierEntry};
use crate::storage::StateStore;
use crate::url::{is_in_scope, normalize, normalize_absolute, NormalizedUrl};
use crate::BinderError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often (in finished pages) progress is logged
const PROGRESS_INTERVAL: u64 = 10;

/// Result of a coordinator run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// `Completed` or `Interrupted`
    pub phase: CrawlPhase,
    pub stats: CrawlStats,
    /// State at the end of the run (what was saved, for an interrupted run)
    pub state: CrawlState,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    store: Box<dyn StateStore>,
    state: CrawlState,
    seed: NormalizedUrl,
    limiter: ConcurrencyLimiter,
    phase: CrawlPhase,
    stats: CrawlStats,
    /// Entries currently being worked on, by task
    in_flight: HashMap<Id, FrontierEntry>,
}

impl Coordinator {
    /// Creates a coordinator, resuming from the store when it holds a state
    ///
    /// # Arguments
    ///
    /// * `ctx` - Configuration, robots gate and pipeline shared with units of work
    /// * `store` - Where the crawl state is loaded from and saved to
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(BinderError)` - The configured seed URL is not crawlable
    pub fn new(ctx: CrawlContext, mut store: Box<dyn StateStore>) -> Result<Self, BinderError> {
        let crawler = &ctx.config.crawler;
        let seed = normalize_absolute(&crawler.seed_url, crawler.query_policy)?;

        let state = match store.load() {
            Ok(state) if state.belongs_to(&seed) => {
                tracing::info!(
                    "Resuming crawl: {} visited, {} in frontier",
                    state.visited_len(),
                    state.frontier_len()
                );
                state
            }
            Ok(state) if !state.is_empty() => {
                tracing::warn!(
                    "Saved crawl state is for a different site, starting new crawl from {}",
                    seed
                );
                CrawlState::seeded(seed.clone())
            }
            Ok(_) => {
                tracing::info!("Starting new crawl from {}", seed);
                CrawlState::seeded(seed.clone())
            }
            Err(e) => {
                tracing::warn!("Failed to load crawl state ({}), starting new crawl", e);
                CrawlState::seeded(seed.clone())
            }
        };

        let limiter = ConcurrencyLimiter::new(crawler.max_concurrent as usize);

        Ok(Self {
            ctx: Arc::new(ctx),
            store,
            state,
            seed,
            limiter,
            phase: CrawlPhase::Idle,
            stats: CrawlStats::default(),
            in_flight: HashMap::new(),
        })
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn seed(&self) -> &NormalizedUrl {
        &self.seed
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Runs the crawl until the frontier is exhausted or `cancel` fires
    ///
    /// The loop:
    /// 1. Finishes when the frontier is empty and nothing is in flight
    /// 2. Reaps finished units of work, feeds their links into the frontier
    ///    and saves the state
    /// 3. Otherwise pops the next entry, waits for a permit and dispatches it
    ///
    /// On cancellation no further permits are handed out, in-flight units
    /// get the configured grace period, the rest are aborted and put back at
    /// the front of the frontier, and the state is saved.
    pub async fn run(mut self, cancel: CancellationToken) -> CrawlReport {
        let started = Instant::now();
        let max_depth = self.ctx.config.crawler.max_depth;
        self.transition(CrawlPhase::Running);

        tracing::info!(
            "Crawling {} (max depth {}, {} concurrent, user agent \"{}\")",
            self.seed,
            max_depth,
            self.limiter.capacity(),
            self.ctx.user_agent()
        );

        let mut tasks: JoinSet<WorkOutcome> = JoinSet::new();

        let outcome = loop {
            if self.state.is_frontier_empty() && tasks.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break CrawlPhase::Completed;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Interrupt received, stopping dispatch");
                    break CrawlPhase::Interrupted;
                }

                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    self.handle_joined(joined);
                    self.persist().await;
                    self.report_progress(started);
                }

                Some(permit) = self.limiter.acquire(), if !self.state.is_frontier_empty() => {
                    match self.state.pop_next(max_depth) {
                        Some(entry) => {
                            tracing::debug!("Dispatching {} at depth {}", entry.url, entry.depth);
                            let handle = tasks.spawn(run_unit(
                                Arc::clone(&self.ctx),
                                entry.clone(),
                                permit,
                            ));
                            self.in_flight.insert(handle.id(), entry);
                            self.stats.pages_dispatched += 1;
                        }
                        None => drop(permit),
                    }
                }

                else => break CrawlPhase::Interrupted,
            }
        };

        if outcome == CrawlPhase::Interrupted {
            self.limiter.close();
            self.drain(&mut tasks).await;
            self.persist().await;
        } else if let Err(e) = self.store.clear() {
            tracing::warn!("Crawl complete but saved state could not be removed: {}", e);
        }

        self.transition(outcome);
        self.stats.peak_in_flight = self.limiter.peak_in_flight();
        self.stats.elapsed = started.elapsed();

        tracing::info!(
            "Crawl {}: {} pages in {:?}, {} left in frontier",
            self.phase,
            self.stats.pages_finished(),
            self.stats.elapsed,
            self.state.frontier_len()
        );

        CrawlReport {
            phase: self.phase,
            stats: self.stats,
            state: self.state,
        }
    }

    /// Gives in-flight work the grace period, then aborts and requeues the rest
    async fn drain(&mut self, tasks: &mut JoinSet<WorkOutcome>) {
        let grace = Duration::from_secs(self.ctx.config.crawler.grace_period_secs);
        if !tasks.is_empty() {
            tracing::info!(
                "Waiting up to {:?} for {} in-flight pages",
                grace,
                tasks.len()
            );
        }

        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);

        while !tasks.is_empty() {
            tokio::select! {
                Some(joined) = tasks.join_next_with_id() => {
                    self.handle_joined(joined);
                    self.persist().await;
                }
                _ = &mut deadline => break,
            }
        }

        if !tasks.is_empty() {
            tracing::warn!("Abandoning {} in-flight pages", tasks.len());
            tasks.abort_all();
            while let Some(joined) = tasks.join_next_with_id().await {
                self.handle_joined(joined);
            }
        }
    }

    fn handle_joined(&mut self, joined: Result<(Id, WorkOutcome), JoinError>) {
        match joined {
            Ok((id, outcome)) => {
                self.in_flight.remove(&id);
                self.handle_outcome(outcome);
            }
            Err(e) => {
                let entry = self.in_flight.remove(&e.id());
                match entry {
                    Some(entry) if e.is_cancelled() => {
                        tracing::debug!("Requeueing abandoned {}", entry.url);
                        self.state.requeue_front(entry);
                        self.stats.requeued += 1;
                    }
                    Some(entry) => {
                        tracing::error!("Unit of work for {} panicked: {}", entry.url, e);
                        self.stats.fetch_failures += 1;
                    }
                    None => tracing::error!("Unknown unit of work failed: {}", e),
                }
            }
        }
    }

    fn handle_outcome(&mut self, outcome: WorkOutcome) {
        let WorkOutcome { entry, kind } = outcome;

        match kind {
            OutcomeKind::Denied => self.stats.robots_denied += 1,
            OutcomeKind::FetchFailed(_) => self.stats.fetch_failures += 1,
            OutcomeKind::Processed(page) => {
                if page.appended {
                    self.stats.pages_appended += 1;
                } else {
                    self.stats.document_failures += 1;
                }
                match page.image {
                    ImageOutcome::Stored => self.stats.images_stored += 1,
                    ImageOutcome::Failed => self.stats.image_failures += 1,
                    ImageOutcome::NotRequested => {}
                }
                self.mark_landing_page(&entry, &page.base);
                self.enqueue_links(&entry, &page.base, page.hrefs);
            }
        }
    }

    /// Normalizes, scope-filters and enqueues the links found on `parent`
    fn enqueue_links(&mut self, parent: &FrontierEntry, base: &Url, hrefs: Vec<String>) {
        let crawler = &self.ctx.config.crawler;
        self.stats.links_discovered += hrefs.len() as u64;

        if parent.depth >= crawler.max_depth {
            tracing::trace!("Not following links from {} at max depth", parent.url);
            return;
        }

        for href in hrefs {
            let url = match normalize(&href, base, crawler.query_policy) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping link {:?} on {}: {}", href, parent.url, e);
                    self.stats.invalid_links += 1;
                    continue;
                }
            };

            if !is_in_scope(&url, &self.seed, crawler.include_external) {
                tracing::trace!("Out of scope: {}", url);
                self.stats.out_of_scope_links += 1;
                continue;
            }

            if self.state.enqueue(parent.child(url)) {
                self.stats.links_enqueued += 1;
            }
        }
    }

    /// Marks the page a redirect landed on as visited, so it is not appended twice
    fn mark_landing_page(&mut self, entry: &FrontierEntry, landed: &Url) {
        let query_policy = self.ctx.config.crawler.query_policy;
        match normalize_absolute(landed.as_str(), query_policy) {
            Ok(url) if url != entry.url => {
                if self.state.mark_visited(url.clone()) {
                    tracing::debug!("{} redirected to {}", entry.url, url);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Ignoring landing URL {}: {}", landed, e),
        }
    }

    /// Saves the state; failures are logged and the crawl goes on
    async fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.state).await {
            self.stats.save_failures += 1;
            tracing::error!("Failed to save crawl state: {}", e);
        }
    }

    fn report_progress(&mut self, started: Instant) {
        let finished = self.stats.pages_finished();
        if finished == 0 || finished % PROGRESS_INTERVAL != 0 {
            return;
        }

        self.stats.elapsed = started.elapsed();
        tracing::info!(
            "Progress: {} pages crawled, {} in frontier, {} in flight, {:.2} pages/sec",
            finished,
            self.state.frontier_len(),
            self.in_flight.len(),
            self.stats.rate()
        );
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Unexpected phase change {} -> {}", self.phase, next);
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("seed", &self.seed)
            .field("phase", &self.phase)
            .field("visited", &self.state.visited_len())
            .field("frontier", &self.state.frontier_len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
