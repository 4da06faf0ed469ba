//! Crawl statistics
//!
//! Counters kept by the coordinator while the crawl runs and reported at the
//! end of it.

use std::time::Duration;

/// Counters for one run of the coordinator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// Units of work started
    pub pages_dispatched: u64,

    /// Pages whose section was appended to the document
    pub pages_appended: u64,

    /// Pages skipped because robots.txt disallows them
    pub robots_denied: u64,

    /// Pages whose fetch failed (including panicked units of work)
    pub fetch_failures: u64,

    /// Pages fetched but not written because the document append failed
    pub document_failures: u64,

    /// Images written next to the document
    pub images_stored: u64,

    /// Images that could not be downloaded, were filtered out, or failed to write
    pub image_failures: u64,

    /// Raw hrefs returned by link discovery
    pub links_discovered: u64,

    /// New frontier entries created from discovered links
    pub links_enqueued: u64,

    /// Hrefs that did not normalize to a crawlable URL
    pub invalid_links: u64,

    /// Hrefs pointing outside the crawl scope
    pub out_of_scope_links: u64,

    /// In-flight pages returned to the frontier after an interrupt
    pub requeued: u64,

    /// State snapshots that failed to save
    pub save_failures: u64,

    /// Highest number of units of work running at once
    pub peak_in_flight: usize,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl CrawlStats {
    /// Pages that finished one way or another
    pub fn pages_finished(&self) -> u64 {
        self.pages_appended + self.robots_denied + self.fetch_failures + self.document_failures
    }

    /// Percentage of finished pages that made it into the document
    pub fn success_rate(&self) -> f64 {
        let finished = self.pages_finished();
        if finished == 0 {
            0.0
        } else {
            (self.pages_appended as f64 / finished as f64) * 100.0
        }
    }

    /// Pages per second over the run so far
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_finished() as f64 / secs
        } else {
            0.0
        }
    }
}
