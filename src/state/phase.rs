/// Crawl lifecycle definitions
///
/// This module defines the states a crawl moves through, from start-up to
/// completion or interruption.
use std::fmt;

/// Represents the current phase of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlPhase {
    /// Constructed, nothing dispatched yet
    #[default]
    Idle,

    /// The dispatch loop is running
    Running,

    // ===== Terminal States =====
    /// The frontier was exhausted; saved state has been cleared
    Completed,

    /// Stopped by an interrupt; state has been saved for resume
    Interrupted,
}

impl CrawlPhase {
    /// Returns true if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Interrupted)
    }

    /// Returns true if the crawl can move from this phase to `next`
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Interrupted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
