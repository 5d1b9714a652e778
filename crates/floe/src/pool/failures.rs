//! Failure limits for a run.

use tracing::error;

use crate::record::WriteOutcome;

/// Counts failed outcomes and reports when a configured limit is reached.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    total: u64,
    consecutive: u64,
    max_total: u64,
    max_consecutive: u64,
    tripped: bool,
}

impl FailureTracker {
    /// Limits of 0 mean unlimited.
    pub fn new(max_total: u64, max_consecutive: u64) -> Self {
        Self {
            total: 0,
            consecutive: 0,
            max_total,
            max_consecutive,
            tripped: false,
        }
    }

    /// Observe one outcome. Returns true once a limit has been reached.
    pub fn observe(&mut self, outcome: &WriteOutcome) -> bool {
        if !outcome.is_failed() {
            self.consecutive = 0;
            return self.tripped;
        }

        self.total += 1;
        self.consecutive += 1;

        if self.tripped {
            return true;
        }

        if self.max_total > 0 && self.total >= self.max_total {
            error!("Max failures ({}) reached, stopping run", self.total);
            self.tripped = true;
            return true;
        }
        if self.max_consecutive > 0 && self.consecutive >= self.max_consecutive {
            error!(
                "{} consecutive failures reached, stopping run",
                self.consecutive
            );
            self.tripped = true;
            return true;
        }
        false
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
