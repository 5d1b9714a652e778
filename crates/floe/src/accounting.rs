//! Concurrency-safe run counters.
//!
//! Each outcome lands in exactly one of three buckets with a single
//! `fetch_add`. `processed` is the sum of the buckets, so a reader can never
//! see a processed record without its outcome.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::record::WriteOutcome;

/// Attempts before `snapshot` settles for the last read.
const SNAPSHOT_ATTEMPTS: usize = 8;

/// Point-in-time view of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub created: u64,
    pub duplicate: u64,
    pub failed: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} created={} duplicate={} failed={}",
            self.processed, self.created, self.duplicate, self.failed
        )
    }
}

#[derive(Debug, Default)]
pub struct RunAccounting {
    created: AtomicU64,
    duplicate: AtomicU64,
    failed: AtomicU64,
    decoded: AtomicU64,
}

impl RunAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome and return the counters as seen right after.
    pub fn record(&self, outcome: &WriteOutcome) -> RunSummary {
        let bucket = match outcome {
            WriteOutcome::Created => &self.created,
            WriteOutcome::Duplicate => &self.duplicate,
            WriteOutcome::Failed(_) => &self.failed,
        };
        bucket.fetch_add(1, Ordering::AcqRel);
        self.snapshot()
    }

    /// Read all counters without blocking writers.
    pub fn snapshot(&self) -> RunSummary {
        let mut current = self.read();
        for _ in 0..SNAPSHOT_ATTEMPTS {
            let again = self.read();
            if again == current {
                return current;
            }
            current = again;
        }
        current
    }

    /// Note that the decoder handed out `count` more elements.
    pub fn note_decoded(&self, count: u64) {
        self.decoded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    fn read(&self) -> RunSummary {
        let created = self.created.load(Ordering::Acquire);
        let duplicate = self.duplicate.load(Ordering::Acquire);
        let failed = self.failed.load(Ordering::Acquire);
        RunSummary {
            processed: created + duplicate + failed,
            created,
            duplicate,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FailureKind;
    use std::sync::Arc;

    #[test]
    fn test_record_updates_one_bucket() {
        let accounting = RunAccounting::new();
        accounting.record(&WriteOutcome::Created);
        accounting.record(&WriteOutcome::Created);
        accounting.record(&WriteOutcome::Duplicate);
        let after = accounting.record(&WriteOutcome::failed(FailureKind::Rejected, "no"));

        assert_eq!(
            after,
            RunSummary {
                processed: 4,
                created: 2,
                duplicate: 1,
                failed: 1,
            }
        );
        assert_eq!(accounting.snapshot(), after);
    }

    #[test]
    fn test_empty_snapshot() {
        let accounting = RunAccounting::new();
        assert_eq!(accounting.snapshot(), RunSummary::default());
        assert_eq!(accounting.decoded(), 0);
    }

    #[test]
    fn test_concurrent_updates_keep_sum() {
        let accounting = Arc::new(RunAccounting::new());
        let mut handles = Vec::new();

        for t in 0..8 {
            let accounting = accounting.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..1000 {
                    let outcome = match (t + i) % 3 {
                        0 => WriteOutcome::Created,
                        1 => WriteOutcome::Duplicate,
                        _ => WriteOutcome::failed(FailureKind::Transport, "down"),
                    };
                    let seen = accounting.record(&outcome);
                    assert_eq!(seen.processed, seen.created + seen.duplicate + seen.failed);
                }
            }));
        }

        // Sample while writers are busy
        for _ in 0..100 {
            let s = accounting.snapshot();
            assert_eq!(s.processed, s.created + s.duplicate + s.failed);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let total = accounting.snapshot();
        assert_eq!(total.processed, 8000);
        assert_eq!(total.created + total.duplicate + total.failed, 8000);
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            processed: 3,
            created: 2,
            duplicate: 0,
            failed: 1,
        };
        assert_eq!(
            summary.to_string(),
            "processed=3 created=2 duplicate=0 failed=1"
        );
    }
}
