//! DLQ entry and statistics types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::record::FailureKind;

/// One failed record as written to the DLQ.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRecord {
    /// Job that produced the failure.
    pub job: String,
    /// Zero-based position of the element in the input.
    pub index: u64,
    pub kind: FailureKind,
    /// Error message describing the failure.
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Failure counts by kind, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct FailureStats {
    by_kind: IndexMap<FailureKind, u64>,
}

impl FailureStats {
    pub fn increment(&mut self, kind: FailureKind) {
        *self.by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn count(&self, kind: FailureKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.by_kind.values().sum()
    }
}

impl std::fmt::Display for FailureStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .by_kind
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
