//! Internal events for floe metrics emission.
//!
//! Each struct is one measurable occurrence during an ingestion run. The
//! `target` label carries the job key so several jobs in one process can be
//! told apart.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    fn emit(self);
}

/// Records decoded from the input document.
pub struct RecordsDecoded {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for RecordsDecoded {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Records decoded");
        counter!("floe_records_decoded_total", "target" => self.target).increment(self.count);
    }
}

/// Outcome label for a write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeLabel {
    Created,
    Duplicate,
    Failed,
}

impl OutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeLabel::Created => "created",
            OutcomeLabel::Duplicate => "duplicate",
            OutcomeLabel::Failed => "failed",
        }
    }
}

/// One record finished with the given outcome.
pub struct RecordOutcomeRecorded {
    pub outcome: OutcomeLabel,
    /// Failure kind for failed records, `None` otherwise.
    pub reason: Option<&'static str>,
    pub target: String,
}

impl InternalEvent for RecordOutcomeRecorded {
    fn emit(self) {
        let reason = self.reason.unwrap_or("none");
        trace!(outcome = self.outcome.as_str(), reason, target = %self.target, "Record outcome");
        counter!(
            "floe_records_processed_total",
            "outcome" => self.outcome.as_str(),
            "reason" => reason,
            "target" => self.target
        )
        .increment(1);
    }
}

/// A single write call completed, regardless of outcome.
pub struct WriteCompleted {
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for WriteCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Write completed"
        );
        histogram!("floe_write_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

/// Number of writes currently in flight.
pub struct ActiveWrites {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for ActiveWrites {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Active writes");
        gauge!("floe_active_writes", "target" => self.target).set(self.count as f64);
    }
}

/// Decoded records waiting in the dispatch queue.
pub struct QueueDepth {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for QueueDepth {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Queue depth");
        gauge!("floe_queue_depth", "target" => self.target).set(self.count as f64);
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Aborted,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Aborted => "aborted",
        }
    }
}

/// A run reached a terminal state.
pub struct RunFinished {
    pub status: RunStatus,
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for RunFinished {
    fn emit(self) {
        trace!(
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Run finished"
        );
        counter!("floe_runs_total", "status" => self.status.as_str(), "target" => self.target.clone())
            .increment(1);
        histogram!("floe_run_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}
