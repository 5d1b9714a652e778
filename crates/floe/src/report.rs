//! Observational reporting surface.
//!
//! Nothing here affects a run's result. The runner and pool call into an
//! injected `Reporter`; `ProgressTicker` samples the counters on a timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accounting::{RunAccounting, RunSummary};
use crate::record::WriteOutcome;

/// After the first `log_failures` failures, only every this-many-th is logged.
const FAILURE_LOG_STRIDE: u64 = 1000;

/// Lifecycle milestones of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Connected,
    Authenticated,
    TargetSelected,
    Streaming,
    Draining,
    Finished { summary: RunSummary, cancelled: bool },
    Aborted { reason: String, summary: RunSummary },
}

/// Receives lifecycle events and per-record outcomes.
pub trait Reporter: Send + Sync {
    fn on_event(&self, _event: &LifecycleEvent) {}

    fn on_outcome(&self, _index: u64, _outcome: &WriteOutcome, _summary: &RunSummary) {}
}

/// Reporter that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Reporter that logs through `tracing`.
#[derive(Debug)]
pub struct TracingReporter {
    job: String,
    log_failures: u64,
    progress_every: u64,
    failures_seen: AtomicU64,
    outcomes_seen: AtomicU64,
}

impl TracingReporter {
    /// `log_failures` failures are logged individually; a progress line is
    /// logged every `progress_every` records (0 disables it).
    pub fn new(job: impl Into<String>, log_failures: u64, progress_every: u64) -> Self {
        Self {
            job: job.into(),
            log_failures,
            progress_every,
            failures_seen: AtomicU64::new(0),
            outcomes_seen: AtomicU64::new(0),
        }
    }

    /// Count one outcome; true for exactly one caller per `progress_every`.
    fn progress_due(&self) -> bool {
        if self.progress_every == 0 {
            return false;
        }
        let seen = self.outcomes_seen.fetch_add(1, Ordering::Relaxed) + 1;
        seen % self.progress_every == 0
    }
}

impl Reporter for TracingReporter {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Started => info!(target = %self.job, "Run started"),
            LifecycleEvent::Connected => info!(target = %self.job, "Connected to sink"),
            LifecycleEvent::Authenticated => info!(target = %self.job, "Authenticated"),
            LifecycleEvent::TargetSelected => info!(target = %self.job, "Target selected"),
            LifecycleEvent::Streaming => info!(target = %self.job, "Streaming records"),
            LifecycleEvent::Draining => debug!(target = %self.job, "Draining in-flight writes"),
            LifecycleEvent::Finished { summary, cancelled } => info!(
                target = %self.job,
                processed = summary.processed,
                created = summary.created,
                duplicate = summary.duplicate,
                failed = summary.failed,
                cancelled,
                "Run finished"
            ),
            LifecycleEvent::Aborted { reason, summary } => warn!(
                target = %self.job,
                processed = summary.processed,
                created = summary.created,
                duplicate = summary.duplicate,
                failed = summary.failed,
                "Run aborted: {}",
                reason
            ),
        }
    }

    fn on_outcome(&self, index: u64, outcome: &WriteOutcome, summary: &RunSummary) {
        match outcome {
            WriteOutcome::Failed(failure) => {
                let seen = self.failures_seen.fetch_add(1, Ordering::Relaxed) + 1;
                if seen <= self.log_failures || seen % FAILURE_LOG_STRIDE == 0 {
                    warn!(
                        target = %self.job,
                        index,
                        kind = failure.kind.as_str(),
                        failures = seen,
                        "Record failed: {}",
                        failure.message
                    );
                }
            }
            WriteOutcome::Duplicate => debug!(target = %self.job, index, "Record already exists"),
            WriteOutcome::Created => {}
        }

        if self.progress_due() {
            info!(target = %self.job, "Progress: {}", summary);
        }
    }
}

/// Background task logging counters every interval while a run streams.
pub struct ProgressTicker {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn(accounting: Arc<RunAccounting>, interval: Duration, job: String) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let summary = accounting.snapshot();
                        info!(
                            target = %job,
                            decoded = accounting.decoded(),
                            "Progress: {}",
                            summary
                        );
                    }
                }
            }
        });

        Self { stop, handle }
    }

    /// Stop the ticker and wait for it to exit.
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
