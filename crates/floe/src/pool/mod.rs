//! Bounded-concurrency dispatch of records to a writer.
//!
//! At most `workers` writes are in flight. Each write runs on its own task,
//! so a panic is contained to that record. A new record is only taken from
//! the queue when a slot is free, which is what gives the decoder its
//! backpressure.

mod failures;
mod writer;

pub use failures::FailureTracker;
pub use writer::{RecordWriter, TimeoutWriter, timed_out};

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use floe_core::emit;
use floe_core::metrics::events::{
    ActiveWrites, OutcomeLabel, QueueDepth, RecordOutcomeRecorded, WriteCompleted,
};

use crate::accounting::RunAccounting;
use crate::dlq::DeadLetterQueue;
use crate::record::{DecodedRecord, FailureKind, Record, WriteOutcome};
use crate::report::{LifecycleEvent, Reporter};

/// Future resolving to one finished write.
type WriteFuture = Pin<Box<dyn Future<Output = FinishedWrite> + Send>>;

struct FinishedWrite {
    index: u64,
    outcome: WriteOutcome,
    duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum writes in flight. Values below 1 are treated as 1.
    pub workers: usize,
    /// Stop after this many failures in total (0 = unlimited).
    pub max_failures: u64,
    /// Stop after this many failures in a row (0 = unlimited).
    pub max_consecutive_failures: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_failures: 0,
            max_consecutive_failures: 0,
        }
    }
}

/// Why the pool stopped taking records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolExit {
    /// The queue was closed and every record has an outcome.
    Exhausted,
    /// Shutdown was requested; in-flight writes were allowed to finish.
    Cancelled,
    /// A failure limit was reached; in-flight writes were allowed to finish.
    FailureLimit { failures: u64 },
}

/// Shared collaborators for one pool run.
pub struct PoolContext {
    pub accounting: Arc<RunAccounting>,
    pub reporter: Arc<dyn Reporter>,
    pub dlq: Option<Arc<DeadLetterQueue>>,
    pub shutdown: CancellationToken,
    /// Cancelled by the pool once it stops taking records and starts draining.
    pub draining: CancellationToken,
}

pub struct DispatchPool {
    config: PoolConfig,
    /// Job key for metrics labeling.
    target: String,
}

impl DispatchPool {
    pub fn new(config: PoolConfig, target: impl Into<String>) -> Self {
        Self {
            config,
            target: target.into(),
        }
    }

    /// Drive every record from `rx` through `writer`.
    ///
    /// Returns only once no write is in flight.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<DecodedRecord>,
        writer: Arc<dyn RecordWriter>,
        ctx: PoolContext,
    ) -> PoolExit {
        let workers = self.config.workers.max(1);
        let mut in_flight: FuturesUnordered<WriteFuture> = FuturesUnordered::new();
        let mut failures = FailureTracker::new(
            self.config.max_failures,
            self.config.max_consecutive_failures,
        );
        let mut exit: Option<PoolExit> = None;
        let mut draining = false;

        debug!(target = %self.target, workers, "Dispatch pool started");

        loop {
            let accepting = exit.is_none();
            let has_slot = in_flight.len() < workers;

            tokio::select! {
                biased;

                _ = ctx.shutdown.cancelled(), if accepting => {
                    info!(
                        target = %self.target,
                        in_flight = in_flight.len(),
                        "Shutdown requested, draining in-flight writes"
                    );
                    exit = Some(PoolExit::Cancelled);
                }

                Some(done) = in_flight.next(), if !in_flight.is_empty() => {
                    emit!(ActiveWrites {
                        count: in_flight.len(),
                        target: self.target.clone(),
                    });
                    let tripped = failures.observe(&done.outcome);
                    self.finish(done, &ctx).await;
                    if tripped && accepting {
                        exit = Some(PoolExit::FailureLimit {
                            failures: failures.total(),
                        });
                    }
                }

                received = rx.recv(), if accepting && has_slot => match received {
                    Some(record) => {
                        in_flight.push(self.submit(record, writer.clone()));
                        emit!(ActiveWrites {
                            count: in_flight.len(),
                            target: self.target.clone(),
                        });
                        emit!(QueueDepth {
                            count: rx.len(),
                            target: self.target.clone(),
                        });
                    }
                    None => exit = Some(PoolExit::Exhausted),
                },

                else => break,
            }

            if exit.is_some() {
                if !draining {
                    ctx.reporter.on_event(&LifecycleEvent::Draining);
                    ctx.draining.cancel();
                    draining = true;
                }
                if in_flight.is_empty() {
                    break;
                }
            }
        }

        let exit = exit.unwrap_or(PoolExit::Exhausted);
        debug!(target = %self.target, ?exit, "Dispatch pool finished");
        exit
    }

    /// Start one write. Elements that are not objects fail without a task.
    fn submit(&self, decoded: DecodedRecord, writer: Arc<dyn RecordWriter>) -> WriteFuture {
        let DecodedRecord { index, value } = decoded;
        let started = Instant::now();

        let record = match Record::try_from_value(value) {
            Ok(record) => record,
            Err(other) => {
                let outcome = WriteOutcome::failed(
                    FailureKind::NotAMapping,
                    format!("expected an object, found {}", json_kind(&other)),
                );
                return Box::pin(async move {
                    FinishedWrite {
                        index,
                        outcome,
                        duration: started.elapsed(),
                    }
                });
            }
        };

        let handle = tokio::spawn(async move { writer.write(record).await });
        Box::pin(async move {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => WriteOutcome::failed(
                    FailureKind::Panicked,
                    format!("write task panicked: {}", panic_message(e.into_panic())),
                ),
                Err(e) => WriteOutcome::failed(FailureKind::Panicked, e.to_string()),
            };
            FinishedWrite {
                index,
                outcome,
                duration: started.elapsed(),
            }
        })
    }

    /// Count a finished write and hand it to the observers.
    async fn finish(&self, done: FinishedWrite, ctx: &PoolContext) {
        let FinishedWrite {
            index,
            outcome,
            duration,
        } = done;

        let summary = ctx.accounting.record(&outcome);

        let (label, reason) = match &outcome {
            WriteOutcome::Created => (OutcomeLabel::Created, None),
            WriteOutcome::Duplicate => (OutcomeLabel::Duplicate, None),
            WriteOutcome::Failed(failure) => (OutcomeLabel::Failed, Some(failure.kind.as_str())),
        };
        emit!(WriteCompleted {
            duration,
            target: self.target.clone(),
        });
        emit!(RecordOutcomeRecorded {
            outcome: label,
            reason,
            target: self.target.clone(),
        });

        if let WriteOutcome::Failed(failure) = &outcome
            && let Some(dlq) = &ctx.dlq
        {
            dlq.record_failure(index, failure).await;
        }

        ctx.reporter.on_outcome(index, &outcome, &summary);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::RunSummary;
    use crate::report::NoopReporter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tracks the highest number of concurrent writes it has seen.
    #[derive(Default)]
    struct GaugeWriter {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RecordWriter for GaugeWriter {
        async fn write(&self, _record: Record) -> WriteOutcome {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            WriteOutcome::Created
        }
    }

    struct SlowWriter(Duration);

    #[async_trait]
    impl RecordWriter for SlowWriter {
        async fn write(&self, _record: Record) -> WriteOutcome {
            tokio::time::sleep(self.0).await;
            WriteOutcome::Created
        }
    }

    /// Panics on records with `"panic": true`, fails on `"fail": true`.
    struct FaultyWriter;

    #[async_trait]
    impl RecordWriter for FaultyWriter {
        async fn write(&self, record: Record) -> WriteOutcome {
            if record.fields().get("panic") == Some(&json!(true)) {
                panic!("boom");
            }
            if record.fields().get("fail") == Some(&json!(true)) {
                return WriteOutcome::failed(FailureKind::Rejected, "refused");
            }
            WriteOutcome::Created
        }
    }

    fn context(accounting: &Arc<RunAccounting>, shutdown: CancellationToken) -> PoolContext {
        PoolContext {
            accounting: accounting.clone(),
            reporter: Arc::new(NoopReporter),
            dlq: None,
            shutdown,
            draining: CancellationToken::new(),
        }
    }

    fn feed(values: Vec<Value>) -> mpsc::Receiver<DecodedRecord> {
        let (tx, rx) = mpsc::channel(values.len().max(1));
        for (i, value) in values.into_iter().enumerate() {
            tx.try_send(DecodedRecord {
                index: i as u64,
                value,
            })
            .unwrap();
        }
        rx
    }

    fn pool(workers: usize) -> DispatchPool {
        DispatchPool::new(
            PoolConfig {
                workers,
                ..PoolConfig::default()
            },
            "test",
        )
    }

    #[tokio::test]
    async fn test_never_exceeds_worker_count() {
        let accounting = Arc::new(RunAccounting::new());
        let writer = Arc::new(GaugeWriter::default());
        let values = (0..100).map(|i| json!({ "i": i })).collect();

        let exit = pool(4)
            .run(
                feed(values),
                writer.clone(),
                context(&accounting, CancellationToken::new()),
            )
            .await;

        assert_eq!(exit, PoolExit::Exhausted);
        assert!(writer.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(accounting.snapshot().created, 100);
    }

    #[tokio::test]
    async fn test_more_workers_than_records() {
        let accounting = Arc::new(RunAccounting::new());
        let exit = pool(64)
            .run(
                feed(vec![json!({"a": 1}), json!({"b": 2})]),
                Arc::new(GaugeWriter::default()),
                context(&accounting, CancellationToken::new()),
            )
            .await;

        assert_eq!(exit, PoolExit::Exhausted);
        assert_eq!(accounting.snapshot().processed, 2);
    }

    #[tokio::test]
    async fn test_draining_signalled_before_in_flight_writes_finish() {
        let accounting = Arc::new(RunAccounting::new());
        let mut ctx = context(&accounting, CancellationToken::new());
        let draining = CancellationToken::new();
        ctx.draining = draining.clone();

        let handle = tokio::spawn(async move {
            pool(4)
                .run(
                    feed(vec![json!({"a": 1}), json!({"b": 2})]),
                    Arc::new(SlowWriter(Duration::from_millis(100))),
                    ctx,
                )
                .await
        });

        tokio::time::timeout(Duration::from_secs(5), draining.cancelled())
            .await
            .unwrap();
        assert_eq!(accounting.snapshot().processed, 0);

        assert_eq!(handle.await.unwrap(), PoolExit::Exhausted);
        assert_eq!(accounting.snapshot().processed, 2);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let accounting = Arc::new(RunAccounting::new());
        let exit = pool(2)
            .run(
                feed(Vec::new()),
                Arc::new(GaugeWriter::default()),
                context(&accounting, CancellationToken::new()),
            )
            .await;

        assert_eq!(exit, PoolExit::Exhausted);
        assert_eq!(accounting.snapshot(), RunSummary::default());
    }

    #[tokio::test]
    async fn test_faults_are_isolated() {
        let accounting = Arc::new(RunAccounting::new());
        let values = vec![
            json!({"ok": 1}),
            json!({"panic": true}),
            json!("not-a-mapping"),
            json!({"fail": true}),
            json!({"ok": 2}),
        ];

        let exit = pool(2)
            .run(
                feed(values),
                Arc::new(FaultyWriter),
                context(&accounting, CancellationToken::new()),
            )
            .await;

        assert_eq!(exit, PoolExit::Exhausted);
        assert_eq!(
            accounting.snapshot(),
            RunSummary {
                processed: 5,
                created: 2,
                duplicate: 0,
                failed: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_failure_limit_stops_taking_records() {
        let accounting = Arc::new(RunAccounting::new());
        let values = (0..50).map(|_| json!({"fail": true})).collect();
        let config = PoolConfig {
            workers: 1,
            max_failures: 3,
            max_consecutive_failures: 0,
        };

        let exit = DispatchPool::new(config, "test")
            .run(
                feed(values),
                Arc::new(FaultyWriter),
                context(&accounting, CancellationToken::new()),
            )
            .await;

        assert_eq!(exit, PoolExit::FailureLimit { failures: 3 });
        assert_eq!(accounting.snapshot().failed, 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_intake() {
        let accounting = Arc::new(RunAccounting::new());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let values = (0..10).map(|i| json!({ "i": i })).collect();
        let exit = pool(2)
            .run(
                feed(values),
                Arc::new(GaugeWriter::default()),
                context(&accounting, shutdown),
            )
            .await;

        assert_eq!(exit, PoolExit::Cancelled);
        assert_eq!(accounting.snapshot().processed, 0);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("boom".to_string())), "boom");
        assert_eq!(panic_message(Box::new(7)), "unknown panic");
    }
}
