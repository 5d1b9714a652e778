//! Orchestration of one ingestion run.
//!
//! `Idle -> Connecting -> Authenticating -> TargetSelected -> Streaming ->
//! Draining -> Closed`, with `Aborted` reachable from any non-terminal state.
//! Once a connection exists it is closed exactly once, whatever the exit path.

mod state;

pub use state::RunState;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use floe_core::emit;
use floe_core::metrics::events::{RunFinished, RunStatus};

use crate::accounting::{RunAccounting, RunSummary};
use crate::dlq::DeadLetterQueue;
use crate::error::{
    AbortReason, AuthenticateAbortSnafu, ConnectAbortSnafu, DecodeError, RunAborted,
    SelectTargetAbortSnafu, SourceAbortSnafu,
};
use crate::pool::{DispatchPool, PoolConfig, PoolContext, PoolExit, RecordWriter, TimeoutWriter};
use crate::record::Target;
use crate::report::{LifecycleEvent, NoopReporter, ProgressTicker, Reporter};
use crate::sink::{
    ConnectionStrategy, Credentials, PerRecordSetup, SinkConnection, SinkConnector, SinkSession,
};
use crate::source::{Compression, DecodeTask, InputFormat, open_source};

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Job key, used in logs and metric labels.
    pub job: String,
    pub source_path: PathBuf,
    pub format: InputFormat,
    pub compression: Compression,
    pub address: String,
    pub credentials: Option<Credentials>,
    pub target: Target,
    pub strategy: ConnectionStrategy,
    pub pool: PoolConfig,
    /// Decoded records buffered ahead of the writers.
    pub queue_capacity: usize,
    pub write_timeout: Option<Duration>,
    pub progress_interval: Option<Duration>,
}

impl RunSettings {
    /// Settings with defaults for everything but the essentials.
    pub fn new(
        job: impl Into<String>,
        source_path: impl Into<PathBuf>,
        address: impl Into<String>,
        target: Target,
    ) -> Self {
        Self {
            job: job.into(),
            source_path: source_path.into(),
            format: InputFormat::default(),
            compression: Compression::default(),
            address: address.into(),
            credentials: None,
            target,
            strategy: ConnectionStrategy::default(),
            pool: PoolConfig::default(),
            queue_capacity: 1024,
            write_timeout: None,
            progress_interval: None,
        }
    }
}

/// Result of a run that reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub summary: RunSummary,
    /// True when the run stopped early on request.
    pub cancelled: bool,
}

pub struct IngestionRunner {
    settings: RunSettings,
    connector: Arc<dyn SinkConnector>,
    reporter: Arc<dyn Reporter>,
    dlq: Option<Arc<DeadLetterQueue>>,
    shutdown: CancellationToken,
    accounting: Arc<RunAccounting>,
    state: RunState,
}

impl IngestionRunner {
    pub fn new(settings: RunSettings, connector: Arc<dyn SinkConnector>) -> Self {
        Self {
            settings,
            connector,
            reporter: Arc::new(NoopReporter),
            dlq: None,
            shutdown: CancellationToken::new(),
            accounting: Arc::new(RunAccounting::new()),
            state: RunState::Idle,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_dlq(mut self, dlq: Option<Arc<DeadLetterQueue>>) -> Self {
        self.dlq = dlq;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Counters of this run, readable at any time from another task.
    pub fn accounting(&self) -> Arc<RunAccounting> {
        self.accounting.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run to completion.
    pub async fn run(mut self) -> Result<RunReport, RunAborted> {
        let started = Instant::now();
        self.reporter.on_event(&LifecycleEvent::Started);

        let outcome = self.connect_and_stream().await;
        let summary = self.accounting.snapshot();

        match outcome {
            Ok(cancelled) => {
                self.transition(RunState::Closed);
                self.reporter
                    .on_event(&LifecycleEvent::Finished { summary, cancelled });
                let status = if cancelled {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                };
                self.emit_finished(status, started);
                Ok(RunReport { summary, cancelled })
            }
            Err(reason) => {
                self.transition(RunState::Aborted);
                error!(target = %self.settings.job, "Run aborted: {}", reason);
                self.reporter.on_event(&LifecycleEvent::Aborted {
                    reason: reason.to_string(),
                    summary,
                });
                self.emit_finished(RunStatus::Aborted, started);
                Err(RunAborted { reason, summary })
            }
        }
    }

    /// Everything up to `Closed`. Returns whether the run was cancelled.
    async fn connect_and_stream(&mut self) -> Result<bool, AbortReason> {
        self.transition(RunState::Connecting);
        let mut conn = self
            .connector
            .connect(&self.settings.address)
            .await
            .context(ConnectAbortSnafu)?;
        self.reporter.on_event(&LifecycleEvent::Connected);

        self.transition(RunState::Authenticating);
        if let Err(reason) = self.prepare(conn.as_mut()).await {
            conn.close().await;
            return Err(reason);
        }

        let primary: Arc<dyn SinkConnection> = Arc::from(conn);
        let result = self.stream(primary.clone()).await;
        primary.close().await;
        result
    }

    /// Authenticate and select the target on a fresh connection.
    async fn prepare(&mut self, conn: &mut dyn SinkConnection) -> Result<(), AbortReason> {
        if let Some(credentials) = &self.settings.credentials {
            conn.authenticate(credentials)
                .await
                .context(AuthenticateAbortSnafu)?;
            self.reporter.on_event(&LifecycleEvent::Authenticated);
        }

        conn.select_target(&self.settings.target)
            .await
            .context(SelectTargetAbortSnafu)?;
        self.transition(RunState::TargetSelected);
        self.reporter.on_event(&LifecycleEvent::TargetSelected);
        Ok(())
    }

    async fn stream(&mut self, primary: Arc<dyn SinkConnection>) -> Result<bool, AbortReason> {
        self.transition(RunState::Streaming);
        let settings = &self.settings;

        let reader = open_source(&settings.source_path, settings.compression)
            .context(SourceAbortSnafu)?;
        self.reporter.on_event(&LifecycleEvent::Streaming);

        let (rx, decoder) = DecodeTask::spawn(
            reader,
            settings.format,
            settings.queue_capacity,
            self.accounting.clone(),
            settings.job.clone(),
        );

        let writer = self.writer(primary);
        let ticker = settings.progress_interval.map(|interval| {
            ProgressTicker::spawn(self.accounting.clone(), interval, settings.job.clone())
        });

        let pool = DispatchPool::new(settings.pool, settings.job.clone());
        let draining = CancellationToken::new();
        let run = pool.run(
            rx,
            writer,
            PoolContext {
                accounting: self.accounting.clone(),
                reporter: self.reporter.clone(),
                dlq: self.dlq.clone(),
                shutdown: self.shutdown.clone(),
                draining: draining.clone(),
            },
        );
        tokio::pin!(run);

        let exit = tokio::select! {
            exit = &mut run => exit,
            _ = draining.cancelled() => {
                self.transition(RunState::Draining);
                run.await
            }
        };
        // No-op unless the pool finished before the drain signal was seen
        self.transition(RunState::Draining);

        if let Some(ticker) = ticker {
            ticker.stop().await;
        }
        if let Some(dlq) = &self.dlq
            && let Err(e) = dlq.finalize().await
        {
            error!("Failed to finalize DLQ: {}", e);
        }

        let decoded = decoder.join().await;
        self.resolve(exit, decoded)
    }

    /// Build the write path for the configured strategy.
    fn writer(&self, primary: Arc<dyn SinkConnection>) -> Arc<dyn RecordWriter> {
        let settings = &self.settings;
        let session = match settings.strategy {
            ConnectionStrategy::Shared => SinkSession::shared(primary, &settings.target.table),
            ConnectionStrategy::PerRecord => SinkSession::per_record(
                primary,
                PerRecordSetup {
                    connector: self.connector.clone(),
                    address: settings.address.clone(),
                    credentials: settings.credentials.clone(),
                    target: settings.target.clone(),
                },
            ),
        };

        match (settings.write_timeout, settings.strategy) {
            // The per-record session bounds its own writes so it can still close
            (Some(timeout), ConnectionStrategy::PerRecord) => {
                Arc::new(session.with_write_timeout(timeout))
            }
            (Some(timeout), ConnectionStrategy::Shared) => {
                Arc::new(TimeoutWriter::new(session, timeout))
            }
            (None, _) => Arc::new(session),
        }
    }

    /// Decide how streaming ended from the pool exit and the decoder result.
    fn resolve(
        &self,
        exit: PoolExit,
        decoded: Result<u64, DecodeError>,
    ) -> Result<bool, AbortReason> {
        match exit {
            PoolExit::FailureLimit { failures } => Err(AbortReason::TooManyFailures { failures }),
            PoolExit::Cancelled => {
                info!(target = %self.settings.job, "Run cancelled");
                Ok(true)
            }
            PoolExit::Exhausted => match decoded {
                Ok(count) => {
                    debug!(target = %self.settings.job, decoded = count, "Input exhausted");
                    Ok(false)
                }
                Err(source) => Err(AbortReason::Decode { source }),
            },
        }
    }

    fn transition(&mut self, next: RunState) {
        if self.state == next {
            return;
        }
        info!(
            target = %self.settings.job,
            from = %self.state,
            to = %next,
            "Run state changed"
        );
        self.state = next;
    }

    fn emit_finished(&self, status: RunStatus, started: Instant) {
        emit!(RunFinished {
            status,
            duration: started.elapsed(),
            target: self.settings.job.clone(),
        });
    }
}
