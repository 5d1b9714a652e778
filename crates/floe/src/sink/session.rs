//! The write path workers use, under either connection strategy.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Deserialize;
use tokio::time::Instant;

use super::classify::classify;
use super::traits::{Credentials, SinkConnection, SinkConnector};
use crate::error::SinkError;
use crate::pool::{RecordWriter, timed_out};
use crate::record::{FailureKind, Record, Target, WriteOutcome};

/// How workers obtain a connection for each write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStrategy {
    /// One connection, set up once and shared by every worker.
    #[default]
    Shared,
    /// Each write opens, authenticates, selects, writes and closes its own.
    PerRecord,
}

/// Everything a per-record connection needs to set itself up.
pub struct PerRecordSetup {
    pub connector: Arc<dyn SinkConnector>,
    pub address: String,
    pub credentials: Option<Credentials>,
    pub target: Target,
}

enum Mode {
    Shared,
    PerRecord(PerRecordSetup),
}

/// Writes records to the selected table.
///
/// Holds the run's primary connection in both strategies; the runner closes
/// it once at the end of the run.
pub struct SinkSession {
    primary: Arc<dyn SinkConnection>,
    table: String,
    mode: Mode,
    write_timeout: Option<Duration>,
}

impl SinkSession {
    /// Every write goes through `primary`.
    pub fn shared(primary: Arc<dyn SinkConnection>, table: impl Into<String>) -> Self {
        Self {
            primary,
            table: table.into(),
            mode: Mode::Shared,
            write_timeout: None,
        }
    }

    /// Every write uses a fresh connection built from `setup`.
    pub fn per_record(primary: Arc<dyn SinkConnection>, setup: PerRecordSetup) -> Self {
        Self {
            primary,
            table: setup.target.table.clone(),
            mode: Mode::PerRecord(setup),
            write_timeout: None,
        }
    }

    /// Bound each per-record write, setup included. The connection is still
    /// closed when the deadline passes.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn strategy(&self) -> ConnectionStrategy {
        match self.mode {
            Mode::Shared => ConnectionStrategy::Shared,
            Mode::PerRecord(_) => ConnectionStrategy::PerRecord,
        }
    }

    /// Close the primary connection.
    pub async fn close(&self) {
        self.primary.close().await;
    }

    async fn write_per_record(&self, setup: &PerRecordSetup, record: &Record) -> WriteOutcome {
        let deadline = self.write_timeout.map(|t| Instant::now() + t);

        let mut conn = match within(deadline, setup.connector.connect(&setup.address)).await {
            Some(Ok(conn)) => conn,
            Some(Err(e)) => return WriteOutcome::failed(FailureKind::Connect, e.to_string()),
            None => return self.timeout_outcome(),
        };

        let attempt = AssertUnwindSafe(async {
            match prepare(conn.as_mut(), setup).await {
                Ok(()) => classify(conn.create(&self.table, record).await),
                Err(e) => WriteOutcome::failed(FailureKind::Connect, e.to_string()),
            }
        })
        .catch_unwind();
        let finished = within(deadline, attempt).await;

        conn.close().await;

        match finished {
            Some(Ok(outcome)) => outcome,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => self.timeout_outcome(),
        }
    }

    fn timeout_outcome(&self) -> WriteOutcome {
        timed_out(self.write_timeout.unwrap_or_default())
    }
}

/// Run `fut` to completion, or until `deadline` if there is one.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

async fn prepare(conn: &mut dyn SinkConnection, setup: &PerRecordSetup) -> Result<(), SinkError> {
    if let Some(credentials) = &setup.credentials {
        conn.authenticate(credentials).await?;
    }
    conn.select_target(&setup.target).await
}

#[async_trait]
impl RecordWriter for SinkSession {
    async fn write(&self, record: Record) -> WriteOutcome {
        match &self.mode {
            Mode::Shared => classify(self.primary.create(&self.table, &record).await),
            Mode::PerRecord(setup) => self.write_per_record(setup, &record).await,
        }
    }
}
