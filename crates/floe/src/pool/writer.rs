//! The per-record write function the pool drives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::record::{FailureKind, Record, WriteOutcome};

/// Writes one record and classifies the result. Never fails as a whole.
#[async_trait]
pub trait RecordWriter: Send + Sync + 'static {
    async fn write(&self, record: Record) -> WriteOutcome;
}

#[async_trait]
impl<W: RecordWriter + ?Sized> RecordWriter for Arc<W> {
    async fn write(&self, record: Record) -> WriteOutcome {
        (**self).write(record).await
    }
}

/// Fails a write that takes longer than `timeout`.
pub struct TimeoutWriter<W> {
    inner: W,
    timeout: Duration,
}

impl<W: RecordWriter> TimeoutWriter<W> {
    pub fn new(inner: W, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<W: RecordWriter> RecordWriter for TimeoutWriter<W> {
    async fn write(&self, record: Record) -> WriteOutcome {
        match tokio::time::timeout(self.timeout, self.inner.write(record)).await {
            Ok(outcome) => outcome,
            Err(_) => timed_out(self.timeout),
        }
    }
}

/// The outcome of a write that ran past `timeout`.
pub fn timed_out(timeout: Duration) -> WriteOutcome {
    WriteOutcome::failed(
        FailureKind::Timeout,
        format!("write timed out after {:?}", timeout),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SlowWriter(Duration);

    #[async_trait]
    impl RecordWriter for SlowWriter {
        async fn write(&self, _record: Record) -> WriteOutcome {
            tokio::time::sleep(self.0).await;
            WriteOutcome::Created
        }
    }

    fn record() -> Record {
        Record::try_from_value(json!({"a": 1})).unwrap()
    }

    #[tokio::test]
    async fn test_fast_write_passes_through() {
        let writer = TimeoutWriter::new(SlowWriter(Duration::ZERO), Duration::from_secs(5));
        assert_eq!(writer.write(record()).await, WriteOutcome::Created);
    }

    #[tokio::test]
    async fn test_slow_write_times_out() {
        let writer = TimeoutWriter::new(
            SlowWriter(Duration::from_secs(5)),
            Duration::from_millis(10),
        );
        let outcome = writer.write(record()).await;
        assert!(matches!(
            outcome,
            WriteOutcome::Failed(ref f) if f.kind == FailureKind::Timeout
        ));
    }
}
