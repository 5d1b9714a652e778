//! Dead Letter Queue implementation.
//!
//! Appends failed records as NDJSON to a local file, one file per run.

use std::path::{Path, PathBuf};

use chrono::Utc;
use snafu::prelude::*;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::ErrorHandlingConfig;
use crate::error::{DlqCreateDirSnafu, DlqError, DlqOpenSnafu, DlqSerializeSnafu, DlqWriteSnafu};
use crate::record::WriteFailure;

use super::types::{FailedRecord, FailureStats};

/// Entries buffered before a flush.
const BUFFER_SIZE: usize = 100;

/// Dead Letter Queue for recording failed records.
///
/// Each run writes `<dir>/<job>-failures-<YYYYmmdd-HHMMSS>.ndjson`.
pub struct DeadLetterQueue {
    job: String,
    path: PathBuf,
    file: Mutex<File>,
    buffer: Mutex<Vec<FailedRecord>>,
    stats: Mutex<FailureStats>,
    buffer_size: usize,
}

impl DeadLetterQueue {
    /// Create a DLQ from configuration.
    ///
    /// Returns `None` if no DLQ path is configured.
    pub async fn from_config(
        config: &ErrorHandlingConfig,
        job: &str,
    ) -> Result<Option<Self>, DlqError> {
        let Some(dir) = &config.dlq_path else {
            return Ok(None);
        };
        Self::create(dir, job).await.map(Some)
    }

    /// Create the directory if needed and open a fresh file in it.
    pub async fn create(dir: impl AsRef<Path>, job: &str) -> Result<Self, DlqError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await.context(DlqCreateDirSnafu {
            path: dir.display().to_string(),
        })?;

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("{job}-failures-{timestamp}.ndjson"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context(DlqOpenSnafu {
                path: path.display().to_string(),
            })?;

        info!(target = %job, "DLQ enabled: {}", path.display());

        Ok(Self {
            job: job.to_string(),
            path,
            file: Mutex::new(file),
            buffer: Mutex::new(Vec::new()),
            stats: Mutex::new(FailureStats::default()),
            buffer_size: BUFFER_SIZE,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a failed record.
    pub async fn record_failure(&self, index: u64, failure: &WriteFailure) {
        let failed = FailedRecord {
            job: self.job.clone(),
            index,
            kind: failure.kind,
            error: failure.message.clone(),
            timestamp: Utc::now(),
        };

        debug!("Recording DLQ failure: record {} ({})", index, failure.kind);

        {
            let mut stats = self.stats.lock().await;
            stats.increment(failure.kind);
        }

        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(failed);
            buffer.len() >= self.buffer_size
        };

        if should_flush && let Err(e) = self.flush().await {
            error!("Failed to flush DLQ: {}", e);
        }
    }

    /// Flush buffered entries to the file.
    pub async fn flush(&self) -> Result<(), DlqError> {
        let records = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut *buffer)
        };

        let count = records.len();
        let mut ndjson = String::new();
        for record in &records {
            let line = serde_json::to_string(record).context(DlqSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        let mut file = self.file.lock().await;
        file.write_all(ndjson.as_bytes())
            .await
            .context(DlqWriteSnafu)?;
        file.flush().await.context(DlqWriteSnafu)?;

        debug!("Flushed {} records to DLQ", count);
        Ok(())
    }

    /// Flush remaining entries and log totals.
    pub async fn finalize(&self) -> Result<(), DlqError> {
        self.flush().await?;
        let stats = self.stats.lock().await;
        if stats.total() > 0 {
            info!(
                target = %self.job,
                "DLQ finalized: {} total failures ({})",
                stats.total(),
                stats
            );
        }
        Ok(())
    }

    pub async fn stats(&self) -> FailureStats {
        self.stats.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FailureKind;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_from_config_without_path() {
        let config = ErrorHandlingConfig::default();
        assert!(DeadLetterQueue::from_config(&config, "job").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_flush_on_finalize() {
        let dir = TempDir::new().unwrap();
        let dlq = DeadLetterQueue::create(dir.path().join("nested"), "arxiv")
            .await
            .unwrap();

        let file_name = dlq.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("arxiv-failures-"));
        assert!(file_name.ends_with(".ndjson"));

        dlq.record_failure(3, &WriteFailure::new(FailureKind::NotAMapping, "a string"))
            .await;
        dlq.record_failure(7, &WriteFailure::new(FailureKind::Rejected, "bad field"))
            .await;

        // Below the buffer size nothing is written yet
        assert!(read_lines(dlq.path()).is_empty());

        dlq.finalize().await.unwrap();
        let lines = read_lines(dlq.path());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["job"], "arxiv");
        assert_eq!(lines[0]["index"], 3);
        assert_eq!(lines[0]["kind"], "not_a_mapping");
        assert_eq!(lines[1]["error"], "bad field");
        assert!(lines[1]["timestamp"].is_string());

        assert_eq!(dlq.stats().await.total(), 2);
    }

    #[tokio::test]
    async fn test_flushes_when_buffer_fills() {
        let dir = TempDir::new().unwrap();
        let dlq = DeadLetterQueue::create(dir.path(), "job").await.unwrap();

        for i in 0..BUFFER_SIZE as u64 {
            dlq.record_failure(i, &WriteFailure::new(FailureKind::Transport, "down"))
                .await;
        }

        assert_eq!(read_lines(dlq.path()).len(), BUFFER_SIZE);
    }
}
