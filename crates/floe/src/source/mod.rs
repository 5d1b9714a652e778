//! Input side of a run: opening, decompressing and decoding the document.
//!
//! Decoding runs on a blocking thread and feeds a bounded channel, so the
//! decoder can never get more than `capacity` records ahead of the writers.

mod compression;
mod decoder;
mod format;

pub use compression::{Compression, CompressionCodec, GzipCodec, NoopCodec, ZstdCodec};
pub use decoder::StreamDecoder;
pub use format::{InputFormat, peek_significant};

use std::fs::File;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use snafu::ResultExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use floe_core::emit;
use floe_core::metrics::events::RecordsDecoded;

use crate::accounting::RunAccounting;
use crate::error::{DecodeError, DecompressorSnafu, OpenSnafu, SourceError};
use crate::record::DecodedRecord;

/// Decoded records are reported to metrics in batches of this size.
const METRICS_BATCH: u64 = 1024;

/// Open the input file and wrap it in the right decompressor.
pub fn open_source(
    path: &Path,
    compression: Compression,
) -> Result<Box<dyn BufRead + Send>, SourceError> {
    let shown = path.display().to_string();
    let file = File::open(path).context(OpenSnafu {
        path: shown.clone(),
    })?;

    let compression = compression.resolve(path);
    let codec = compression.codec();
    debug!(path = %shown, codec = codec.name(), "Opened input");

    codec.wrap(Box::new(file)).context(DecompressorSnafu {
        codec: codec.name(),
        path: shown,
    })
}

/// Handle to the background decode task.
pub struct DecodeTask {
    handle: JoinHandle<Result<u64, DecodeError>>,
    accounting: Arc<RunAccounting>,
}

impl DecodeTask {
    /// Spawn the decoder. Returns the receiving end of the record queue.
    ///
    /// The decoder blocks while the queue is full and stops at the next
    /// element once the receiver is dropped.
    pub fn spawn(
        reader: Box<dyn BufRead + Send>,
        format: InputFormat,
        capacity: usize,
        accounting: Arc<RunAccounting>,
        target: String,
    ) -> (mpsc::Receiver<DecodedRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counter = accounting.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let mut unreported = 0u64;
            let result = StreamDecoder::new(reader, format).decode(|record| {
                if tx.blocking_send(record).is_err() {
                    // Receiver dropped
                    return ControlFlow::Break(());
                }
                counter.note_decoded(1);
                unreported += 1;
                if unreported >= METRICS_BATCH {
                    emit!(RecordsDecoded {
                        count: unreported,
                        target: target.clone(),
                    });
                    unreported = 0;
                }
                ControlFlow::Continue(())
            });

            if unreported > 0 {
                emit!(RecordsDecoded {
                    count: unreported,
                    target,
                });
            }
            result
        });

        (rx, Self { handle, accounting })
    }

    /// Wait for the decoder to finish and return how many elements it read.
    pub async fn join(self) -> Result<u64, DecodeError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(DecodeError::DecoderTask {
                records: self.accounting.decoded(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file() {
        let err = open_source(Path::new("/nonexistent/input.json"), Compression::Auto)
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/input.json"));
    }

    #[test]
    fn test_open_gzip_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.json.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"[1,2]").unwrap();
        encoder.finish().unwrap();

        let mut reader = open_source(&path, Compression::Auto).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "[1,2]");
    }

    #[tokio::test]
    async fn test_decode_task_feeds_channel() {
        let accounting = Arc::new(RunAccounting::new());
        let reader: Box<dyn BufRead + Send> = Box::new(&br#"[{"a":1},{"b":2},{"c":3}]"#[..]);
        let (mut rx, task) = DecodeTask::spawn(
            reader,
            InputFormat::Array,
            1,
            accounting.clone(),
            "test".to_string(),
        );

        let mut indices = Vec::new();
        while let Some(record) = rx.recv().await {
            indices.push(record.index);
        }

        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(task.join().await.unwrap(), 3);
        assert_eq!(accounting.decoded(), 3);
    }

    #[tokio::test]
    async fn test_decode_task_stops_when_receiver_dropped() {
        let accounting = Arc::new(RunAccounting::new());
        let reader: Box<dyn BufRead + Send> = Box::new(&b"[1,2,3,4,5,6,7,8]"[..]);
        let (mut rx, task) =
            DecodeTask::spawn(reader, InputFormat::Array, 1, accounting, "test".to_string());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.index, 0);
        drop(rx);

        let count = task.join().await.unwrap();
        assert!(count < 8);
    }

    #[tokio::test]
    async fn test_decode_task_reports_error() {
        let accounting = Arc::new(RunAccounting::new());
        let reader: Box<dyn BufRead + Send> = Box::new(&b"[1, 2, oops"[..]);
        let (mut rx, task) =
            DecodeTask::spawn(reader, InputFormat::Array, 4, accounting, "test".to_string());

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }

        let err = task.join().await.unwrap_err();
        assert_eq!(received, 2);
        assert_eq!(err.records(), 2);
    }
}
