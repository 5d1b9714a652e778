//! Error types for the floe ingestion runner.
//!
//! Fatal errors (source, decode, connect, authenticate, target selection)
//! end a run as `RunAborted`. Per-record problems never become errors here;
//! they are folded into `WriteOutcome::Failed` and counted.

use std::fmt;

use snafu::prelude::*;

use crate::accounting::RunSummary;

pub use floe_core::error::ConfigError;

/// Errors opening the input document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The input file is missing or cannot be opened.
    #[snafu(display("Failed to open input {path}: {source}"))]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// Failed to set up a decompressor for the input.
    #[snafu(display("Failed to initialise {codec} decompression for {path}: {source}"))]
    Decompressor {
        codec: &'static str,
        path: String,
        source: std::io::Error,
    },
}

/// Errors raised while decoding the input stream.
///
/// Every variant carries the number of records already handed out, so callers
/// can tell a document that was bad from the start from one that broke
/// part-way through.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The underlying reader failed.
    #[snafu(display("Failed to read input after {records} record(s): {source}"))]
    Read {
        records: u64,
        source: std::io::Error,
    },

    /// The bytes are not valid JSON at the given position.
    #[snafu(display(
        "Malformed input at line {line}, column {column} after {records} record(s): {message}"
    ))]
    Malformed {
        records: u64,
        line: usize,
        column: usize,
        message: String,
    },

    /// An element nests deeper than the decoder will follow.
    #[snafu(display(
        "Element nested too deeply at line {line}, column {column} after {records} record(s)"
    ))]
    TooDeep {
        records: u64,
        line: usize,
        column: usize,
    },

    /// The document's top-level value is not an array.
    #[snafu(display("Expected a top-level JSON array, found {found}"))]
    NotAnArray { found: String },

    /// The blocking decode task died without reporting.
    #[snafu(display("Decoder task failed after {records} record(s): {message}"))]
    DecoderTask { records: u64, message: String },
}

impl DecodeError {
    /// Build from a serde_json error, attributing it to the right variant.
    pub(crate) fn from_json(err: serde_json::Error, records: u64) -> Self {
        if err.is_io() {
            let source = std::io::Error::from(err);
            return DecodeError::Read { records, source };
        }
        // serde_json keeps its error codes private
        if err.to_string().starts_with("recursion limit exceeded") {
            return DecodeError::TooDeep {
                records,
                line: err.line(),
                column: err.column(),
            };
        }
        DecodeError::Malformed {
            records,
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }

    /// Records yielded before the error.
    pub fn records(&self) -> u64 {
        match self {
            DecodeError::Read { records, .. }
            | DecodeError::Malformed { records, .. }
            | DecodeError::TooDeep { records, .. }
            | DecodeError::DecoderTask { records, .. } => *records,
            DecodeError::NotAnArray { .. } => 0,
        }
    }

    /// True when no record was yielded before the failure.
    pub fn is_before_first_record(&self) -> bool {
        self.records() == 0
    }
}

/// Classification of a sink's write error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteErrorKind {
    /// The record's identity already exists in the target.
    Conflict,
    /// The sink refused the record for any other reason.
    Rejected,
    /// The request did not complete (network, protocol, closed handle).
    Transport,
}

impl WriteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteErrorKind::Conflict => "conflict",
            WriteErrorKind::Rejected => "rejected",
            WriteErrorKind::Transport => "transport",
        }
    }
}

impl fmt::Display for WriteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by sink connections.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// No connector handles this address scheme.
    #[snafu(display("Unsupported sink address '{address}'"))]
    UnsupportedAddress { address: String },

    /// The address could not be parsed.
    #[snafu(display("Invalid sink address '{address}': {source}"))]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },

    /// Transport-level connectivity failed.
    #[snafu(display("Failed to connect to {address}: {message}"))]
    Connect { address: String, message: String },

    /// Credentials were rejected or could not be presented.
    #[snafu(display("Authentication failed: {message}"))]
    Authenticate { message: String },

    /// Namespace or database could not be selected.
    #[snafu(display("Failed to select {namespace}/{database}: {message}"))]
    SelectTarget {
        namespace: String,
        database: String,
        message: String,
    },

    /// A single write failed.
    #[snafu(display("Write failed ({kind}): {message}"))]
    Write {
        kind: WriteErrorKind,
        message: String,
    },

    /// The connection was used after close.
    #[snafu(display("Connection is closed"))]
    Closed,
}

impl SinkError {
    /// True when the sink reported an identity conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SinkError::Write {
                kind: WriteErrorKind::Conflict,
                ..
            }
        )
    }
}

/// Errors from the dead-letter log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix keeps the selectors distinct from other modules' (e.g., WriteSnafu)
#[allow(clippy::enum_variant_names)]
pub enum DlqError {
    /// Failed to create the DLQ directory.
    #[snafu(display("Failed to create DLQ directory {path}: {source}"))]
    DlqCreateDir {
        path: String,
        source: std::io::Error,
    },

    /// Failed to open the DLQ file.
    #[snafu(display("Failed to open DLQ file {path}: {source}"))]
    DlqOpen {
        path: String,
        source: std::io::Error,
    },

    /// Failed to append to the DLQ file.
    #[snafu(display("Failed to write DLQ file: {source}"))]
    DlqWrite { source: std::io::Error },

    /// Failed to serialize a DLQ entry.
    #[snafu(display("Failed to serialize DLQ entry: {source}"))]
    DlqSerialize { source: serde_json::Error },
}

/// Why a run ended in the `Aborted` state.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AbortReason {
    /// The input could not be opened.
    #[snafu(context(suffix(AbortSnafu)))]
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// The input was malformed or unreadable.
    #[snafu(context(suffix(AbortSnafu)))]
    #[snafu(display("Decode error: {source}"))]
    Decode { source: DecodeError },

    /// The sink could not be reached.
    #[snafu(context(suffix(AbortSnafu)))]
    #[snafu(display("Connect error: {source}"))]
    Connect { source: SinkError },

    /// The sink rejected the credentials.
    #[snafu(context(suffix(AbortSnafu)))]
    #[snafu(display("Auth error: {source}"))]
    Authenticate { source: SinkError },

    /// The sink rejected the namespace or database.
    #[snafu(context(suffix(AbortSnafu)))]
    #[snafu(display("Target error: {source}"))]
    SelectTarget { source: SinkError },

    /// The configured failure limit was reached.
    #[snafu(context(suffix(AbortSnafu)))]
    #[snafu(display("Stopped after {failures} failed record(s)"))]
    TooManyFailures { failures: u64 },
}

/// Terminal error of a run, together with the counts accrued before it.
#[derive(Debug)]
pub struct RunAborted {
    pub reason: AbortReason,
    pub summary: RunSummary,
}

impl fmt::Display for RunAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run aborted: {} ({})", self.reason, self.summary)
    }
}

impl std::error::Error for RunAborted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Top-level error of one configured job.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum JobError {
    /// The sink address could not be resolved to a connector.
    #[snafu(display("Sink setup failed: {source}"))]
    SinkSetup { source: SinkError },

    /// The dead-letter log could not be created.
    #[snafu(display("DLQ setup failed: {source}"))]
    DlqSetup { source: DlqError },

    /// The run ended in the aborted state.
    #[snafu(display("{source}"))]
    Aborted { source: RunAborted },
}

impl From<RunAborted> for JobError {
    fn from(source: RunAborted) -> Self {
        JobError::Aborted { source }
    }
}
