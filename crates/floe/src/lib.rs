//! floe: streaming ingestion of very large JSON documents into a record store.
//!
//! This crate handles:
//! - Decoding a top-level JSON array (or JSON Lines) incrementally, optionally
//!   gzip or zstd compressed
//! - Writing each record to a sink with bounded concurrency and per-record
//!   fault isolation
//! - Classifying every write as created, duplicate or failed and counting it
//! - Running the whole flow as a small state machine that always closes the
//!   sink connection and always ends in a summary or a single fatal error
//! - Dead letter queue for failed records

pub mod accounting;
pub mod config;
pub mod dlq;
pub mod error;
pub mod job;
pub mod pool;
pub mod record;
pub mod report;
pub mod runner;
pub mod sink;
pub mod source;

// Re-export commonly used items
pub use accounting::{RunAccounting, RunSummary};
pub use config::{Config, JobKey};
pub use error::{AbortReason, RunAborted};
pub use job::IngestJob;
pub use pool::{DispatchPool, PoolConfig, PoolExit, RecordWriter};
pub use record::{FailureKind, Record, Target, WriteOutcome};
pub use runner::{IngestionRunner, RunReport, RunSettings, RunState};

pub use floe_core::{Application, init_tracing, shutdown_signal};
