//! Dead Letter Queue for failed records.
//!
//! Failed records are appended as NDJSON to a file under the configured
//! directory, for later inspection and reprocessing. The record bodies are
//! not copied; entries point back to the input by index.

mod queue;
mod types;

pub use queue::DeadLetterQueue;
pub use types::{FailedRecord, FailureStats};
