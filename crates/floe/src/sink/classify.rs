//! Mapping raw sink results onto write outcomes.

use serde_json::Value;

use crate::error::{SinkError, WriteErrorKind};
use crate::record::{FailureKind, WriteOutcome};

/// Text sinks use to report an identity conflict when they expose no
/// structured code for it.
const CONFLICT_TEXT: &str = "already exists";

/// Classify the result of one `create` call.
pub fn classify(result: Result<Option<Value>, SinkError>) -> WriteOutcome {
    match result {
        Ok(Some(value)) if is_confirmed(&value) => WriteOutcome::Created,
        Ok(_) => WriteOutcome::failed(
            FailureKind::NotConfirmed,
            "sink did not confirm the created record",
        ),
        Err(e) if e.is_conflict() => WriteOutcome::Duplicate,
        Err(e) => WriteOutcome::failed(failure_kind(&e), e.to_string()),
    }
}

/// Fallback conflict detection on error text.
pub fn is_conflict_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains(CONFLICT_TEXT)
}

/// Build a write error, promoting it to a conflict when the text says so.
pub fn write_error(kind: WriteErrorKind, message: impl Into<String>) -> SinkError {
    let message = message.into();
    let kind = if is_conflict_message(&message) {
        WriteErrorKind::Conflict
    } else {
        kind
    };
    SinkError::Write { kind, message }
}

fn is_confirmed(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Bool(true) | Value::Number(_) => true,
    }
}

fn failure_kind(err: &SinkError) -> FailureKind {
    match err {
        SinkError::Write {
            kind: WriteErrorKind::Rejected,
            ..
        } => FailureKind::Rejected,
        SinkError::Write { .. } | SinkError::Closed => FailureKind::Transport,
        SinkError::UnsupportedAddress { .. }
        | SinkError::InvalidAddress { .. }
        | SinkError::Connect { .. }
        | SinkError::Authenticate { .. }
        | SinkError::SelectTarget { .. } => FailureKind::Connect,
    }
}
