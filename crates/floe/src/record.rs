//! Records, targets and per-record write outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded record: a JSON object eligible for writing.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Accept only JSON objects. Any other value is handed back unchanged.
    pub fn try_from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    /// The explicit record identity, if the record carries an `id` field.
    pub fn id(&self) -> Option<&Value> {
        self.0.get("id").filter(|v| !v.is_null())
    }

    /// The id as a key within `table`, without a `table:` prefix.
    pub fn id_key(&self, table: &str) -> Option<String> {
        let raw = match self.id()? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match raw.split_once(':') {
            Some((prefix, rest)) if prefix == table => Some(rest.to_string()),
            _ => Some(raw),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// An array element together with its zero-based position in the input.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub index: u64,
    pub value: Value,
}

/// Where records are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub namespace: String,
    pub database: String,
    pub table: String,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.database, self.table)
    }
}

/// Why a single record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The element was not a JSON object; the sink was never contacted.
    NotAMapping,
    /// The sink accepted the call but returned nothing.
    NotConfirmed,
    /// The sink refused the record.
    Rejected,
    /// The request did not complete.
    Transport,
    /// The per-record timeout elapsed.
    Timeout,
    /// A per-record connection could not be set up.
    Connect,
    /// The write task panicked.
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotAMapping => "not_a_mapping",
            FailureKind::NotConfirmed => "not_confirmed",
            FailureKind::Rejected => "rejected",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Connect => "connect",
            FailureKind::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl WriteFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of one write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Duplicate,
    Failed(WriteFailure),
}

impl WriteOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        WriteOutcome::Failed(WriteFailure::new(kind, message))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_accepts_objects_only() {
        assert!(Record::try_from_value(json!({"a": 1})).is_ok());

        let rejected = Record::try_from_value(json!("not-a-mapping")).unwrap_err();
        assert_eq!(rejected, json!("not-a-mapping"));
        assert!(Record::try_from_value(json!([1, 2])).is_err());
        assert!(Record::try_from_value(Value::Null).is_err());
    }

    #[test]
    fn test_record_id() {
        let record = Record::try_from_value(json!({"id": "paper:1", "title": "x"})).unwrap();
        assert_eq!(record.id(), Some(&json!("paper:1")));

        let record = Record::try_from_value(json!({"id": null})).unwrap();
        assert_eq!(record.id(), None);

        let record = Record::try_from_value(json!({"title": "x"})).unwrap();
        assert_eq!(record.id(), None);
    }

    #[test]
    fn test_id_key() {
        let record = Record::try_from_value(json!({"id": "papers:abc"})).unwrap();
        assert_eq!(record.id_key("papers").as_deref(), Some("abc"));
        assert_eq!(record.id_key("other").as_deref(), Some("papers:abc"));

        let record = Record::try_from_value(json!({"id": 42})).unwrap();
        assert_eq!(record.id_key("papers").as_deref(), Some("42"));

        let record = Record::try_from_value(json!({})).unwrap();
        assert_eq!(record.id_key("papers"), None);
    }

    #[test]
    fn test_record_serializes_as_object() {
        let record = Record::try_from_value(json!({"a": 1})).unwrap();
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_failure_kind_labels() {
        assert_eq!(FailureKind::NotAMapping.as_str(), "not_a_mapping");
        assert_eq!(
            serde_json::to_string(&FailureKind::Panicked).unwrap(),
            r#""panicked""#
        );
    }
}
