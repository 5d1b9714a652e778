//! Identifier for floe jobs.

use floe_core::ComponentKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a job in floe configuration.
///
/// Wraps `ComponentKey`; the key is the job's name under `jobs:` and labels
/// its logs, metrics and DLQ files.
///
/// # Examples
///
/// ```
/// use floe::config::JobKey;
///
/// let key = JobKey::new("arxiv");
/// assert_eq!(key.id(), "arxiv");
/// assert_eq!(key.to_string(), "arxiv");
/// ```
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(ComponentKey);

impl JobKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(ComponentKey::new(id))
    }

    pub fn id(&self) -> &str {
        self.0.id()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JobKey {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}
