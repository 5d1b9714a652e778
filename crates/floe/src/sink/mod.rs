//! Sink side of a run.
//!
//! - `traits`: the `SinkConnector` / `SinkConnection` contract and credentials
//! - `classify`: raw sink results to `WriteOutcome`
//! - `session`: the worker write path under either connection strategy
//! - `memory`: in-process store for dry runs and tests
//! - `http`: SurrealDB-style HTTP client

mod classify;
mod http;
mod memory;
mod session;
mod traits;

pub use classify::{classify, is_conflict_message, write_error};
pub use http::{HttpConnector, http_base_url};
pub use memory::{MemoryConnector, MemoryStore};
pub use session::{ConnectionStrategy, PerRecordSetup, SinkSession};
pub use traits::{Credentials, SinkConnection, SinkConnector};

use std::sync::Arc;
use std::time::Duration;

use crate::error::SinkError;

/// Pick a connector by address scheme.
///
/// `memory://` gets a fresh in-process store; `ws`, `wss`, `http` and
/// `https` get the HTTP client.
pub fn connector_for(
    address: &str,
    request_timeout: Duration,
) -> Result<Arc<dyn SinkConnector>, SinkError> {
    let scheme = address
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase());

    match scheme.as_deref() {
        Some("memory") => Ok(Arc::new(MemoryConnector::new(MemoryStore::new()))),
        Some("ws" | "wss" | "http" | "https") => {
            Ok(Arc::new(HttpConnector::new(request_timeout)?))
        }
        _ => Err(SinkError::UnsupportedAddress {
            address: address.to_string(),
        }),
    }
}
