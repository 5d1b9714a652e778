//! The contract every sink implementation follows.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SinkError;
use crate::record::{Record, Target};

/// Opens connections to a sink.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    /// Establish transport-level connectivity. Never retried.
    async fn connect(&self, address: &str) -> Result<Box<dyn SinkConnection>, SinkError>;
}

/// One logical connection to a sink.
///
/// `authenticate` and `select_target` take `&mut self`, so they must finish
/// before the handle is shared. `create` takes `&self` and may be called from
/// many tasks at once through an `Arc`.
#[async_trait]
pub trait SinkConnection: Send + Sync {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SinkError>;

    async fn select_target(&mut self, target: &Target) -> Result<(), SinkError>;

    /// Create one record in `table`.
    ///
    /// `Ok(None)` means the sink answered without confirming a record.
    async fn create(&self, table: &str, record: &Record) -> Result<Option<Value>, SinkError>;

    /// Close the connection. Calling it again is a no-op.
    async fn close(&self);
}

/// Credentials presented to the sink.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case", deny_unknown_fields)]
pub enum Credentials {
    Basic { username: String, password: String },
    Token { token: String },
}

impl Credentials {
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::Basic { .. } => "basic",
            Credentials::Token { .. } => "token",
        }
    }
}

// Secrets stay out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Token { .. } => f.debug_struct("Token").field("token", &"***").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_from_yaml() {
        let basic: Credentials =
            serde_yaml::from_str("scheme: basic\nusername: root\npassword: secret").unwrap();
        assert_eq!(
            basic,
            Credentials::Basic {
                username: "root".to_string(),
                password: "secret".to_string(),
            }
        );

        let token: Credentials = serde_yaml::from_str("scheme: token\ntoken: abc").unwrap();
        assert_eq!(token.scheme(), "token");
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials::Basic {
            username: "root".to_string(),
            password: "secret".to_string(),
        };
        let text = format!("{creds:?}");
        assert!(text.contains("root"));
        assert!(!text.contains("secret"));
    }
}
