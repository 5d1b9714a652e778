//! SurrealDB-style HTTP sink.
//!
//! Endpoints used: `GET /health`, `POST /signin`, `POST /sql` and
//! `POST /key/{table}[/{id}]`. Namespace and database travel as
//! `surreal-ns` / `surreal-db` headers on every request after selection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use snafu::ResultExt;
use tracing::debug;
use url::Url;

use super::classify::write_error;
use super::traits::{Credentials, SinkConnection, SinkConnector};
use crate::error::{InvalidAddressSnafu, SinkError, WriteErrorKind};
use crate::record::{Record, Target};

const NS_HEADER: &str = "surreal-ns";
const DB_HEADER: &str = "surreal-db";

/// Turn a sink address into the HTTP base URL.
///
/// `ws://` and `wss://` map to `http://` and `https://`; a trailing `/rpc`
/// path is dropped.
pub fn http_base_url(address: &str) -> Result<Url, SinkError> {
    let mut url = Url::parse(address).context(InvalidAddressSnafu { address })?;

    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => {
            return Err(SinkError::UnsupportedAddress {
                address: address.to_string(),
            });
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| SinkError::UnsupportedAddress {
            address: address.to_string(),
        })?;

    let path = url.path().trim_end_matches('/');
    let path = path.strip_suffix("/rpc").unwrap_or(path).to_string();
    url.set_path(&format!("{path}/"));
    Ok(url)
}

/// Connector for HTTP sinks.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new(request_timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SinkError::Connect {
                address: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SinkConnector for HttpConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn SinkConnection>, SinkError> {
        let base = http_base_url(address)?;
        let connect_error = |message: String| SinkError::Connect {
            address: address.to_string(),
            message,
        };

        let health = base
            .join("health")
            .map_err(|e| connect_error(e.to_string()))?;
        let response = self
            .client
            .get(health)
            .send()
            .await
            .map_err(|e| connect_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(connect_error(format!(
                "health check returned {}",
                response.status()
            )));
        }

        debug!(%base, "Connected to sink");
        Ok(Box::new(HttpConnection {
            client: self.client.clone(),
            base,
            token: None,
            target: None,
            closed: AtomicBool::new(false),
        }))
    }
}

struct HttpConnection {
    client: Client,
    base: Url,
    token: Option<String>,
    target: Option<(String, String)>,
    closed: AtomicBool,
}

#[derive(Deserialize)]
struct SigninResponse {
    token: Option<String>,
}

/// One statement result in a `/sql` or `/key` response.
#[derive(Deserialize)]
struct StatementResult {
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    detail: Option<String>,
}

impl HttpConnection {
    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base.join(path).map_err(|e| e.to_string())
    }

    fn key_url(&self, table: &str, id: Option<String>) -> Result<Url, SinkError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| SinkError::Write {
                kind: WriteErrorKind::Transport,
                message: format!("{} cannot be a base URL", self.base),
            })?;
            segments.pop_if_empty().push("key").push(table);
            if let Some(id) = id {
                segments.push(&id);
            }
        }
        Ok(url)
    }

    fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some((ns, db)) = &self.target {
            request = request.header(NS_HEADER, ns).header(DB_HEADER, db);
        }
        request
    }
}

#[async_trait]
impl SinkConnection for HttpConnection {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SinkError> {
        let auth_error = |message: String| SinkError::Authenticate { message };

        let (username, password) = match credentials {
            Credentials::Token { token } => {
                self.token = Some(token.clone());
                return Ok(());
            }
            Credentials::Basic { username, password } => (username, password),
        };

        let url = self.endpoint("signin").map_err(auth_error)?;
        let response = self
            .decorate(self.client.post(url))
            .json(&json!({ "user": username, "pass": password }))
            .send()
            .await
            .map_err(|e| auth_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_error(format!("{status}: {body}")));
        }

        let body: SigninResponse = response
            .json()
            .await
            .map_err(|e| auth_error(format!("unreadable signin response: {e}")))?;
        self.token = body.token;
        Ok(())
    }

    async fn select_target(&mut self, target: &Target) -> Result<(), SinkError> {
        let target_error = |message: String| SinkError::SelectTarget {
            namespace: target.namespace.clone(),
            database: target.database.clone(),
            message,
        };

        self.target = Some((target.namespace.clone(), target.database.clone()));

        let url = self.endpoint("sql").map_err(target_error)?;
        let response = self
            .decorate(self.client.post(url))
            .body("INFO FOR DB;")
            .send()
            .await
            .map_err(|e| target_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(target_error(format!("{status}: {body}")));
        }

        let results: Vec<StatementResult> = response
            .json()
            .await
            .map_err(|e| target_error(format!("unreadable response: {e}")))?;
        match results.into_iter().find(|r| r.status != "OK") {
            Some(failed) => Err(target_error(failed.detail.unwrap_or(failed.status))),
            None => Ok(()),
        }
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<Value>, SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        let url = self.key_url(table, record.id_key(table))?;
        let mut body = record.fields().clone();
        if record.id().is_some() {
            body.remove("id");
        }

        let response = self
            .decorate(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Write {
                kind: WriteErrorKind::Transport,
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| SinkError::Write {
            kind: WriteErrorKind::Transport,
            message: e.to_string(),
        })?;

        if status == StatusCode::CONFLICT {
            return Err(SinkError::Write {
                kind: WriteErrorKind::Conflict,
                message: text,
            });
        }
        if !status.is_success() {
            return Err(write_error(
                WriteErrorKind::Rejected,
                format!("{status}: {text}"),
            ));
        }

        parse_create_response(&text)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(base = %self.base, "Closed sink connection");
        }
    }
}

/// Interpret a successful `/key` response body.
fn parse_create_response(text: &str) -> Result<Option<Value>, SinkError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(text).map_err(|e| SinkError::Write {
        kind: WriteErrorKind::Transport,
        message: format!("unreadable response: {e}"),
    })?;

    let Ok(statements) = serde_json::from_value::<Vec<StatementResult>>(value.clone()) else {
        return Ok(Some(value));
    };

    let mut created = None;
    for statement in statements {
        if statement.status != "OK" {
            let detail = statement.detail.unwrap_or(statement.status);
            return Err(write_error(WriteErrorKind::Rejected, detail));
        }
        created = statement.result;
    }
    Ok(created)
}
