//! In-process sink used for `memory://` dry runs and tests.
//!
//! A `MemoryStore` outlives the connections made to it, so two runs against
//! clones of the same store see each other's records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde_json::Value;

use super::classify::write_error;
use super::traits::{Credentials, SinkConnection, SinkConnector};
use crate::error::{SinkError, WriteErrorKind};
use crate::record::{Record, Target};

#[derive(Debug, Default)]
struct StoreInner {
    /// Records keyed by `namespace/database/table`, then by id.
    tables: DashMap<String, DashMap<String, Value>>,
    users: DashMap<String, String>,
    tokens: DashSet<String>,
    /// Known `(namespace, database)` pairs. Empty means any pair is accepted.
    databases: DashSet<(String, String)>,
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Shared in-memory record store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require basic credentials. Without users or tokens any credentials pass.
    pub fn with_user(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.inner.users.insert(username.into(), password.into());
        self
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.inner.tokens.insert(token.into());
        self
    }

    /// Restrict target selection to known databases.
    pub fn with_database(self, namespace: impl Into<String>, database: impl Into<String>) -> Self {
        self.inner
            .databases
            .insert((namespace.into(), database.into()));
        self
    }

    /// Number of records stored in `target`.
    pub fn len(&self, target: &Target) -> usize {
        self.inner
            .tables
            .get(&table_key(&target.namespace, &target.database, &target.table))
            .map(|table| table.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, target: &Target) -> bool {
        self.len(target) == 0
    }

    pub fn get(&self, target: &Target, id: &str) -> Option<Value> {
        let table = self
            .inner
            .tables
            .get(&table_key(&target.namespace, &target.database, &target.table))?;
        table.get(id).map(|v| v.value().clone())
    }

    /// Connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Connections closed so far. Repeated closes of one handle count once.
    pub fn connections_closed(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn check_credentials(&self, credentials: &Credentials) -> Result<(), SinkError> {
        let inner = &self.inner;
        if inner.users.is_empty() && inner.tokens.is_empty() {
            return Ok(());
        }
        let accepted = match credentials {
            Credentials::Basic { username, password } => inner
                .users
                .get(username)
                .is_some_and(|expected| expected.value() == password),
            Credentials::Token { token } => inner.tokens.contains(token),
        };
        if accepted {
            Ok(())
        } else {
            Err(SinkError::Authenticate {
                message: "There was a problem with authentication".to_string(),
            })
        }
    }

    fn check_database(&self, target: &Target) -> Result<(), SinkError> {
        let databases = &self.inner.databases;
        let key = (target.namespace.clone(), target.database.clone());
        if databases.is_empty() || databases.contains(&key) {
            Ok(())
        } else {
            Err(SinkError::SelectTarget {
                namespace: target.namespace.clone(),
                database: target.database.clone(),
                message: "database does not exist".to_string(),
            })
        }
    }

    fn insert(
        &self,
        namespace: &str,
        database: &str,
        table: &str,
        record: &Record,
    ) -> Result<Value, SinkError> {
        let id = match record.id_key(table) {
            Some(id) => id,
            None => format!("{:020}", self.inner.next_id.fetch_add(1, Ordering::SeqCst)),
        };

        let rows = self
            .inner
            .tables
            .entry(table_key(namespace, database, table))
            .or_default();

        match rows.entry(id.clone()) {
            Entry::Occupied(_) => Err(write_error(
                WriteErrorKind::Rejected,
                format!("Database record `{table}:{id}` already exists"),
            )),
            Entry::Vacant(slot) => {
                let mut stored = record.fields().clone();
                stored.insert("id".to_string(), Value::String(format!("{table}:{id}")));
                let stored = Value::Object(stored);
                slot.insert(stored.clone());
                Ok(Value::Array(vec![stored]))
            }
        }
    }
}

fn table_key(namespace: &str, database: &str, table: &str) -> String {
    format!("{namespace}/{database}/{table}")
}

/// Connector for a `MemoryStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl SinkConnector for MemoryConnector {
    async fn connect(&self, _address: &str) -> Result<Box<dyn SinkConnection>, SinkError> {
        self.store.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            store: self.store.clone(),
            selected: None,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    store: MemoryStore,
    selected: Option<(String, String)>,
    closed: AtomicBool,
}

#[async_trait]
impl SinkConnection for MemoryConnection {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SinkError> {
        self.store.check_credentials(credentials)
    }

    async fn select_target(&mut self, target: &Target) -> Result<(), SinkError> {
        self.store.check_database(target)?;
        self.selected = Some((target.namespace.clone(), target.database.clone()));
        Ok(())
    }

    async fn create(&self, table: &str, record: &Record) -> Result<Option<Value>, SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        let Some((namespace, database)) = &self.selected else {
            return Err(SinkError::Write {
                kind: WriteErrorKind::Rejected,
                message: "Specify a namespace and database to use".to_string(),
            });
        };
        self.store
            .insert(namespace, database, table, record)
            .map(Some)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.store.inner.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
