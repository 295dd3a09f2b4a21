//! Backend capability contracts shared by the local and remote stores.
//!
//! # Responsibility
//! - Define the live-session trait implemented by SQLite and PostgreSQL.
//! - Define the connection-level trait the query router routes through.
//!
//! # Invariants
//! - Operations on a closed or broken handle fail with `NotConnected`.
//! - No backend ever reconnects implicitly.
//! - Statements are executed as given; nothing here classifies SQL.

use crate::model::value::RowSet;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dialect;
pub mod pg;
pub mod slot;
pub mod sqlite;

pub use dialect::SqlDialect;
pub use slot::ConnectionSlot;

/// Identity of one of the two managed backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Remote,
    Local,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Remote => Self::Local,
            Self::Local => Self::Remote,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "remote" => Some(Self::Remote),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
    Broken,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by an individual backend handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Operation attempted on a closed or broken handle.
    NotConnected(BackendKind),
    /// Backend rejected the statement.
    Query { backend: BackendKind, message: String },
}

impl BackendError {
    pub fn query(backend: BackendKind, err: impl Display) -> Self {
        Self::Query {
            backend,
            message: err.to_string(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self {
            Self::NotConnected(backend) => *backend,
            Self::Query { backend, .. } => *backend,
        }
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected(backend) => write!(f, "{backend} backend is not connected"),
            Self::Query { backend, message } => {
                write!(f, "{backend} backend rejected statement: {message}")
            }
        }
    }
}

impl Error for BackendError {}

/// One live session to a relational engine.
///
/// Implementations own their native handle; dropping the value releases it.
pub trait SqlBackend: Send {
    fn dialect(&self) -> SqlDialect;

    /// Runs a command (possibly several statements) and discards any rows.
    fn execute(&mut self, command: &str) -> Result<(), String>;

    /// Runs one statement and collects all rows positionally.
    fn query(&mut self, text: &str) -> Result<RowSet, String>;

    /// Reports whether the underlying session died on its own.
    fn is_broken(&self) -> bool {
        false
    }
}

/// Connection-level capability interface the query router routes through.
pub trait BackendConnection: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn state(&self) -> ConnectionState;
    fn execute(&self, command: &str) -> BackendResult<()>;
    fn query(&self, text: &str) -> BackendResult<RowSet>;
    fn dialect(&self) -> BackendResult<SqlDialect>;
    fn close(&self);
}
