//! Remote relational connection.

use crate::backend::pg::PostgresBackend;
use crate::backend::sqlite::SqliteBackend;
use crate::backend::{
    BackendConnection, BackendKind, BackendResult, ConnectionSlot, ConnectionState, SqlBackend,
    SqlDialect,
};
use crate::db::open_db;
use crate::model::value::RowSet;
use log::{error, info};
use postgres::error::SqlState;
use postgres::{Config, NoTls};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Remote open failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    MalformedConnectionString(String),
    AuthenticationFailed(String),
    Unreachable(String),
}

impl Display for ConnectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedConnectionString(message) => {
                write!(f, "connection string is malformed: {message}")
            }
            Self::AuthenticationFailed(message) => {
                write!(f, "remote authentication failed: {message}")
            }
            Self::Unreachable(message) => write!(f, "remote host is unreachable: {message}"),
        }
    }
}

impl Error for ConnectError {}

/// Opens remote sessions from a verbatim connection string.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn SqlBackend>, ConnectError>;
}

/// Default connector for PostgreSQL servers (no TLS).
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

impl RemoteConnector for PostgresConnector {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn SqlBackend>, ConnectError> {
        let config = connection_string
            .parse::<Config>()
            .map_err(|err| ConnectError::MalformedConnectionString(err.to_string()))?;
        let client = config.connect(NoTls).map_err(|err| {
            let auth_failure = matches!(
                err.code(),
                Some(code)
                    if *code == SqlState::INVALID_PASSWORD
                        || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
            );
            if auth_failure {
                ConnectError::AuthenticationFailed(err.to_string())
            } else {
                ConnectError::Unreachable(err.to_string())
            }
        })?;
        Ok(Box::new(PostgresBackend::new(client)))
    }
}

/// Connector that treats the connection string as an SQLite file path.
///
/// Used for development setups and tests where no PostgreSQL server is
/// available; the file must already exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl RemoteConnector for SqliteConnector {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn SqlBackend>, ConnectError> {
        let path = connection_string.trim();
        if path.is_empty() {
            return Err(ConnectError::MalformedConnectionString(
                "sqlite path cannot be empty".to_string(),
            ));
        }
        let conn = open_db(path).map_err(|err| ConnectError::Unreachable(err.to_string()))?;
        Ok(Box::new(SqliteBackend::new(conn)))
    }
}

/// Owner of the single remote session.
pub struct RemoteConnection {
    connector: Box<dyn RemoteConnector>,
    slot: ConnectionSlot,
}

impl RemoteConnection {
    pub fn new(connector: Box<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            slot: ConnectionSlot::new(BackendKind::Remote),
        }
    }

    /// Replaces any existing session with a new one.
    ///
    /// # Errors
    /// - Returns `ConnectError` and leaves the connection `Closed` when the
    ///   string is malformed, the host is unreachable, or auth fails.
    pub fn open(&self, connection_string: &str) -> Result<(), ConnectError> {
        let started_at = Instant::now();
        let result = self
            .slot
            .replace_with(|| self.connector.connect(connection_string));
        match &result {
            Ok(()) => info!(
                "event=remote_open module=store status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=remote_open module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

impl BackendConnection for RemoteConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn state(&self) -> ConnectionState {
        self.slot.state()
    }

    fn execute(&self, command: &str) -> BackendResult<()> {
        self.slot.execute(command)
    }

    fn query(&self, text: &str) -> BackendResult<RowSet> {
        self.slot.query(text)
    }

    fn dialect(&self) -> BackendResult<SqlDialect> {
        self.slot.dialect()
    }

    fn close(&self) {
        self.slot.close();
    }
}
