//! Core of DuoDB: one access point for a local SQLite store and a remote
//! PostgreSQL database.
//!
//! Callers hold a [`DatabaseManager`], which routes every command and query
//! through the policy flags, tracks connectivity in the background, and
//! reconciles both stores on demand.

pub mod backend;
pub mod connectivity;
pub mod db;
pub mod logging;
pub mod manager;
pub mod model;
pub mod policy;
pub mod router;
pub mod store;
pub mod sync;

pub use backend::{BackendConnection, BackendError, BackendKind, ConnectionState, SqlDialect};
pub use connectivity::{ConnectivityMonitor, ProbeTask, ReachabilityProbe, TcpProbe};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use manager::{DatabaseManager, InitError, ManagerParts, TrackedChange};
pub use model::value::{Row, RowSet, Value};
pub use policy::{ModeController, Operation, PolicyFlag, PolicyState};
pub use router::{OperationError, OperationResult, QueryRouter};
pub use store::{
    ConnectError, DirectoryResolver, LocalOpenError, LocalStore, PathResolver, PostgresConnector,
    RemoteConnection, RemoteConnector, SqliteConnector,
};
pub use sync::{
    KeyKind, RowConflict, SyncCancelToken, SyncDirection, SyncEngine, SyncError, SyncOperation,
    SyncPhase, SyncRecord, SyncReport, SyncStatus, SyncTable,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
