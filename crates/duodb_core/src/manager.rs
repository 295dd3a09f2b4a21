//! Caller-facing database manager.
//!
//! # Responsibility
//! - Own both backend connections, the policy, the connectivity monitor and
//!   the sync engine for one caller-held instance.
//! - Expose the command/query surface in backend-named form.
//!
//! # Invariants
//! - Construction opens both backends or fails as a unit.
//! - There is no process-wide instance; callers own and pass the manager.
//! - Dropping the manager closes both handles.

use crate::backend::{BackendConnection, BackendKind, ConnectionState};
use crate::connectivity::{ConnectivityMonitor, ProbeTask, ReachabilityProbe, TcpProbe};
use crate::model::value::RowSet;
use crate::policy::{ModeController, PolicyState};
use crate::router::{OperationResult, QueryRouter};
use crate::store::{
    ConnectError, DirectoryResolver, LocalOpenError, LocalStore, PathResolver, PostgresConnector,
    RemoteConnection, RemoteConnector,
};
use crate::sync::{
    record_write, SyncCancelToken, SyncDirection, SyncEngine, SyncError, SyncOperation, SyncPhase,
    SyncRecord, SyncReport, SyncTable,
};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Construction failure; no instance exists afterwards.
#[derive(Debug)]
pub enum InitError {
    Remote(ConnectError),
    Local(LocalOpenError),
}

impl Display for InitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(err) => write!(f, "remote init failed: {err}"),
            Self::Local(err) => write!(f, "local init failed: {err}"),
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Local(err) => Some(err),
        }
    }
}

impl From<ConnectError> for InitError {
    fn from(value: ConnectError) -> Self {
        Self::Remote(value)
    }
}

impl From<LocalOpenError> for InitError {
    fn from(value: LocalOpenError) -> Self {
        Self::Local(value)
    }
}

/// Injected collaborators for a manager.
pub struct ManagerParts {
    pub remote_connector: Box<dyn RemoteConnector>,
    pub path_resolver: Box<dyn PathResolver>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub policy: PolicyState,
    pub sync_tables: Vec<SyncTable>,
}

impl ManagerParts {
    /// PostgreSQL connector, environment directories, TCP probe against the
    /// connection string's host, default policy, no synced tables.
    pub fn defaults_for(connection_string: &str) -> Self {
        Self {
            remote_connector: Box::new(PostgresConnector),
            path_resolver: Box::new(DirectoryResolver::from_env()),
            probe: Arc::new(TcpProbe::for_connection_string(connection_string)),
            policy: PolicyState::default(),
            sync_tables: Vec::new(),
        }
    }
}

/// Row change reported alongside a tracked write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedChange {
    pub table: String,
    pub primary_key: String,
    pub operation: SyncOperation,
}

impl TrackedChange {
    pub fn new(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        operation: SyncOperation,
    ) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            operation,
        }
    }
}

/// Single access point for the local and remote stores.
pub struct DatabaseManager {
    policy: Arc<ModeController>,
    remote: Arc<RemoteConnection>,
    local: Arc<LocalStore>,
    router: Arc<QueryRouter>,
    monitor: ConnectivityMonitor,
    sync: SyncEngine,
}

impl DatabaseManager {
    /// Opens PostgreSQL from `connection_string` and the local database
    /// named `local_database_name` with default collaborators.
    pub fn new(connection_string: &str, local_database_name: &str) -> Result<Self, InitError> {
        Self::with_parts(
            connection_string,
            local_database_name,
            ManagerParts::defaults_for(connection_string),
        )
    }

    /// Opens both backends using injected collaborators.
    ///
    /// # Errors
    /// - `InitError::Remote` / `InitError::Local`; a remote handle opened
    ///   before a local failure is closed again.
    pub fn with_parts(
        connection_string: &str,
        local_database_name: &str,
        parts: ManagerParts,
    ) -> Result<Self, InitError> {
        let policy = Arc::new(ModeController::new(parts.policy));
        let remote = Arc::new(RemoteConnection::new(parts.remote_connector));
        let local = Arc::new(LocalStore::new(parts.path_resolver));

        remote.open(connection_string)?;
        if let Err(err) = local.open(local_database_name) {
            remote.close();
            return Err(err.into());
        }

        let router = Arc::new(QueryRouter::new(
            Arc::clone(&policy),
            Arc::clone(&remote) as Arc<dyn BackendConnection>,
            Arc::clone(&local) as Arc<dyn BackendConnection>,
        ));
        let monitor = ConnectivityMonitor::new(parts.probe, Arc::clone(&policy));
        let sync = SyncEngine::new(Arc::clone(&router), parts.sync_tables);

        info!("event=manager_init module=manager status=ok");
        Ok(Self {
            policy,
            remote,
            local,
            router,
            monitor,
            sync,
        })
    }

    /// Opens the remote session; later rechecks probe its endpoint.
    pub fn open_remote(&self, connection_string: &str) -> Result<(), ConnectError> {
        self.remote.open(connection_string)?;
        self.monitor.retarget(connection_string);
        info!("event=reachability_target module=manager status=ok");
        Ok(())
    }

    pub fn open_local(&self, database_name: &str) -> Result<(), LocalOpenError> {
        self.local.open(database_name)
    }

    pub fn send_to_remote(&self, command: &str) -> OperationResult<()> {
        self.router.send(command, BackendKind::Remote)
    }

    pub fn send_to_local(&self, command: &str) -> OperationResult<()> {
        self.router.send(command, BackendKind::Local)
    }

    pub fn fetch_from_remote(&self, query: &str) -> OperationResult<RowSet> {
        self.router.fetch(query, BackendKind::Remote)
    }

    pub fn fetch_from_local(&self, query: &str) -> OperationResult<RowSet> {
        self.router.fetch(query, BackendKind::Local)
    }

    /// Runs `command` and journals the row change for later sync passes.
    pub fn send_tracked(
        &self,
        backend: BackendKind,
        command: &str,
        change: &TrackedChange,
    ) -> OperationResult<SyncRecord> {
        self.router.send(command, backend)?;
        record_write(
            &self.router,
            backend,
            &change.table,
            &change.primary_key,
            change.operation,
        )
    }

    /// Starts a background reachability probe and returns immediately.
    pub fn recheck_connectivity(&self) -> ProbeTask {
        self.monitor.recheck()
    }

    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        self.sync.run(SyncDirection::Both)
    }

    pub fn sync_remote_to_local(&self) -> Result<SyncReport, SyncError> {
        self.sync.run(SyncDirection::RemoteToLocal)
    }

    pub fn sync_local_to_remote(&self) -> Result<SyncReport, SyncError> {
        self.sync.run(SyncDirection::LocalToRemote)
    }

    pub fn sync_phase(&self) -> SyncPhase {
        self.sync.phase()
    }

    pub fn sync_cancel_token(&self) -> SyncCancelToken {
        self.sync.cancel_token()
    }

    pub fn policy(&self) -> PolicyState {
        self.policy.snapshot()
    }

    pub fn set_policy(&self, policy: PolicyState) {
        self.policy.replace(policy);
    }

    /// Shared mode controller for flag setters.
    pub fn mode(&self) -> &ModeController {
        &self.policy
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn remote_state(&self) -> ConnectionState {
        self.remote.state()
    }

    pub fn local_state(&self) -> ConnectionState {
        self.local.state()
    }

    pub fn close_remote(&self) {
        self.remote.close();
    }

    pub fn close_local(&self) {
        self.local.close();
    }

    /// Releases both handles; safe to call repeatedly.
    pub fn quit(&self) {
        self.remote.close();
        self.local.close();
    }
}

impl Drop for DatabaseManager {
    fn drop(&mut self) {
        self.quit();
    }
}
