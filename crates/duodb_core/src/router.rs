//! Backend-agnostic command/query routing.
//!
//! # Responsibility
//! - Check policy before touching a backend.
//! - Delegate to the connection registered for the target kind.
//! - Emit diagnostics gated by the verbosity flags.
//!
//! # Invariants
//! - A denied operation never reaches the backend.
//! - Statements are not classified; a `SELECT` sent as a command or an
//!   `INSERT` fetched as a query runs as given.
//! - Zero matching rows is an empty `RowSet`, never an error.

use crate::backend::{BackendConnection, BackendError, BackendKind, SqlDialect};
use crate::model::value::RowSet;
use crate::policy::{ModeController, Operation, PolicyFlag};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type OperationResult<T> = Result<T, OperationError>;

/// Router-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    WriteBlocked {
        backend: BackendKind,
        flag: PolicyFlag,
    },
    ReadBlocked {
        backend: BackendKind,
        flag: PolicyFlag,
    },
    Backend(BackendError),
}

impl OperationError {
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::Backend(BackendError::NotConnected(_)))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::WriteBlocked { .. } | Self::ReadBlocked { .. })
    }
}

impl Display for OperationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WriteBlocked { backend, flag } => {
                write!(f, "write to {backend} backend blocked by {flag}")
            }
            Self::ReadBlocked { backend, flag } => {
                write!(f, "read from {backend} backend blocked by {flag}")
            }
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OperationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for OperationError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

/// Routes commands and queries to the backend named by the caller.
pub struct QueryRouter {
    policy: Arc<ModeController>,
    remote: Arc<dyn BackendConnection>,
    local: Arc<dyn BackendConnection>,
}

impl QueryRouter {
    pub fn new(
        policy: Arc<ModeController>,
        remote: Arc<dyn BackendConnection>,
        local: Arc<dyn BackendConnection>,
    ) -> Self {
        Self {
            policy,
            remote,
            local,
        }
    }

    pub fn policy(&self) -> &ModeController {
        &self.policy
    }

    pub fn connection(&self, backend: BackendKind) -> &dyn BackendConnection {
        match backend {
            BackendKind::Remote => self.remote.as_ref(),
            BackendKind::Local => self.local.as_ref(),
        }
    }

    /// Runs a mutating command against `backend`.
    ///
    /// # Errors
    /// - `WriteBlocked` with the blocking flag, without contacting the backend.
    /// - `Backend(NotConnected)` / `Backend(Query)` from the backend itself.
    pub fn send(&self, command: &str, backend: BackendKind) -> OperationResult<()> {
        if let Some(flag) = self.policy.check(Operation::Write, backend) {
            let err = OperationError::WriteBlocked { backend, flag };
            self.report_failure("send", backend, &err);
            return Err(err);
        }

        let started_at = Instant::now();
        match self.connection(backend).execute(command) {
            Ok(()) => {
                if self.policy.snapshot().very_verbose {
                    info!(
                        "event=send module=router status=ok backend={} duration_ms={}",
                        backend,
                        started_at.elapsed().as_millis()
                    );
                }
                Ok(())
            }
            Err(err) => {
                let err = OperationError::from(err);
                self.report_failure("send", backend, &err);
                Err(err)
            }
        }
    }

    /// Runs a read query against `backend` and returns the normalized rows.
    ///
    /// # Errors
    /// - `ReadBlocked` with the blocking flag, without contacting the backend.
    /// - `Backend(NotConnected)` / `Backend(Query)` from the backend itself.
    pub fn fetch(&self, query: &str, backend: BackendKind) -> OperationResult<RowSet> {
        if let Some(flag) = self.policy.check(Operation::Read, backend) {
            let err = OperationError::ReadBlocked { backend, flag };
            self.report_failure("fetch", backend, &err);
            return Err(err);
        }

        let started_at = Instant::now();
        match self.connection(backend).query(query) {
            Ok(rows) => {
                if self.policy.snapshot().very_verbose {
                    info!(
                        "event=fetch module=router status=ok backend={} rows={} duration_ms={}",
                        backend,
                        rows.len(),
                        started_at.elapsed().as_millis()
                    );
                }
                Ok(rows)
            }
            Err(err) => {
                let err = OperationError::from(err);
                self.report_failure("fetch", backend, &err);
                Err(err)
            }
        }
    }

    /// SQL dialect of the handle currently open for `backend`.
    pub fn dialect(&self, backend: BackendKind) -> OperationResult<SqlDialect> {
        Ok(self.connection(backend).dialect()?)
    }

    fn report_failure(&self, event: &str, backend: BackendKind, err: &OperationError) {
        let state = self.policy.snapshot();
        if state.verbose || state.very_verbose {
            warn!(
                "event={} module=router status=error backend={} error={}",
                event, backend, err
            );
        }
    }
}
