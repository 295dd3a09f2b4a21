//! Single-handle holder with `Closed | Open | Broken` lifecycle.
//!
//! # Invariants
//! - At most one live handle per slot; installing a new handle drops the old
//!   one first.
//! - Access is serialized by one mutex, so one command runs at a time.
//! - A handle that reports itself broken after a failure is dropped and the
//!   slot stays `Broken` until the next explicit open.

use super::{BackendError, BackendKind, BackendResult, ConnectionState, SqlBackend, SqlDialect};
use crate::model::value::RowSet;
use log::{info, warn};
use std::sync::{Mutex, MutexGuard, PoisonError};

enum SlotState {
    Closed,
    Open(Box<dyn SqlBackend>),
    Broken,
}

/// Serialized owner of one backend handle.
pub struct ConnectionSlot {
    kind: BackendKind,
    state: Mutex<SlotState>,
}

impl ConnectionSlot {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            state: Mutex::new(SlotState::Closed),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Releases any current handle; the slot is `Closed` afterwards.
    pub fn close(&self) {
        let mut state = self.lock();
        let previous = std::mem::replace(&mut *state, SlotState::Closed);
        if matches!(previous, SlotState::Open(_)) {
            info!(
                "event=connection_close module=backend status=ok backend={}",
                self.kind
            );
        }
    }

    /// Closes the current handle, then opens a replacement with `open`.
    ///
    /// The previous handle is dropped before `open` runs, so a failed open
    /// leaves the slot `Closed`.
    pub fn replace_with<E>(
        &self,
        open: impl FnOnce() -> Result<Box<dyn SqlBackend>, E>,
    ) -> Result<(), E> {
        let mut state = self.lock();
        if matches!(
            std::mem::replace(&mut *state, SlotState::Closed),
            SlotState::Open(_)
        ) {
            info!(
                "event=connection_close module=backend status=ok backend={} reason=replace",
                self.kind
            );
        }
        let backend = open()?;
        *state = SlotState::Open(backend);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.lock() {
            SlotState::Closed => ConnectionState::Closed,
            SlotState::Open(_) => ConnectionState::Open,
            SlotState::Broken => ConnectionState::Broken,
        }
    }

    pub fn execute(&self, command: &str) -> BackendResult<()> {
        self.with_backend(|backend| backend.execute(command))
    }

    pub fn query(&self, text: &str) -> BackendResult<RowSet> {
        self.with_backend(|backend| backend.query(text))
    }

    pub fn dialect(&self) -> BackendResult<SqlDialect> {
        match &*self.lock() {
            SlotState::Open(backend) => Ok(backend.dialect()),
            _ => Err(BackendError::NotConnected(self.kind)),
        }
    }

    fn with_backend<T>(
        &self,
        op: impl FnOnce(&mut dyn SqlBackend) -> Result<T, String>,
    ) -> BackendResult<T> {
        let mut state = self.lock();
        let backend = match &mut *state {
            SlotState::Open(backend) => backend,
            SlotState::Closed | SlotState::Broken => {
                return Err(BackendError::NotConnected(self.kind))
            }
        };

        match op(backend.as_mut()) {
            Ok(value) => Ok(value),
            Err(message) => {
                if backend.is_broken() {
                    warn!(
                        "event=connection_broken module=backend status=error backend={}",
                        self.kind
                    );
                    *state = SlotState::Broken;
                }
                Err(BackendError::Query {
                    backend: self.kind,
                    message,
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
