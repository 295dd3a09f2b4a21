//! Shared holder of the current policy value.

use super::state::{Operation, PolicyFlag, PolicyState};
use crate::backend::BackendKind;
use log::info;
use std::sync::{PoisonError, RwLock};

/// Single source of truth for "is this operation permitted right now".
#[derive(Debug, Default)]
pub struct ModeController {
    state: RwLock<PolicyState>,
}

impl ModeController {
    pub fn new(initial: PolicyState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Returns the current policy value.
    pub fn snapshot(&self) -> PolicyState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in a whole new policy value.
    pub fn replace(&self, next: PolicyState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Derives and swaps in a new value under one write lock.
    pub fn update(&self, change: impl FnOnce(PolicyState) -> PolicyState) -> PolicyState {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = change(*guard);
        *guard
    }

    pub fn set_offline_mode(&self, offline_mode: bool) {
        let mut previous = offline_mode;
        let next = self.update(|state| {
            previous = state.offline_mode;
            state.with_offline_mode(offline_mode)
        });
        if previous != offline_mode && (next.verbose || next.very_verbose) {
            info!(
                "event=mode_change module=policy status=ok offline_mode={}",
                offline_mode
            );
        }
    }

    pub fn set_prevent_write_to_remote(&self, prevent: bool) {
        self.update(|state| state.with_prevent_write_to_remote(prevent));
    }

    pub fn set_prevent_write_to_local(&self, prevent: bool) {
        self.update(|state| state.with_prevent_write_to_local(prevent));
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.update(|state| state.with_verbose(verbose));
    }

    pub fn set_very_verbose(&self, very_verbose: bool) {
        self.update(|state| state.with_very_verbose(very_verbose));
    }

    pub fn permits(&self, operation: Operation, backend: BackendKind) -> bool {
        self.check(operation, backend).is_none()
    }

    /// Evaluates one decision against a single snapshot and returns the
    /// blocking flag, if any.
    ///
    /// # Side effects
    /// - Logs every decision when `very_verbose` is set.
    pub fn check(&self, operation: Operation, backend: BackendKind) -> Option<PolicyFlag> {
        let state = self.snapshot();
        let denial = state.denial(operation, backend);
        if state.very_verbose {
            match denial {
                Some(flag) => info!(
                    "event=permission module=policy status=denied operation={} backend={} flag={}",
                    operation.as_str(),
                    backend,
                    flag
                ),
                None => info!(
                    "event=permission module=policy status=allowed operation={} backend={}",
                    operation.as_str(),
                    backend
                ),
            }
        }
        denial
    }
}
