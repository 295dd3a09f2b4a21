//! Immutable policy value and the permission rule table.

use crate::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Kind of access an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Policy flag that caused a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyFlag {
    OfflineMode,
    PreventWriteToRemote,
    PreventWriteToLocal,
}

impl PolicyFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OfflineMode => "offline_mode",
            Self::PreventWriteToRemote => "prevent_write_to_remote",
            Self::PreventWriteToLocal => "prevent_write_to_local",
        }
    }
}

impl Display for PolicyFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every policy flag. All flags default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyState {
    pub offline_mode: bool,
    pub prevent_write_to_remote: bool,
    pub prevent_write_to_local: bool,
    pub verbose: bool,
    pub very_verbose: bool,
}

impl PolicyState {
    pub fn with_offline_mode(self, offline_mode: bool) -> Self {
        Self {
            offline_mode,
            ..self
        }
    }

    pub fn with_prevent_write_to_remote(self, prevent: bool) -> Self {
        Self {
            prevent_write_to_remote: prevent,
            ..self
        }
    }

    pub fn with_prevent_write_to_local(self, prevent: bool) -> Self {
        Self {
            prevent_write_to_local: prevent,
            ..self
        }
    }

    pub fn with_verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }

    pub fn with_very_verbose(self, very_verbose: bool) -> Self {
        Self {
            very_verbose,
            ..self
        }
    }

    /// Returns the flag that blocks `operation` on `backend`, if any.
    ///
    /// Offline mode is reported ahead of the remote write-protection flag.
    pub fn denial(&self, operation: Operation, backend: BackendKind) -> Option<PolicyFlag> {
        match (backend, operation) {
            (BackendKind::Remote, _) if self.offline_mode => Some(PolicyFlag::OfflineMode),
            (BackendKind::Remote, Operation::Write) if self.prevent_write_to_remote => {
                Some(PolicyFlag::PreventWriteToRemote)
            }
            (BackendKind::Local, Operation::Write) if self.prevent_write_to_local => {
                Some(PolicyFlag::PreventWriteToLocal)
            }
            _ => None,
        }
    }

    pub fn permits(&self, operation: Operation, backend: BackendKind) -> bool {
        self.denial(operation, backend).is_none()
    }
}
