//! Local embedded store and database-file resolution.
//!
//! # Responsibility
//! - Resolve a database name to a writable file, copying the bundled
//!   read-only copy into place once when needed.
//! - Own the single local SQLite session.
//!
//! # Invariants
//! - The bundled copy is never opened for writing.
//! - An existing writable copy is never overwritten by the bundle.

use crate::backend::sqlite::SqliteBackend;
use crate::backend::{
    BackendConnection, BackendKind, BackendResult, ConnectionSlot, ConnectionState, SqlBackend,
    SqlDialect,
};
use crate::db::{open_db, DbError};
use crate::model::value::RowSet;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const BUNDLE_DIR_ENV: &str = "DUODB_BUNDLE_DIR";
pub const DATA_DIR_ENV: &str = "DUODB_DATA_DIR";

/// Local open failures.
#[derive(Debug)]
pub enum LocalOpenError {
    FileNotFound(String),
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    EngineOpenFailed(DbError),
}

impl Display for LocalOpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(name) => write!(f, "local database not found: {name}"),
            Self::CopyFailed { from, to, source } => write!(
                f,
                "failed to copy bundled database `{}` to `{}`: {source}",
                from.display(),
                to.display()
            ),
            Self::EngineOpenFailed(err) => write!(f, "failed to open local database: {err}"),
        }
    }
}

impl Error for LocalOpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FileNotFound(_) => None,
            Self::CopyFailed { source, .. } => Some(source),
            Self::EngineOpenFailed(err) => Some(err),
        }
    }
}

/// Locates the read-only bundle and the writable data directory.
pub trait PathResolver: Send + Sync {
    /// Read-only directory shipped with the application, if any.
    fn bundle_dir(&self) -> Option<PathBuf>;

    /// Per-user directory the local database is opened from.
    fn writable_dir(&self) -> PathBuf;
}

/// Directory-pair resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryResolver {
    bundle_dir: Option<PathBuf>,
    writable_dir: PathBuf,
}

impl DirectoryResolver {
    pub fn new(bundle_dir: Option<PathBuf>, writable_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir,
            writable_dir: writable_dir.into(),
        }
    }

    /// Reads `DUODB_BUNDLE_DIR` / `DUODB_DATA_DIR`; the data directory falls
    /// back to the system temp directory.
    pub fn from_env() -> Self {
        let bundle_dir = non_empty_env(BUNDLE_DIR_ENV).map(PathBuf::from);
        let writable_dir = non_empty_env(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        Self::new(bundle_dir, writable_dir)
    }
}

impl PathResolver for DirectoryResolver {
    fn bundle_dir(&self) -> Option<PathBuf> {
        self.bundle_dir.clone()
    }

    fn writable_dir(&self) -> PathBuf {
        self.writable_dir.clone()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolves `database_name` to an openable writable path.
///
/// # Contract
/// - Existing writable copy wins.
/// - Otherwise the bundled copy is copied into the writable directory once.
/// - Neither present yields `FileNotFound`.
pub fn resolve_database_path(
    resolver: &dyn PathResolver,
    database_name: &str,
) -> Result<PathBuf, LocalOpenError> {
    let name = database_name.trim();
    if name.is_empty() {
        return Err(LocalOpenError::FileNotFound(String::new()));
    }

    let target = resolver.writable_dir().join(name);
    if target.is_file() {
        return Ok(target);
    }

    let bundled = resolver
        .bundle_dir()
        .map(|dir| dir.join(name))
        .filter(|path| path.is_file())
        .ok_or_else(|| LocalOpenError::FileNotFound(name.to_string()))?;

    copy_bundled(&bundled, &target)?;
    info!(
        "event=local_copy module=store status=ok from={} to={}",
        bundled.display(),
        target.display()
    );
    Ok(target)
}

fn copy_bundled(from: &Path, to: &Path) -> Result<(), LocalOpenError> {
    let copy_failed = |source| LocalOpenError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(copy_failed)?;
    }
    std::fs::copy(from, to).map_err(copy_failed)?;
    Ok(())
}

/// Owner of the single local SQLite session.
pub struct LocalStore {
    resolver: Box<dyn PathResolver>,
    slot: ConnectionSlot,
}

impl LocalStore {
    pub fn new(resolver: Box<dyn PathResolver>) -> Self {
        Self {
            resolver,
            slot: ConnectionSlot::new(BackendKind::Local),
        }
    }

    /// Replaces any open database with `database_name`.
    ///
    /// # Errors
    /// - `FileNotFound` when neither location holds the file.
    /// - `CopyFailed` when the one-time bundle copy fails.
    /// - `EngineOpenFailed` when SQLite or the journal migration fails.
    pub fn open(&self, database_name: &str) -> Result<(), LocalOpenError> {
        let result = self.slot.replace_with(|| {
            let path = resolve_database_path(self.resolver.as_ref(), database_name)?;
            let conn = open_db(&path).map_err(LocalOpenError::EngineOpenFailed)?;
            Ok::<Box<dyn SqlBackend>, LocalOpenError>(Box::new(SqliteBackend::new(conn)))
        });
        match &result {
            Ok(()) => info!("event=local_open module=store status=ok name={database_name}"),
            Err(err) => {
                error!("event=local_open module=store status=error name={database_name} error={err}")
            }
        }
        result
    }
}

impl BackendConnection for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
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
