//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the database manager to Dart via FRB as an opaque session.
//! - Flatten core results into simple envelopes the UI can render.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Row sets and policy cross the boundary as JSON strings.
//! - Backend names are `remote|local`.

use duodb_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    BackendKind, DatabaseManager, PolicyState, RowSet, SyncReport, SyncStatus, Value,
};
use log::{error, info};
use serde_json::{json, Map};

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Caller-held database session; one per opened manager.
#[flutter_rust_bridge::frb(opaque)]
pub struct DbSession {
    manager: DatabaseManager,
}

impl DbSession {
    fn from_manager(manager: DatabaseManager) -> Self {
        Self { manager }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl SessionActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Query response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRowsResponse {
    pub ok: bool,
    /// JSON array of rows; each row is an array of plain JSON values.
    pub rows_json: String,
    pub row_count: u32,
    pub message: String,
}

/// Sync pass response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSyncResponse {
    pub ok: bool,
    pub cancelled: bool,
    pub applied: u32,
    pub skipped: u32,
    pub failed: u32,
    pub conflicts: u32,
    pub message: String,
}

impl SessionSyncResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            cancelled: false,
            applied: 0,
            skipped: 0,
            failed: 0,
            conflicts: 0,
            message: message.into(),
        }
    }
}

/// Opens both backends and returns a session.
///
/// `connection_string` is passed verbatim to PostgreSQL; `local_database_name`
/// is resolved against `DUODB_DATA_DIR` / `DUODB_BUNDLE_DIR`.
///
/// # FFI contract
/// - Sync call; blocks for the remote connect.
/// - Never panics; failure surfaces as a Dart exception carrying the message.
#[flutter_rust_bridge::frb(sync)]
pub fn session_open(
    connection_string: String,
    local_database_name: String,
) -> Result<DbSession, String> {
    match DatabaseManager::new(connection_string.as_str(), local_database_name.trim()) {
        Ok(manager) => {
            info!("event=session_open module=ffi status=ok");
            Ok(DbSession::from_manager(manager))
        }
        Err(err) => {
            error!("event=session_open module=ffi status=error error={err}");
            Err(format!("session_open failed: {err}"))
        }
    }
}

/// Runs a command against `backend`.
#[flutter_rust_bridge::frb(sync)]
pub fn session_send(
    session: &DbSession,
    backend: String,
    command: String,
) -> SessionActionResponse {
    let kind = match parse_backend(&backend) {
        Ok(kind) => kind,
        Err(message) => return SessionActionResponse::failure(message),
    };
    match session.manager.router().send(&command, kind) {
        Ok(()) => SessionActionResponse::success("Command executed."),
        Err(err) => SessionActionResponse::failure(format!("session_send failed: {err}")),
    }
}

/// Runs a query against `backend` and returns its rows as JSON.
#[flutter_rust_bridge::frb(sync)]
pub fn session_fetch(session: &DbSession, backend: String, query: String) -> SessionRowsResponse {
    let failure = |message: String| SessionRowsResponse {
        ok: false,
        rows_json: "[]".to_string(),
        row_count: 0,
        message,
    };
    let kind = match parse_backend(&backend) {
        Ok(kind) => kind,
        Err(message) => return failure(message),
    };
    match session.manager.router().fetch(&query, kind) {
        Ok(rows) => {
            let row_count = u32::try_from(rows.len()).unwrap_or(u32::MAX);
            SessionRowsResponse {
                ok: true,
                rows_json: rows_to_json(&rows),
                row_count,
                message: format!("Fetched {} row(s).", rows.len()),
            }
        }
        Err(err) => failure(format!("session_fetch failed: {err}")),
    }
}

/// Probes remote reachability and updates offline mode.
///
/// With `wait = false` the probe runs in the background and the call returns
/// immediately.
#[flutter_rust_bridge::frb(sync)]
pub fn session_recheck_connectivity(session: &DbSession, wait: bool) -> SessionActionResponse {
    let task = session.manager.recheck_connectivity();
    if !wait {
        return SessionActionResponse::success("Reachability check started.");
    }
    match task.wait() {
        Some(true) => SessionActionResponse::success("Remote reachable."),
        Some(false) => SessionActionResponse::success("Remote unreachable; offline mode on."),
        None => SessionActionResponse::failure("Reachability check did not complete."),
    }
}

/// Replaces the policy flags from a JSON object; missing keys default to `false`.
#[flutter_rust_bridge::frb(sync)]
pub fn session_set_policy(session: &DbSession, policy_json: String) -> SessionActionResponse {
    match serde_json::from_str::<PolicyState>(&policy_json) {
        Ok(policy) => {
            session.manager.set_policy(policy);
            SessionActionResponse::success("Policy updated.")
        }
        Err(err) => SessionActionResponse::failure(format!("session_set_policy failed: {err}")),
    }
}

/// Current policy flags as a JSON object.
#[flutter_rust_bridge::frb(sync)]
pub fn session_policy(session: &DbSession) -> String {
    serde_json::to_string(&session.manager.policy()).unwrap_or_else(|_| "{}".to_string())
}

/// Runs one sync pass.
///
/// `direction`: `both|remote_to_local|local_to_remote`.
#[flutter_rust_bridge::frb(sync)]
pub fn session_sync(session: &DbSession, direction: String) -> SessionSyncResponse {
    let result = match direction.trim().to_ascii_lowercase().as_str() {
        "" | "both" => session.manager.sync(),
        "remote_to_local" => session.manager.sync_remote_to_local(),
        "local_to_remote" => session.manager.sync_local_to_remote(),
        other => {
            return SessionSyncResponse::failure(format!("unsupported sync direction `{other}`"))
        }
    };
    match result {
        Ok(report) => sync_response(&report),
        Err(err) => SessionSyncResponse::failure(format!("session_sync failed: {err}")),
    }
}

/// Closes both backends; the session stays usable after reopening.
#[flutter_rust_bridge::frb(sync)]
pub fn session_close(session: &DbSession) -> SessionActionResponse {
    session.manager.quit();
    info!("event=session_close module=ffi status=ok");
    SessionActionResponse::success("Session closed.")
}

fn parse_backend(raw: &str) -> Result<BackendKind, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    BackendKind::parse(&normalized).ok_or_else(|| format!("unsupported backend `{raw}`"))
}

fn sync_response(report: &SyncReport) -> SessionSyncResponse {
    let count = |value: usize| u32::try_from(value).unwrap_or(u32::MAX);
    let cancelled = report.status == SyncStatus::Cancelled;
    SessionSyncResponse {
        ok: true,
        cancelled,
        applied: count(report.applied),
        skipped: count(report.skipped),
        failed: count(report.failed),
        conflicts: count(report.conflicts.len()),
        message: format!(
            "Sync {}: {} applied, {} failed.",
            if cancelled { "cancelled" } else { "completed" },
            report.applied,
            report.failed
        ),
    }
}

fn rows_to_json(rows: &RowSet) -> String {
    let rows = rows
        .rows()
        .iter()
        .map(|row| row.iter().map(value_to_json).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    serde_json::Value::from(rows).to_string()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(value) => json!(value),
        Value::Real(value) => serde_json::Number::from_f64(*value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(value) => json!(value),
        Value::Blob(bytes) => {
            let mut blob = Map::new();
            blob.insert("blob".to_string(), json!(bytes));
            serde_json::Value::Object(blob)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ping, session_close, session_fetch, session_policy,
        session_recheck_connectivity, session_send, session_set_policy, session_sync,
        value_to_json, DbSession,
    };
    use duodb_core::{
        DatabaseManager, DirectoryResolver, KeyKind, ManagerParts, PolicyState,
        ReachabilityProbe, SqliteConnector, SyncTable, Value,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    const SCHEMA: &str = "CREATE TABLE notes(id INTEGER PRIMARY KEY, body TEXT);";

    fn session() -> (TempDir, DbSession) {
        let dir = tempfile::tempdir().expect("tempdir");
        // SQLite treats an empty file as an empty database.
        for name in ["local.db", "remote.db"] {
            std::fs::File::create(dir.path().join(name)).expect("create database file");
        }
        let probe: Arc<dyn ReachabilityProbe> = Arc::new(|| true);
        let parts = ManagerParts {
            remote_connector: Box::new(SqliteConnector),
            path_resolver: Box::new(DirectoryResolver::new(None, dir.path())),
            probe,
            policy: PolicyState::default(),
            sync_tables: vec![SyncTable::new("notes", "id", KeyKind::Integer, ["body"])],
        };
        let remote = dir.path().join("remote.db").display().to_string();
        let manager =
            DatabaseManager::with_parts(&remote, "local.db", parts).expect("open manager");
        (dir, DbSession::from_manager(manager))
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn send_then_fetch_returns_plain_json_rows() {
        let (_dir, session) = session();
        for backend in ["local", "REMOTE"] {
            let created = session_send(&session, backend.to_string(), SCHEMA.to_string());
            assert!(created.ok, "{}", created.message);
        }
        let inserted = session_send(
            &session,
            "local".to_string(),
            "INSERT INTO notes VALUES (1, 'hi'), (2, NULL);".to_string(),
        );
        assert!(inserted.ok, "{}", inserted.message);

        let response = session_fetch(
            &session,
            "local".to_string(),
            "SELECT id, body FROM notes ORDER BY id;".to_string(),
        );
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.row_count, 2);
        assert_eq!(response.rows_json, r#"[[1,"hi"],[2,null]]"#);
    }

    #[test]
    fn unknown_backend_is_rejected_without_panicking() {
        let (_dir, session) = session();
        let response = session_send(&session, "cloud".to_string(), "SELECT 1;".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("cloud"));
    }

    #[test]
    fn policy_roundtrips_through_json() {
        let (_dir, session) = session();
        let updated = session_set_policy(&session, r#"{"offline_mode":true}"#.to_string());
        assert!(updated.ok, "{}", updated.message);

        let policy: serde_json::Value =
            serde_json::from_str(&session_policy(&session)).expect("policy json");
        assert_eq!(policy["offline_mode"], serde_json::Value::Bool(true));
        assert_eq!(policy["verbose"], serde_json::Value::Bool(false));

        let blocked = session_fetch(&session, "remote".to_string(), "SELECT 1;".to_string());
        assert!(!blocked.ok);
        assert!(blocked.message.contains("offline_mode"));

        let rejected = session_set_policy(&session, "not json".to_string());
        assert!(!rejected.ok);
    }

    #[test]
    fn recheck_with_wait_reports_reachability() {
        let (_dir, session) = session();
        let response = session_recheck_connectivity(&session, true);
        assert!(response.ok, "{}", response.message);
        assert!(!session.manager.policy().offline_mode);
    }

    #[test]
    fn sync_reports_counts_and_rejects_unknown_direction() {
        let (_dir, session) = session();
        for backend in ["local", "remote"] {
            session_send(&session, backend.to_string(), SCHEMA.to_string());
        }

        let response = session_sync(&session, "both".to_string());
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.applied, 0);

        let rejected = session_sync(&session, "sideways".to_string());
        assert!(!rejected.ok);
    }

    #[test]
    fn close_makes_later_calls_fail_softly() {
        let (_dir, session) = session();
        assert!(session_close(&session).ok);

        let response = session_fetch(&session, "local".to_string(), "SELECT 1;".to_string());
        assert!(!response.ok);
        assert_eq!(response.rows_json, "[]");
    }

    #[test]
    fn non_finite_reals_and_blobs_map_to_json() {
        assert_eq!(value_to_json(&Value::Real(f64::NAN)), serde_json::Value::Null);
        assert_eq!(
            value_to_json(&Value::Blob(vec![1, 2])).to_string(),
            r#"{"blob":[1,2]}"#
        );
    }
}
