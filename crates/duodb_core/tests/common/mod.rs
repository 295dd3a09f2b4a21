#![allow(dead_code)]

use duodb_core::{
    DatabaseManager, DirectoryResolver, KeyKind, ManagerParts, PolicyState, ReachabilityProbe,
    RowSet, SqliteConnector, SyncTable, Value,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const LOCAL_DB: &str = "local.db";
pub const REMOTE_DB: &str = "remote.db";

pub const NOTES_SCHEMA: &str = "CREATE TABLE notes(id INTEGER PRIMARY KEY, body TEXT NOT NULL);";

/// Two SQLite files standing in for the local store and the remote server.
pub struct StoreFiles {
    pub dir: TempDir,
}

impl StoreFiles {
    pub fn new(local_schema: &str, remote_schema: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        seed(&dir.path().join(LOCAL_DB), local_schema);
        seed(&dir.path().join(REMOTE_DB), remote_schema);
        Self { dir }
    }

    pub fn with_notes() -> Self {
        Self::new(NOTES_SCHEMA, NOTES_SCHEMA)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn remote_path(&self) -> String {
        self.dir.path().join(REMOTE_DB).display().to_string()
    }

    pub fn parts(&self, tables: Vec<SyncTable>) -> ManagerParts {
        let probe: Arc<dyn ReachabilityProbe> = Arc::new(|| true);
        ManagerParts {
            remote_connector: Box::new(SqliteConnector),
            path_resolver: Box::new(DirectoryResolver::new(None, self.data_dir())),
            probe,
            policy: PolicyState::default(),
            sync_tables: tables,
        }
    }

    pub fn manager(&self) -> DatabaseManager {
        DatabaseManager::with_parts(&self.remote_path(), LOCAL_DB, self.parts(vec![notes_table()]))
            .unwrap()
    }
}

pub fn seed(path: &Path, schema: &str) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(schema).unwrap();
}

pub fn notes_table() -> SyncTable {
    SyncTable::new("notes", "id", KeyKind::Integer, ["body"])
}

/// Rows rendered as text for compact assertions.
pub fn texts(rows: &RowSet) -> Vec<Vec<String>> {
    rows.rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| match value {
                    Value::Null => "NULL".to_string(),
                    other => other.to_key_text().unwrap_or_default(),
                })
                .collect()
        })
        .collect()
}

pub fn note_bodies(manager: &DatabaseManager, local: bool) -> Vec<Vec<String>> {
    let query = "SELECT id, body FROM notes ORDER BY id;";
    let rows = if local {
        manager.fetch_from_local(query)
    } else {
        manager.fetch_from_remote(query)
    };
    texts(&rows.unwrap())
}
