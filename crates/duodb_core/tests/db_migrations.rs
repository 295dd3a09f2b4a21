use duodb_core::db::migrations::{latest_version, schema_version};
use duodb_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_journal_migration() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "duodb_sync_records");
    assert_table_exists(&conn, "duodb_meta");
}

#[test]
fn opening_same_database_twice_is_idempotent_and_keeps_user_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let seed = Connection::open(&path).unwrap();
    seed.execute_batch("CREATE TABLE notes(id INTEGER PRIMARY KEY, body TEXT);")
        .unwrap();
    drop(seed);

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "notes");
    assert_table_exists(&conn_second, "duodb_sync_records");
}

#[test]
fn app_user_version_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    for app_version in [0, 1, 4] {
        let path = dir.path().join(format!("app-v{app_version}.db"));
        let seed = Connection::open(&path).unwrap();
        seed.execute_batch(&format!(
            "CREATE TABLE t(v INTEGER); PRAGMA user_version = {app_version};"
        ))
        .unwrap();
        drop(seed);

        let conn = open_db(&path).unwrap();

        assert_eq!(user_version(&conn), app_version);
        assert_table_exists(&conn, "duodb_sync_records");
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }
}

#[test]
fn open_db_does_not_create_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.db");

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
    assert!(!path.exists());
}

#[test]
fn opening_database_with_newer_journal_schema_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE duodb_meta (key TEXT PRIMARY KEY, value INTEGER NOT NULL);
         INSERT INTO duodb_meta VALUES ('journal_schema_version', 999);",
    )
    .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
