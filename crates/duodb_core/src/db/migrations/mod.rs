//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register journal migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - The applied version lives in the `duodb_meta` table. The caller's
//!   `PRAGMA user_version` is never read or written.
//! - Migrations only add `duodb_*` tables; user tables stay untouched.

use crate::db::{DbError, DbResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Table holding DuoDB's own bookkeeping inside a caller database.
pub const META_TABLE: &str = "duodb_meta";

const SCHEMA_VERSION_KEY: &str = "journal_schema_version";

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_sync_journal.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {META_TABLE} (key TEXT PRIMARY KEY, value INTEGER NOT NULL);"
    ))?;

    let current_version = schema_version(&tx)?;
    let latest = latest_version();
    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        tx.execute_batch(migration.sql)?;
        tx.execute(
            &format!(
                "INSERT INTO {META_TABLE} (key, value) VALUES (?1, ?2) \
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value;"
            ),
            params![SCHEMA_VERSION_KEY, migration.version],
        )?;
    }
    tx.commit()?;

    Ok(())
}

/// Journal schema version recorded in `duodb_meta`; `0` when never migrated.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn
        .query_row(
            &format!("SELECT value FROM {META_TABLE} WHERE key = ?1;"),
            [SCHEMA_VERSION_KEY],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}
