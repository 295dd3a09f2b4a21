//! Sync journal records and the SQL that reads and writes them.

use super::table::SyncTable;
use crate::backend::dialect::quote_text;
use crate::backend::BackendKind;
use crate::model::value::Value;
use crate::router::{OperationResult, QueryRouter};
use log::debug;

/// Journal table present on both backends.
pub const JOURNAL_TABLE: &str = "duodb_sync_records";

/// Idempotent journal DDL, shared with the local migration.
pub const JOURNAL_DDL: &str = include_str!("../db/migrations/0001_sync_journal.sql");

const JOURNAL_COLUMNS: &str = "table_name, primary_key, revision, origin, operation";

/// Kind of row change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    Insert,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Per-row change marker stored in one backend's journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRecord {
    pub table: String,
    pub primary_key: String,
    pub revision: i64,
    pub origin: BackendKind,
    pub operation: SyncOperation,
}

impl SyncRecord {
    /// Parses one journal row selected in `JOURNAL_COLUMNS` order.
    pub fn from_row(row: &[Value]) -> Result<Self, String> {
        let [table, primary_key, revision, origin, operation] = row else {
            return Err(format!("journal row has {} column(s), expected 5", row.len()));
        };
        let text = |value: &Value, column: &str| {
            value
                .to_key_text()
                .ok_or_else(|| format!("journal column `{column}` is not text"))
        };

        let origin_text = text(origin, "origin")?;
        let operation_text = text(operation, "operation")?;
        Ok(Self {
            table: text(table, "table_name")?,
            primary_key: text(primary_key, "primary_key")?,
            revision: revision
                .as_i64()
                .ok_or_else(|| "journal column `revision` is not an integer".to_string())?,
            origin: BackendKind::parse(&origin_text)
                .ok_or_else(|| format!("journal origin `{origin_text}` is unknown"))?,
            operation: SyncOperation::parse(&operation_text)
                .ok_or_else(|| format!("journal operation `{operation_text}` is unknown"))?,
        })
    }

    /// Journal upsert that makes the target carry exactly this record.
    pub fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {JOURNAL_TABLE} ({JOURNAL_COLUMNS}) VALUES ({}, {}, {}, {}, {}) \
             ON CONFLICT (table_name, primary_key) DO UPDATE SET \
             revision = excluded.revision, origin = excluded.origin, operation = excluded.operation;",
            quote_text(&self.table),
            quote_text(&self.primary_key),
            self.revision,
            quote_text(self.origin.as_str()),
            quote_text(self.operation.as_str()),
        )
    }
}

/// Selects every journal record for the given tables.
pub fn select_journal_sql(tables: &[SyncTable]) -> String {
    let names = tables
        .iter()
        .map(|table| quote_text(&table.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {JOURNAL_COLUMNS} FROM {JOURNAL_TABLE} WHERE table_name IN ({names}) \
         ORDER BY table_name, primary_key;"
    )
}

fn select_revision_sql(table: &str, primary_key: &str) -> String {
    format!(
        "SELECT revision FROM {JOURNAL_TABLE} WHERE table_name = {} AND primary_key = {};",
        quote_text(table),
        quote_text(primary_key)
    )
}

/// Records a successful write of one row on `backend`.
///
/// The new revision is the backend's previous revision for the row plus one.
/// All statements go through the router, so the same policy that allowed the
/// write must still allow the journal update.
pub fn record_write(
    router: &QueryRouter,
    backend: BackendKind,
    table: &str,
    primary_key: &str,
    operation: SyncOperation,
) -> OperationResult<SyncRecord> {
    router.send(JOURNAL_DDL, backend)?;
    let current = router
        .fetch(&select_revision_sql(table, primary_key), backend)?
        .get(0, 0)
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let record = SyncRecord {
        table: table.to_string(),
        primary_key: primary_key.to_string(),
        revision: current + 1,
        origin: backend,
        operation,
    };
    router.send(&record.upsert_sql(), backend)?;
    debug!(
        "event=journal_write module=sync status=ok backend={} table={} revision={}",
        backend, record.table, record.revision
    );
    Ok(record)
}
