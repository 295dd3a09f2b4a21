//! SQLite session backed by `rusqlite`.

use super::{SqlBackend, SqlDialect};
use crate::model::value::{RowSet, Value};
use rusqlite::{Batch, Connection};

/// Live SQLite session.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SqlBackend for SqliteBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn execute(&mut self, command: &str) -> Result<(), String> {
        run_batch(&self.conn, command).map_err(|err| err.to_string())
    }

    fn query(&mut self, text: &str) -> Result<RowSet, String> {
        collect_rows(&self.conn, text).map_err(|err| err.to_string())
    }
}

/// Runs every statement in `command`, draining rows of any that return them.
fn run_batch(conn: &Connection, command: &str) -> rusqlite::Result<()> {
    let mut batch = Batch::new(conn, command);
    while let Some(mut stmt) = batch.next()? {
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
    }
    Ok(())
}

fn collect_rows(conn: &Connection, text: &str) -> Result<RowSet, Box<dyn std::error::Error>> {
    let mut stmt = conn.prepare(text)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut set = RowSet::new();

    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for index in 0..column_count {
            values.push(Value::from(row.get_ref(index)?));
        }
        set.push(values)?;
    }

    Ok(set)
}
