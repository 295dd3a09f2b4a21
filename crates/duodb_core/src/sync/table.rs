//! Description of one table under sync and the row-level SQL it needs.

use crate::backend::SqlDialect;
use crate::backend::dialect::quote_text;
use crate::model::value::Value;

/// Storage type of a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Text,
}

/// One table kept in sync between both backends.
///
/// The key column must be a primary key or unique column on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTable {
    pub name: String,
    pub key_column: String,
    pub key_kind: KeyKind,
    columns: Vec<String>,
}

impl SyncTable {
    /// Creates a table description whose column list starts with the key.
    pub fn new(
        name: impl Into<String>,
        key_column: impl Into<String>,
        key_kind: KeyKind,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let key_column = key_column.into();
        let mut all_columns = vec![key_column.clone()];
        for column in columns {
            let column = column.into();
            if column != key_column {
                all_columns.push(column);
            }
        }
        Self {
            name: name.into(),
            key_column,
            key_kind,
            columns: all_columns,
        }
    }

    /// Synced columns, key first.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Renders a journal key as a literal of the key column's type.
    pub fn key_literal(&self, key: &str) -> Result<String, String> {
        match self.key_kind {
            KeyKind::Integer => key
                .trim()
                .parse::<i64>()
                .map(|value| value.to_string())
                .map_err(|_| format!("key `{key}` of table `{}` is not an integer", self.name)),
            KeyKind::Text => Ok(quote_text(key)),
        }
    }

    pub fn select_row_sql(&self, dialect: SqlDialect, key: &str) -> Result<String, String> {
        let columns = self.column_list(dialect);
        Ok(format!(
            "SELECT {columns} FROM {} WHERE {} = {};",
            dialect.ident(&self.name),
            dialect.ident(&self.key_column),
            self.key_literal(key)?
        ))
    }

    pub fn delete_row_sql(&self, dialect: SqlDialect, key: &str) -> Result<String, String> {
        Ok(format!(
            "DELETE FROM {} WHERE {} = {};",
            dialect.ident(&self.name),
            dialect.ident(&self.key_column),
            self.key_literal(key)?
        ))
    }

    /// Insert-or-update of one full row in `columns()` order.
    pub fn upsert_row_sql(&self, dialect: SqlDialect, row: &[Value]) -> Result<String, String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "row for table `{}` has {} value(s), expected {}",
                self.name,
                row.len(),
                self.columns.len()
            ));
        }

        let values = row
            .iter()
            .map(|value| dialect.literal(value))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = self
            .columns
            .iter()
            .skip(1)
            .map(|column| {
                let column = dialect.ident(column);
                format!("{column} = excluded.{column}")
            })
            .collect::<Vec<_>>();
        let on_conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({values}) ON CONFLICT ({}) {on_conflict};",
            dialect.ident(&self.name),
            self.column_list(dialect),
            dialect.ident(&self.key_column),
        ))
    }

    fn column_list(&self, dialect: SqlDialect) -> String {
        self.columns
            .iter()
            .map(|column| dialect.ident(column))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
