//! PostgreSQL session backed by the synchronous `postgres` client.
//!
//! # Invariants
//! - Commands go through the simple-query batch path, so several
//!   statements may be sent at once.
//! - Queries whose columns all have a native mapping are decoded typed;
//!   anything else falls back to text-mode decoding of the same statement.

use super::{SqlBackend, SqlDialect};
use crate::model::value::{Row, RowSet, Value};
use postgres::types::Type;
use postgres::{Client, SimpleQueryMessage};

/// Live PostgreSQL session.
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl SqlBackend for PostgresBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn execute(&mut self, command: &str) -> Result<(), String> {
        self.client
            .batch_execute(command)
            .map_err(|err| err.to_string())
    }

    fn query(&mut self, text: &str) -> Result<RowSet, String> {
        let statement = self.client.prepare(text).map_err(|err| err.to_string())?;
        let typed = statement
            .columns()
            .iter()
            .all(|column| is_natively_mapped(column.type_()));

        if !typed {
            return self.query_text_mode(text);
        }

        let rows = self
            .client
            .query(&statement, &[])
            .map_err(|err| err.to_string())?;
        let mut set = RowSet::new();
        for row in rows {
            let mut values: Row = Vec::with_capacity(row.len());
            for (index, column) in row.columns().iter().enumerate() {
                values.push(decode_typed(&row, index, column.type_())?);
            }
            set.push(values).map_err(|err| err.to_string())?;
        }
        Ok(set)
    }

    fn is_broken(&self) -> bool {
        self.client.is_closed()
    }
}

impl PostgresBackend {
    fn query_text_mode(&mut self, text: &str) -> Result<RowSet, String> {
        let messages = self
            .client
            .simple_query(text)
            .map_err(|err| err.to_string())?;
        let mut set = RowSet::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let values = (0..row.len())
                    .map(|index| match row.get(index) {
                        Some(value) => Value::Text(value.to_string()),
                        None => Value::Null,
                    })
                    .collect::<Row>();
                set.push(values).map_err(|err| err.to_string())?;
            }
        }
        Ok(set)
    }
}

fn is_natively_mapped(ty: &Type) -> bool {
    [
        Type::BOOL,
        Type::INT2,
        Type::INT4,
        Type::INT8,
        Type::FLOAT4,
        Type::FLOAT8,
        Type::TEXT,
        Type::VARCHAR,
        Type::BPCHAR,
        Type::NAME,
        Type::BYTEA,
    ]
    .contains(ty)
}

fn decode_typed(row: &postgres::Row, index: usize, ty: &Type) -> Result<Value, String> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(index)
            .map(|value| Value::from(value.map(i64::from)))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(index)
            .map(|value| Value::from(value.map(i64::from)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(index)
            .map(|value| Value::from(value.map(i64::from)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(index).map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(index)
            .map(|value| Value::from(value.map(f64::from)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(index).map(Value::from)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(index).map(Value::from)
    } else {
        row.try_get::<_, Option<String>>(index).map(Value::from)
    };
    value.map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::is_natively_mapped;
    use postgres::types::Type;

    #[test]
    fn numeric_and_temporal_types_use_text_mode() {
        assert!(is_natively_mapped(&Type::INT8));
        assert!(is_natively_mapped(&Type::VARCHAR));
        assert!(!is_natively_mapped(&Type::NUMERIC));
        assert!(!is_natively_mapped(&Type::TIMESTAMPTZ));
    }
}
