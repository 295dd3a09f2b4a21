//! Literal and identifier rendering for generated commands.
//!
//! Only the sync engine generates SQL; caller statements pass through
//! untouched.

use crate::model::value::Value;
use std::fmt::Write;

/// SQL flavour of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
}

impl SqlDialect {
    /// Renders one value as an inline SQL literal.
    ///
    /// PostgreSQL numbers are quoted so the server types them from the target
    /// column: `boolean` columns decode to integers and must accept `'1'`.
    pub fn literal(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(value) => self.number(value.to_string()),
            Value::Real(value) if value.is_finite() => self.number(format!("{value:?}")),
            Value::Real(_) => "NULL".to_string(),
            Value::Text(value) => quote_text(value),
            Value::Blob(bytes) => {
                let hex = hex_upper(bytes);
                match self {
                    Self::Sqlite => format!("X'{hex}'"),
                    Self::Postgres => format!("'\\x{hex}'::bytea"),
                }
            }
        }
    }

    fn number(self, digits: String) -> String {
        match self {
            Self::Sqlite => digits,
            Self::Postgres => format!("'{digits}'"),
        }
    }

    /// Quotes one identifier with standard double quotes.
    pub fn ident(self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Quotes text as a standard SQL string literal.
pub fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}
