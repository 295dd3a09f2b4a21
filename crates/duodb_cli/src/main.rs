//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `duodb_core` linkage.
//! - Optionally run one query against an existing SQLite file:
//!   `duodb_cli <db_path> <sql>`.

use duodb_core::{BackendConnection, DirectoryResolver, LocalStore, Value};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("duodb_core ping={}", duodb_core::ping());
    println!("duodb_core version={}", duodb_core::core_version());

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => ExitCode::SUCCESS,
        [db_path, sql] => match run_query(Path::new(db_path), sql) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("error: {message}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: duodb_cli [<db_path> <sql>]");
            ExitCode::FAILURE
        }
    }
}

fn run_query(db_path: &Path, sql: &str) -> Result<(), String> {
    let name = db_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("invalid database path `{}`", db_path.display()))?;
    let dir = db_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let store = LocalStore::new(Box::new(DirectoryResolver::new(None, dir)));
    store.open(name).map_err(|err| err.to_string())?;
    let rows = store.query(sql).map_err(|err| err.to_string())?;
    for row in rows.rows() {
        let cells = row.iter().map(render).collect::<Vec<_>>();
        println!("{}", cells.join("|"));
    }
    println!("rows={}", rows.len());
    store.close();
    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
        other => other.to_key_text().unwrap_or_default(),
    }
}
