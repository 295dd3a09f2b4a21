//! Backend connection owners.
//!
//! # Responsibility
//! - Own exactly one handle per backend kind and replace it on reopen.
//! - Translate native open failures into typed open errors.
//!
//! # Invariants
//! - A failed open leaves the connection `Closed`.
//! - Both connections implement `BackendConnection`, so routing never
//!   depends on which engine sits behind a kind.

pub mod local;
pub mod remote;

pub use local::{DirectoryResolver, LocalOpenError, LocalStore, PathResolver};
pub use remote::{
    ConnectError, PostgresConnector, RemoteConnection, RemoteConnector, SqliteConnector,
};
