//! Bidirectional reconciliation between the local and remote stores.
//!
//! # Responsibility
//! - Keep a per-backend journal of row revisions for tracked writes.
//! - Diff both journals, resolve conflicts, and apply the winners through
//!   the query router.
//!
//! # Invariants
//! - Conflicts resolve last-writer-wins by revision; ties go to remote.
//! - Every write goes through `QueryRouter`, so policy flags apply to sync.
//! - One failing row never aborts the rest of the pass.
//! - At most one pass runs at a time per engine.

pub mod engine;
pub mod plan;
pub mod record;
pub mod table;

pub use engine::{
    FailedRow, SyncCancelToken, SyncDirection, SyncEngine, SyncError, SyncPhase, SyncReport,
    SyncStatus,
};
pub use plan::{PlannedChange, RowConflict};
pub use record::{record_write, SyncOperation, SyncRecord, JOURNAL_TABLE};
pub use table::{KeyKind, SyncTable};
