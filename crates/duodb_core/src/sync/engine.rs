//! Sync pass state machine.
//!
//! `Idle -> Diffing -> Applying -> Idle`, with `Failed` reachable from
//! `Diffing` or `Applying`. A failed pass leaves the engine in `Failed`
//! until the next pass starts.

use super::plan::{diff_journals, PlannedChange, RowConflict};
use super::record::{select_journal_sql, SyncOperation, SyncRecord, JOURNAL_DDL};
use super::table::SyncTable;
use crate::backend::{BackendKind, SqlDialect};
use crate::policy::Operation;
use crate::router::{OperationError, QueryRouter};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

/// Current position in the pass state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Diffing,
    Applying,
    Failed,
}

impl SyncPhase {
    fn is_running(self) -> bool {
        matches!(self, Self::Diffing | Self::Applying)
    }
}

/// Which candidates a pass applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Both,
    RemoteToLocal,
    LocalToRemote,
}

impl SyncDirection {
    fn allows(self, target: BackendKind) -> bool {
        match self {
            Self::Both => true,
            Self::RemoteToLocal => target == BackendKind::Local,
            Self::LocalToRemote => target == BackendKind::Remote,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::RemoteToLocal => "remote_to_local",
            Self::LocalToRemote => "local_to_remote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Completed,
    Cancelled,
}

/// A candidate whose write failed; the pass moved on.
///
/// `conflict` carries the unresolved conflict when the candidate was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRow {
    pub table: String,
    pub primary_key: String,
    pub target: BackendKind,
    pub error: String,
    pub conflict: Option<RowConflict>,
}

/// Summary of one finished pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pass_id: Uuid,
    pub status: SyncStatus,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub conflicts: Vec<RowConflict>,
    pub failures: Vec<FailedRow>,
}

impl SyncReport {
    fn new(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            status: SyncStatus::Completed,
            applied: 0,
            skipped: 0,
            failed: 0,
            conflicts: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Conflicts whose resolution was written to the losing side.
    ///
    /// Conflicts whose write failed are on `failures` instead.
    pub fn conflicts_resolved_for(&self, winner: BackendKind) -> usize {
        self.conflicts
            .iter()
            .filter(|conflict| conflict.winner == winner)
            .count()
    }
}

/// Pass-level failures. Row-level failures land in `SyncReport` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    InProgress,
    Operation {
        phase: SyncPhase,
        source: OperationError,
    },
    CorruptJournal {
        backend: BackendKind,
        message: String,
    },
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "a sync pass is already in progress"),
            Self::Operation { phase, source } => {
                write!(f, "sync pass failed while {phase:?}: {source}")
            }
            Self::CorruptJournal { backend, message } => {
                write!(f, "{backend} sync journal is unreadable: {message}")
            }
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Operation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Best-effort cancellation flag checked between rows.
#[derive(Debug, Clone, Default)]
pub struct SyncCancelToken(Arc<AtomicBool>);

impl SyncCancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum RowOutcome {
    Applied,
    Skipped,
}

/// Reconciles the journals of both backends through the query router.
pub struct SyncEngine {
    router: Arc<QueryRouter>,
    tables: Vec<SyncTable>,
    phase: Mutex<SyncPhase>,
    cancel: SyncCancelToken,
}

impl SyncEngine {
    pub fn new(router: Arc<QueryRouter>, tables: Vec<SyncTable>) -> Self {
        Self {
            router,
            tables,
            phase: Mutex::new(SyncPhase::Idle),
            cancel: SyncCancelToken::default(),
        }
    }

    pub fn tables(&self) -> &[SyncTable] {
        &self.tables
    }

    pub fn phase(&self) -> SyncPhase {
        *self.lock_phase()
    }

    /// Token that cancels the running pass between rows.
    pub fn cancel_token(&self) -> SyncCancelToken {
        self.cancel.clone()
    }

    /// Runs one pass in both directions.
    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        self.run(SyncDirection::Both)
    }

    /// Runs one pass.
    ///
    /// # Errors
    /// - `InProgress` when another pass is running on this engine.
    /// - `Operation` when a journal cannot be read, e.g. offline mode blocks
    ///   the remote read; the engine ends in `Failed`.
    /// - `CorruptJournal` when a journal row cannot be parsed.
    pub fn run(&self, direction: SyncDirection) -> Result<SyncReport, SyncError> {
        let mut pass = self.begin()?;
        let pass_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=sync_pass module=sync status=start pass_id={} direction={}",
            pass_id,
            direction.as_str()
        );

        let result = self.diff().map(|changes| {
            pass.set(SyncPhase::Applying);
            self.apply(pass_id, direction, changes)
        });

        match result {
            Ok(report) => {
                pass.finish();
                info!(
                    "event=sync_pass module=sync status=ok pass_id={} applied={} skipped={} failed={} conflicts={} cancelled={} duration_ms={}",
                    pass_id,
                    report.applied,
                    report.skipped,
                    report.failed,
                    report.conflicts.len(),
                    report.status == SyncStatus::Cancelled,
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=sync_pass module=sync status=error pass_id={} duration_ms={} error={}",
                    pass_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn begin(&self) -> Result<PassGuard<'_>, SyncError> {
        let mut phase = self.lock_phase();
        if phase.is_running() {
            return Err(SyncError::InProgress);
        }
        *phase = SyncPhase::Diffing;
        self.cancel.reset();
        Ok(PassGuard {
            phase: &self.phase,
            finished: false,
        })
    }

    fn diff(&self) -> Result<Vec<PlannedChange>, SyncError> {
        if self.tables.is_empty() {
            return Ok(Vec::new());
        }
        let local = self.read_journal(BackendKind::Local)?;
        let remote = self.read_journal(BackendKind::Remote)?;
        Ok(diff_journals(local, remote))
    }

    fn read_journal(&self, backend: BackendKind) -> Result<Vec<SyncRecord>, SyncError> {
        let failed = |source| SyncError::Operation {
            phase: SyncPhase::Diffing,
            source,
        };
        if self.router.policy().permits(Operation::Write, backend) {
            self.router.send(JOURNAL_DDL, backend).map_err(failed)?;
        }
        let rows = self
            .router
            .fetch(&select_journal_sql(&self.tables), backend)
            .map_err(failed)?;
        rows.rows()
            .iter()
            .map(|row| SyncRecord::from_row(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| SyncError::CorruptJournal { backend, message })
    }

    fn apply(
        &self,
        pass_id: Uuid,
        direction: SyncDirection,
        changes: Vec<PlannedChange>,
    ) -> SyncReport {
        let mut report = SyncReport::new(pass_id);
        let candidates = changes
            .into_iter()
            .filter(|change| direction.allows(change.target))
            .collect::<Vec<_>>();
        let total = candidates.len();

        for (index, change) in candidates.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.status = SyncStatus::Cancelled;
                report.skipped += total - index;
                warn!(
                    "event=sync_pass module=sync status=cancelled pass_id={} remaining={}",
                    pass_id,
                    total - index
                );
                break;
            }

            match self.apply_change(&change) {
                Ok(outcome) => {
                    match outcome {
                        RowOutcome::Applied => report.applied += 1,
                        RowOutcome::Skipped => report.skipped += 1,
                    }
                    if let Some(conflict) = change.conflict {
                        report.conflicts.push(conflict);
                    }
                }
                Err(message) => {
                    warn!(
                        "event=sync_row module=sync status=error pass_id={} table={} target={} error={}",
                        pass_id, change.record.table, change.target, message
                    );
                    report.failed += 1;
                    report.failures.push(FailedRow {
                        table: change.record.table,
                        primary_key: change.record.primary_key,
                        target: change.target,
                        error: message,
                        conflict: change.conflict,
                    });
                }
            }
        }

        report
    }

    fn apply_change(&self, change: &PlannedChange) -> Result<RowOutcome, String> {
        let record = &change.record;
        let table = self
            .tables
            .iter()
            .find(|table| table.name == record.table)
            .ok_or_else(|| format!("table `{}` is not under sync", record.table))?;
        let target_dialect = self
            .router
            .dialect(change.target)
            .map_err(|err| err.to_string())?;

        let row_sql = match record.operation {
            SyncOperation::Delete => table.delete_row_sql(target_dialect, &record.primary_key)?,
            SyncOperation::Insert | SyncOperation::Update => {
                let source = change.source();
                let source_dialect = self.router.dialect(source).map_err(|err| err.to_string())?;
                let select = table.select_row_sql(source_dialect, &record.primary_key)?;
                let row = self
                    .router
                    .fetch(&select, source)
                    .map_err(|err| err.to_string())?
                    .into_rows()
                    .into_iter()
                    .next();
                match row {
                    Some(row) => table.upsert_row_sql(target_dialect, &row)?,
                    None => {
                        self.settle_missing_source(change, table, target_dialect)?;
                        return Ok(RowOutcome::Skipped);
                    }
                }
            }
        };

        let command = format!("{row_sql}\n{}", record.upsert_sql());
        self.router
            .send(&command, change.target)
            .map_err(|err| err.to_string())?;
        Ok(RowOutcome::Applied)
    }

    /// The source row vanished without a tracked delete: remove it from the
    /// target too and journal a delete on both sides so the next diff is empty.
    fn settle_missing_source(
        &self,
        change: &PlannedChange,
        table: &SyncTable,
        target_dialect: SqlDialect,
    ) -> Result<(), String> {
        let tombstone = SyncRecord {
            operation: SyncOperation::Delete,
            ..change.record.clone()
        };
        let delete = table.delete_row_sql(target_dialect, &tombstone.primary_key)?;
        self.router
            .send(&format!("{delete}\n{}", tombstone.upsert_sql()), change.target)
            .map_err(|err| err.to_string())?;
        self.router
            .send(&tombstone.upsert_sql(), change.source())
            .map_err(|err| err.to_string())?;
        debug!(
            "event=sync_row module=sync status=skipped table={} target={} reason=source_row_missing",
            tombstone.table, change.target
        );
        Ok(())
    }

    fn lock_phase(&self) -> MutexGuard<'_, SyncPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Moves the engine to `Failed` unless the pass finished cleanly.
struct PassGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
    finished: bool,
}

impl PassGuard<'_> {
    fn set(&mut self, next: SyncPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn finish(mut self) {
        self.set(SyncPhase::Idle);
        self.finished = true;
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.set(SyncPhase::Failed);
        }
    }
}
