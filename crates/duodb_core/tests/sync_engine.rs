mod common;

use common::{note_bodies, notes_table, texts, StoreFiles, LOCAL_DB, NOTES_SCHEMA, REMOTE_DB};
use duodb_core::sync::{record_write, JOURNAL_TABLE};
use duodb_core::{
    BackendConnection, BackendError, BackendKind, ConnectionState, DatabaseManager,
    DirectoryResolver, LocalStore, ModeController, OperationError, PolicyFlag, PolicyState,
    QueryRouter, RowSet, SqlDialect, SyncError, SyncEngine, SyncOperation, SyncPhase, SyncStatus,
    TrackedChange,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

fn tracked(manager: &DatabaseManager, backend: BackendKind, sql: &str, id: i64, op: SyncOperation) {
    let change = TrackedChange::new("notes", id.to_string(), op);
    manager.send_tracked(backend, sql, &change).unwrap();
}

fn insert(manager: &DatabaseManager, backend: BackendKind, id: i64, body: &str) {
    let sql = format!("INSERT INTO notes VALUES ({id}, '{body}');");
    tracked(manager, backend, &sql, id, SyncOperation::Insert);
}

fn update(manager: &DatabaseManager, backend: BackendKind, id: i64, body: &str) {
    let sql = format!("UPDATE notes SET body = '{body}' WHERE id = {id};");
    tracked(manager, backend, &sql, id, SyncOperation::Update);
}

fn delete(manager: &DatabaseManager, backend: BackendKind, id: i64) {
    let sql = format!("DELETE FROM notes WHERE id = {id};");
    tracked(manager, backend, &sql, id, SyncOperation::Delete);
}

fn row(id: &str, body: &str) -> Vec<String> {
    vec![id.to_string(), body.to_string()]
}

fn journal_entry(manager: &DatabaseManager, local: bool, id: &str) -> Vec<Vec<String>> {
    let query = format!(
        "SELECT revision, origin, operation FROM {JOURNAL_TABLE} \
         WHERE table_name = 'notes' AND primary_key = '{id}';"
    );
    let rows = if local {
        manager.fetch_from_local(&query)
    } else {
        manager.fetch_from_remote(&query)
    };
    texts(&rows.unwrap())
}

#[test]
fn newer_remote_revision_wins_conflict() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "local v1");
    update(&manager, BackendKind::Local, 1, "local v2");
    insert(&manager, BackendKind::Remote, 1, "remote v1");
    update(&manager, BackendKind::Remote, 1, "remote v2");
    update(&manager, BackendKind::Remote, 1, "remote v3");

    let report = manager.sync().unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.applied, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts_resolved_for(BackendKind::Remote), 1);
    assert_eq!(report.conflicts[0].local_revision, 2);
    assert_eq!(report.conflicts[0].remote_revision, 3);
    assert_eq!(note_bodies(&manager, true), vec![row("1", "remote v3")]);
    assert_eq!(
        journal_entry(&manager, true, "1"),
        vec![vec!["3".to_string(), "remote".to_string(), "update".to_string()]]
    );
    assert_eq!(manager.sync_phase(), SyncPhase::Idle);

    let second = manager.sync().unwrap();
    assert_eq!(second.applied, 0);
    assert!(second.conflicts.is_empty());
}

#[test]
fn newer_local_revision_is_pushed_to_remote() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Remote, 1, "remote v1");
    insert(&manager, BackendKind::Local, 1, "local v1");
    update(&manager, BackendKind::Local, 1, "local v2");

    let report = manager.sync().unwrap();

    assert_eq!(report.conflicts_resolved_for(BackendKind::Local), 1);
    assert_eq!(note_bodies(&manager, false), vec![row("1", "local v2")]);
}

#[test]
fn equal_revisions_from_different_origins_go_to_remote() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "local");
    insert(&manager, BackendKind::Remote, 1, "remote");

    let report = manager.sync().unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].winner, BackendKind::Remote);
    assert_eq!(note_bodies(&manager, true), vec![row("1", "remote")]);
    assert_eq!(note_bodies(&manager, false), vec![row("1", "remote")]);
}

#[test]
fn one_sided_rows_are_copied_both_ways() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "from local");
    insert(&manager, BackendKind::Remote, 2, "from remote");

    let report = manager.sync().unwrap();

    assert_eq!(report.applied, 2);
    assert!(report.conflicts.is_empty());
    let expected = vec![row("1", "from local"), row("2", "from remote")];
    assert_eq!(note_bodies(&manager, true), expected);
    assert_eq!(note_bodies(&manager, false), expected);
}

#[test]
fn deletes_propagate_to_the_other_side() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Remote, 1, "doomed");
    manager.sync().unwrap();
    assert_eq!(note_bodies(&manager, true).len(), 1);

    delete(&manager, BackendKind::Remote, 1);
    let report = manager.sync().unwrap();

    assert_eq!(report.applied, 1);
    assert!(note_bodies(&manager, true).is_empty());
}

#[test]
fn missing_source_row_is_skipped_once_and_then_converges() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "gone");
    manager.send_to_local("DELETE FROM notes WHERE id = 1;").unwrap();

    let first = manager.sync().unwrap();
    assert_eq!(first.skipped, 1);
    assert_eq!(first.applied, 0);
    assert!(note_bodies(&manager, false).is_empty());
    let tombstone = vec![vec!["1".to_string(), "local".to_string(), "delete".to_string()]];
    assert_eq!(journal_entry(&manager, true, "1"), tombstone);
    assert_eq!(journal_entry(&manager, false, "1"), tombstone);

    for _ in 0..2 {
        let next = manager.sync().unwrap();
        assert_eq!(next.applied + next.skipped + next.failed, 0);
    }
}

#[test]
fn untracked_source_delete_removes_stale_target_row() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Remote, 1, "v1");
    manager.sync().unwrap();
    update(&manager, BackendKind::Remote, 1, "v2");
    manager.send_to_remote("DELETE FROM notes WHERE id = 1;").unwrap();

    let report = manager.sync().unwrap();

    assert_eq!(report.skipped, 1);
    assert!(note_bodies(&manager, true).is_empty());
    assert_eq!(manager.sync().unwrap().skipped, 0);
}

#[test]
fn failing_row_does_not_abort_the_pass() {
    let files = StoreFiles::new(
        NOTES_SCHEMA,
        "CREATE TABLE notes(id INTEGER PRIMARY KEY, body TEXT NOT NULL CHECK (length(body) <= 5));",
    );
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "ok");
    insert(&manager, BackendKind::Local, 2, "far too long");
    insert(&manager, BackendKind::Local, 3, "fine");

    let report = manager.sync().unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].primary_key, "2");
    assert_eq!(report.failures[0].target, BackendKind::Remote);
    assert_eq!(note_bodies(&manager, false), vec![row("1", "ok"), row("3", "fine")]);
    assert!(journal_entry(&manager, false, "2").is_empty());
    assert_eq!(manager.sync_phase(), SyncPhase::Idle);
}

#[test]
fn offline_mode_fails_the_pass_while_diffing() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "pending");
    manager.mode().set_offline_mode(true);

    let err = manager.sync().unwrap_err();

    assert_eq!(
        err,
        SyncError::Operation {
            phase: SyncPhase::Diffing,
            source: OperationError::ReadBlocked {
                backend: BackendKind::Remote,
                flag: PolicyFlag::OfflineMode,
            },
        }
    );
    assert_eq!(manager.sync_phase(), SyncPhase::Failed);

    manager.mode().set_offline_mode(false);
    let report = manager.sync().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(manager.sync_phase(), SyncPhase::Idle);
}

#[test]
fn write_protection_is_not_bypassed_by_sync() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Remote, 1, "remote");
    manager.mode().set_prevent_write_to_local(true);

    let report = manager.sync().unwrap();

    assert_eq!(report.applied, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].target, BackendKind::Local);
    assert!(note_bodies(&manager, true).is_empty());
}

#[test]
fn failed_conflict_is_reported_on_the_failure() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "local");
    insert(&manager, BackendKind::Remote, 1, "remote v1");
    update(&manager, BackendKind::Remote, 1, "remote v2");
    manager.mode().set_prevent_write_to_local(true);

    let report = manager.sync().unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.conflicts.is_empty());
    let conflict = report.failures[0].conflict.as_ref().unwrap();
    assert_eq!(conflict.winner, BackendKind::Remote);
    assert_eq!(conflict.local_revision, 1);
    assert_eq!(conflict.remote_revision, 2);
    assert_eq!(note_bodies(&manager, true), vec![row("1", "local")]);
}

#[test]
fn directional_passes_only_write_one_side() {
    let files = StoreFiles::with_notes();
    let manager = files.manager();
    insert(&manager, BackendKind::Local, 1, "from local");
    insert(&manager, BackendKind::Remote, 2, "from remote");

    let pulled = manager.sync_remote_to_local().unwrap();
    assert_eq!(pulled.applied, 1);
    assert_eq!(note_bodies(&manager, false), vec![row("2", "from remote")]);
    assert_eq!(note_bodies(&manager, true).len(), 2);

    let pushed = manager.sync_local_to_remote().unwrap();
    assert_eq!(pushed.applied, 1);
    assert_eq!(note_bodies(&manager, false).len(), 2);
}

#[test]
fn untracked_tables_are_ignored() {
    let files = StoreFiles::with_notes();
    let manager = DatabaseManager::with_parts(&files.remote_path(), LOCAL_DB, files.parts(vec![]))
        .unwrap();
    insert(&manager, BackendKind::Local, 1, "x");

    let report = manager.sync().unwrap();

    assert_eq!(report.applied + report.skipped + report.failed, 0);
    assert!(note_bodies(&manager, false).is_empty());
}

/// Remote stand-in that parks the first journal read until released.
struct GatedConnection {
    inner: LocalStore,
    armed: AtomicBool,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl BackendConnection for GatedConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    fn execute(&self, command: &str) -> Result<(), BackendError> {
        self.inner.execute(command)
    }

    fn query(&self, text: &str) -> Result<RowSet, BackendError> {
        if text.contains("WHERE table_name IN") && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.inner.query(text)
    }

    fn dialect(&self) -> Result<SqlDialect, BackendError> {
        self.inner.dialect()
    }

    fn close(&self) {
        self.inner.close();
    }
}

struct GatedSetup {
    _files: StoreFiles,
    gate: Arc<GatedConnection>,
    router: Arc<QueryRouter>,
    engine: Arc<SyncEngine>,
    entered: Receiver<()>,
    release: Sender<()>,
}

fn gated_setup() -> GatedSetup {
    let files = StoreFiles::with_notes();
    let resolver = || Box::new(DirectoryResolver::new(None, files.data_dir()));
    let local = LocalStore::new(resolver());
    local.open(LOCAL_DB).unwrap();
    let remote_store = LocalStore::new(resolver());
    remote_store.open(REMOTE_DB).unwrap();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Arc::new(GatedConnection {
        inner: remote_store,
        armed: AtomicBool::new(false),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });

    let router = Arc::new(QueryRouter::new(
        Arc::new(ModeController::new(PolicyState::default())),
        Arc::clone(&gate) as Arc<dyn BackendConnection>,
        Arc::new(local),
    ));
    let engine = Arc::new(SyncEngine::new(Arc::clone(&router), vec![notes_table()]));
    GatedSetup {
        _files: files,
        gate,
        router,
        engine,
        entered: entered_rx,
        release: release_tx,
    }
}

fn seed_local_rows(router: &QueryRouter, ids: &[i64]) {
    for id in ids {
        router
            .send(&format!("INSERT INTO notes VALUES ({id}, 'row {id}');"), BackendKind::Local)
            .unwrap();
        record_write(router, BackendKind::Local, "notes", &id.to_string(), SyncOperation::Insert)
            .unwrap();
    }
}

#[test]
fn second_pass_is_rejected_while_one_is_running() {
    let setup = gated_setup();
    seed_local_rows(&setup.router, &[1]);
    setup.gate.armed.store(true, Ordering::SeqCst);

    let engine = Arc::clone(&setup.engine);
    let running = thread::spawn(move || engine.sync());
    setup.entered.recv().unwrap();

    assert_eq!(setup.engine.sync(), Err(SyncError::InProgress));
    assert_eq!(setup.engine.phase(), SyncPhase::Diffing);

    setup.release.send(()).unwrap();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(setup.engine.phase(), SyncPhase::Idle);
}

#[test]
fn cancelled_pass_skips_remaining_rows() {
    let setup = gated_setup();
    seed_local_rows(&setup.router, &[1, 2]);
    setup.gate.armed.store(true, Ordering::SeqCst);

    let engine = Arc::clone(&setup.engine);
    let running = thread::spawn(move || engine.sync());
    setup.entered.recv().unwrap();
    setup.engine.cancel_token().cancel();
    setup.release.send(()).unwrap();

    let report = running.join().unwrap().unwrap();
    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(setup.engine.phase(), SyncPhase::Idle);

    let rerun = setup.engine.sync().unwrap();
    assert_eq!(rerun.status, SyncStatus::Completed);
    assert_eq!(rerun.applied, 2);
}
