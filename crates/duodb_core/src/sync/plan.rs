//! Journal diffing and conflict resolution.

use super::record::SyncRecord;
use crate::backend::BackendKind;
use std::collections::BTreeMap;

/// Both backends changed the same row; reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowConflict {
    pub table: String,
    pub primary_key: String,
    pub local_revision: i64,
    pub remote_revision: i64,
    pub winner: BackendKind,
}

/// One change to apply on `target`, carrying the winning record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub record: SyncRecord,
    pub target: BackendKind,
    pub conflict: Option<RowConflict>,
}

impl PlannedChange {
    /// Backend holding the winning row values.
    pub fn source(&self) -> BackendKind {
        self.target.other()
    }
}

/// Picks the winner of a conflict: higher revision, ties go to remote.
pub fn resolve_winner(local: &SyncRecord, remote: &SyncRecord) -> BackendKind {
    if local.revision > remote.revision {
        BackendKind::Local
    } else {
        BackendKind::Remote
    }
}

/// Diffs both journals keyed by `(table, primary_key)`.
///
/// - Key on one side only: copy toward the other side.
/// - Same revision and origin on both sides: already in sync.
/// - Anything else: conflict resolved by `resolve_winner`.
pub fn diff_journals(local: Vec<SyncRecord>, remote: Vec<SyncRecord>) -> Vec<PlannedChange> {
    let mut local_by_key = index_by_key(local);
    let mut changes = Vec::new();

    for (key, remote_record) in index_by_key(remote) {
        match local_by_key.remove(&key) {
            None => changes.push(PlannedChange {
                record: remote_record,
                target: BackendKind::Local,
                conflict: None,
            }),
            Some(local_record) => {
                if in_sync(&local_record, &remote_record) {
                    continue;
                }
                let winner = resolve_winner(&local_record, &remote_record);
                let conflict = RowConflict {
                    table: key.0,
                    primary_key: key.1,
                    local_revision: local_record.revision,
                    remote_revision: remote_record.revision,
                    winner,
                };
                let record = match winner {
                    BackendKind::Local => local_record,
                    BackendKind::Remote => remote_record,
                };
                changes.push(PlannedChange {
                    record,
                    target: winner.other(),
                    conflict: Some(conflict),
                });
            }
        }
    }

    changes.extend(local_by_key.into_values().map(|record| PlannedChange {
        record,
        target: BackendKind::Remote,
        conflict: None,
    }));
    changes.sort_by(|a, b| {
        (&a.record.table, &a.record.primary_key).cmp(&(&b.record.table, &b.record.primary_key))
    });
    changes
}

fn in_sync(local: &SyncRecord, remote: &SyncRecord) -> bool {
    local.revision == remote.revision
        && local.origin == remote.origin
        && local.operation == remote.operation
}

fn index_by_key(records: Vec<SyncRecord>) -> BTreeMap<(String, String), SyncRecord> {
    records
        .into_iter()
        .map(|record| ((record.table.clone(), record.primary_key.clone()), record))
        .collect()
}
