// ── Reconciliation context ──
//
// The two registries the engine works against. Every record id lives in
// at most one of them. Pruned entries stay in the active registry as
// tombstones so a pruned device is never revived within the process.

use std::collections::HashMap;

use tracing::warn;

use crate::lifecycle::LifecycleState;
use crate::model::{AccessoryRecord, RecordId};

/// A record the process has admitted or pruned this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntry {
    pub record: AccessoryRecord,
    pub state: LifecycleState,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    /// Persisted records not yet matched to a discovered device.
    pub(crate) disk: HashMap<RecordId, AccessoryRecord>,
    /// Records this process has acted on.
    pub(crate) active: HashMap<RecordId, ActiveEntry>,
}

impl ReconcileContext {
    /// Seed the disk registry from persisted records. Later duplicates
    /// replace earlier ones.
    pub fn from_disk(records: impl IntoIterator<Item = AccessoryRecord>) -> Self {
        let mut disk = HashMap::new();
        for record in records {
            let id = record.record_id;
            if disk.insert(id, record).is_some() {
                warn!(record_id = %id, "duplicate persisted record; keeping the later entry");
            }
        }
        Self {
            disk,
            active: HashMap::new(),
        }
    }

    /// Mark records as pruned without a pass, e.g. persisted records that
    /// failed validation.
    pub fn tombstone(&mut self, records: impl IntoIterator<Item = AccessoryRecord>) {
        for record in records {
            self.disk.remove(&record.record_id);
            self.active.insert(
                record.record_id,
                ActiveEntry {
                    record,
                    state: LifecycleState::Pruned,
                },
            );
        }
    }

    pub fn disk_len(&self) -> usize {
        self.disk.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn disk_record(&self, id: &RecordId) -> Option<&AccessoryRecord> {
        self.disk.get(id)
    }

    pub fn active_entry(&self, id: &RecordId) -> Option<&ActiveEntry> {
        self.active.get(id)
    }

    pub fn lifecycle(&self, id: &RecordId) -> LifecycleState {
        if self.disk.contains_key(id) {
            return LifecycleState::Offline;
        }
        self.active
            .get(id)
            .map_or(LifecycleState::Unknown, |entry| entry.state)
    }

    /// Promote records the bridge accepted from `New` to `Active`.
    pub fn confirm_registered<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) {
        for id in ids {
            if let Some(entry) = self
                .active
                .get_mut(id)
                .filter(|e| e.state == LifecycleState::New)
            {
                debug_assert!(entry.state.can_transition_to(LifecycleState::Active));
                entry.state = LifecycleState::Active;
            }
        }
    }

    /// Records known but not currently seen: everything still on disk plus
    /// active entries that went offline.
    pub fn offline_records(&self) -> Vec<&AccessoryRecord> {
        let mut out: Vec<&AccessoryRecord> = self
            .disk
            .values()
            .chain(
                self.active
                    .values()
                    .filter(|e| e.state == LifecycleState::Offline)
                    .map(|e| &e.record),
            )
            .collect();
        out.sort_by_key(|r| r.record_id);
        out
    }

    /// Records currently admitted (`New` or `Active`).
    pub fn live_records(&self) -> Vec<&AccessoryRecord> {
        let mut out: Vec<&AccessoryRecord> = self
            .active
            .values()
            .filter(|e| e.state.is_live())
            .map(|e| &e.record)
            .collect();
        out.sort_by_key(|r| r.record_id);
        out
    }

    /// Everything that should survive a restart, ordered by record id.
    ///
    /// Pending (`New`) entries are left out: the bridge never accepted
    /// them, so after a restart they must be registered again rather than
    /// reloaded as known records.
    pub fn records_to_persist(&self) -> Vec<AccessoryRecord> {
        let mut out: Vec<AccessoryRecord> = self
            .disk
            .values()
            .chain(
                self.active
                    .values()
                    .filter(|e| e.state.is_persistent())
                    .map(|e| &e.record),
            )
            .cloned()
            .collect();
        out.sort_by_key(|r| r.record_id);
        out
    }
}
