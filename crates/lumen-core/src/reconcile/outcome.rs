// ── Reconciliation outcome ──

use std::collections::BTreeMap;

use crate::freshness::PruneReason;
use crate::model::AccessoryRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneAction {
    pub record: AccessoryRecord,
    pub reason: PruneReason,
}

/// The three batches one pass produces for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub to_register: Vec<AccessoryRecord>,
    pub to_update: Vec<AccessoryRecord>,
    pub to_prune: Vec<PruneAction>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.to_register.is_empty() && self.to_update.is_empty() && self.to_prune.is_empty()
    }

    /// Prune actions grouped by reason, one unregister call per group.
    pub fn prune_batches(&self) -> BTreeMap<PruneReason, Vec<AccessoryRecord>> {
        let mut batches: BTreeMap<PruneReason, Vec<AccessoryRecord>> = BTreeMap::new();
        for action in &self.to_prune {
            batches
                .entry(action.reason)
                .or_default()
                .push(action.record.clone());
        }
        batches
    }
}
