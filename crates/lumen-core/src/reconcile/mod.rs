// ── Reconciliation engine ──
//
// One pass over a discovery snapshot against the disk and active
// registries. The pass decides every batch before anything is submitted;
// it never talks to the network or the bridge itself.

mod context;
mod outcome;

pub use context::{ActiveEntry, ReconcileContext};
pub use outcome::{PruneAction, ReconcileOutcome};

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::PlatformConfig;
use crate::freshness::{Freshness, FreshnessPolicy, PruneReason};
use crate::lifecycle::LifecycleState;
use crate::model::{
    AccessoryRecord, DeviceController, RecordId, UniqueId, default_display_name,
};
use crate::policy::DevicePolicy;

/// Point-in-time result of a discovery scan, keyed by unique id.
pub type Snapshot = BTreeMap<UniqueId, DeviceController>;

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: DevicePolicy,
    freshness: FreshnessPolicy,
    names_with_mac_address: bool,
}

impl Reconciler {
    pub fn new(policy: DevicePolicy, freshness: FreshnessPolicy) -> Self {
        Self {
            policy,
            freshness,
            names_with_mac_address: false,
        }
    }

    pub fn from_config(config: &PlatformConfig) -> Self {
        Self::new(config.policy(), config.freshness())
            .with_mac_suffixed_names(config.names_with_mac_address)
    }

    pub fn with_mac_suffixed_names(mut self, enabled: bool) -> Self {
        self.names_with_mac_address = enabled;
        self
    }

    pub fn policy(&self) -> &DevicePolicy {
        &self.policy
    }

    pub fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    /// Run one pass. Offline bookkeeping happens in `ctx`; the returned
    /// outcome holds the batches for the bridge.
    pub fn reconcile(&self, ctx: &mut ReconcileContext, discovered: &Snapshot) -> ReconcileOutcome {
        self.reconcile_at(ctx, discovered, Utc::now())
    }

    pub fn reconcile_at(
        &self,
        ctx: &mut ReconcileContext,
        discovered: &Snapshot,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut seen: HashSet<RecordId> = HashSet::with_capacity(discovered.len());

        for (unique_id, controller) in discovered {
            let record_id = RecordId::for_device(unique_id);
            seen.insert(record_id);

            if let Some(record) = ctx.disk.remove(&record_id) {
                self.revive(ctx, record, controller, now, &mut outcome);
                continue;
            }

            match ctx.active.get(&record_id).map(|entry| entry.state) {
                None => self.admit(ctx, unique_id, controller, now, &mut outcome),
                Some(state) if state.is_terminal() => {
                    debug!(%unique_id, %record_id, "device was pruned earlier; ignoring");
                }
                Some(LifecycleState::Offline) => {
                    if let Some(entry) = ctx.active.remove(&record_id) {
                        self.revive(ctx, entry.record, controller, now, &mut outcome);
                    }
                }
                Some(_) => {
                    if let Some(entry) = ctx.active.get_mut(&record_id) {
                        if entry.record.merge_from(controller) {
                            debug!(%unique_id, %record_id, "live device changed; updating");
                            outcome.to_update.push(entry.record.clone());
                        }
                        entry.record.mark_seen(now);
                    }
                }
            }
        }

        let offline = mark_unseen(ctx, &seen);

        info!(
            discovered = discovered.len(),
            register = outcome.to_register.len(),
            update = outcome.to_update.len(),
            prune = outcome.to_prune.len(),
            offline,
            "reconciliation pass decided"
        );
        outcome
    }

    /// A known record whose device reappeared: check policy, then
    /// freshness, then merge.
    fn revive(
        &self,
        ctx: &mut ReconcileContext,
        mut record: AccessoryRecord,
        controller: &DeviceController,
        now: DateTime<Utc>,
        outcome: &mut ReconcileOutcome,
    ) {
        let record_id = record.record_id;
        let unique_id = record.unique_id().clone();

        let verdict = if self.policy.is_allowed(&unique_id) {
            self.freshness.check(&record)
        } else {
            Freshness::Stale(PruneReason::DisallowedByPolicy)
        };

        if let Freshness::Stale(reason) = verdict {
            info!(
                %unique_id,
                %record_id,
                display_name = %record.display_name,
                restarts_since_seen = record.restarts_since_seen,
                reason = reason.as_str(),
                "pruning accessory"
            );
            outcome.to_prune.push(PruneAction {
                record: record.clone(),
                reason,
            });
            insert_entry(ctx, record, LifecycleState::Offline, LifecycleState::Pruned);
            return;
        }

        record.merge_from(controller);
        record.mark_seen(now);
        debug!(%unique_id, %record_id, ip = %record.proto_device.ip_address, "accessory back online");
        outcome.to_update.push(record.clone());
        insert_entry(ctx, record, LifecycleState::Offline, LifecycleState::Active);
    }

    /// A device with no record anywhere.
    fn admit(
        &self,
        ctx: &mut ReconcileContext,
        unique_id: &UniqueId,
        controller: &DeviceController,
        now: DateTime<Utc>,
        outcome: &mut ReconcileOutcome,
    ) {
        if !self.policy.is_allowed(unique_id) {
            warn!(
                %unique_id,
                ip = %controller.identity.ip_address,
                mode = %self.policy.mode(),
                "skipping device rejected by device policy"
            );
            return;
        }

        let name = default_display_name(controller, self.names_with_mac_address);
        let record = AccessoryRecord::new(controller, name, now);
        info!(
            %unique_id,
            record_id = %record.record_id,
            display_name = %record.display_name,
            description = %record.device_api.description,
            "registering new accessory"
        );
        outcome.to_register.push(record.clone());
        insert_entry(ctx, record, LifecycleState::Unknown, LifecycleState::New);
    }
}

fn insert_entry(
    ctx: &mut ReconcileContext,
    record: AccessoryRecord,
    from: LifecycleState,
    state: LifecycleState,
) {
    debug_assert!(
        from.can_transition_to(state),
        "illegal lifecycle transition {from} -> {state}"
    );
    ctx.active.insert(record.record_id, ActiveEntry { record, state });
}

/// Count a miss against everything not seen this pass. Returns the size
/// of the offline set.
fn mark_unseen(ctx: &mut ReconcileContext, seen: &HashSet<RecordId>) -> usize {
    let mut offline = 0;
    for record in ctx.disk.values_mut() {
        record.mark_missed();
        offline += 1;
    }
    for (id, entry) in &mut ctx.active {
        if seen.contains(id) {
            continue;
        }
        match entry.state {
            LifecycleState::Active => {
                debug!(record_id = %id, "accessory went offline");
                debug_assert!(entry.state.can_transition_to(LifecycleState::Offline));
                entry.state = LifecycleState::Offline;
                entry.record.mark_missed();
                offline += 1;
            }
            LifecycleState::Offline => {
                entry.record.mark_missed();
                offline += 1;
            }
            // Not yet confirmed by the bridge; it stays pending.
            LifecycleState::New => entry.record.mark_missed(),
            LifecycleState::Unknown | LifecycleState::Pruned => {}
        }
    }
    offline
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceCapability, DeviceIdentity};
    use crate::policy::PolicyMode;
    use pretty_assertions::assert_eq;

    fn controller(unique_id: &str, ip: &str) -> DeviceController {
        DeviceController {
            identity: DeviceIdentity {
                unique_id: UniqueId::new(unique_id),
                ip_address: ip.parse().unwrap(),
                model_number: "AK001-ZJ2149".into(),
            },
            capability: DeviceCapability::new("RGBW Bulb"),
            state: None,
            model_code: Some(0x44),
        }
    }

    fn snapshot(controllers: &[DeviceController]) -> Snapshot {
        controllers
            .iter()
            .map(|c| (c.unique_id().clone(), c.clone()))
            .collect()
    }

    fn persisted(unique_id: &str, name: &str, restarts: u32) -> AccessoryRecord {
        let mut record = AccessoryRecord::new(
            &controller(unique_id, "192.168.1.40"),
            name.to_owned(),
            Utc::now(),
        );
        record.restarts_since_seen = restarts;
        record
    }

    fn id(unique_id: &str) -> RecordId {
        RecordId::for_device(&UniqueId::new(unique_id))
    }

    fn engine(prune_restarts: Option<u32>) -> Reconciler {
        Reconciler::new(DevicePolicy::default(), FreshnessPolicy::new(prune_restarts))
    }

    // ── Admission ────────────────────────────────────────────────────

    #[test]
    fn new_device_is_registered() {
        let mut ctx = ReconcileContext::default();
        let out = engine(None).reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.2")]));

        assert_eq!(out.to_register.len(), 1);
        assert_eq!(out.to_register[0].record_id, id("A1"));
        assert_eq!(out.to_register[0].restarts_since_seen, 0);
        assert_eq!(out.to_register[0].display_name, "RGBW Bulb");
        assert!(out.to_update.is_empty());
        assert_eq!(ctx.lifecycle(&id("A1")), LifecycleState::New);
    }

    #[test]
    fn second_pass_with_same_snapshot_registers_nothing() {
        let mut ctx = ReconcileContext::default();
        let snap = snapshot(&[controller("A1", "10.0.0.2"), controller("B2", "10.0.0.3")]);
        let engine = engine(None);

        let first = engine.reconcile(&mut ctx, &snap);
        assert_eq!(first.to_register.len(), 2);
        ctx.confirm_registered(first.to_register.iter().map(|r| &r.record_id));

        let second = engine.reconcile(&mut ctx, &snap);
        assert!(second.is_empty(), "unexpected batches: {second:?}");
        assert_eq!(ctx.lifecycle(&id("A1")), LifecycleState::Active);
    }

    #[test]
    fn live_device_ip_change_emits_update() {
        let mut ctx = ReconcileContext::default();
        let engine = engine(None);
        let first = engine.reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.2")]));
        ctx.confirm_registered(first.to_register.iter().map(|r| &r.record_id));

        let moved = engine.reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.9")]));
        assert!(moved.to_register.is_empty());
        assert_eq!(moved.to_update.len(), 1);
        assert_eq!(moved.to_update[0].proto_device.ip_address.to_string(), "10.0.0.9");
    }

    #[test]
    fn mac_suffixed_names() {
        let mut ctx = ReconcileContext::default();
        let out = engine(None)
            .with_mac_suffixed_names(true)
            .reconcile(&mut ctx, &snapshot(&[controller("ACCF23A1B2C3", "10.0.0.2")]));
        assert_eq!(out.to_register[0].display_name, "RGBW Bulb A1B2C3");
    }

    // ── Policy ───────────────────────────────────────────────────────

    #[test]
    fn whitelist_admits_listed_device_only() {
        let policy = DevicePolicy::new(PolicyMode::Whitelist, [UniqueId::new("A")]);
        let engine = Reconciler::new(policy, FreshnessPolicy::default());
        let mut ctx = ReconcileContext::default();

        let out = engine.reconcile(
            &mut ctx,
            &snapshot(&[controller("A", "10.0.0.2"), controller("B", "10.0.0.3")]),
        );
        assert_eq!(out.to_register.len(), 1);
        assert_eq!(out.to_register[0].record_id, id("A"));
        assert_eq!(ctx.lifecycle(&id("B")), LifecycleState::Unknown);
    }

    #[test]
    fn blacklist_rejects_listed_device_only() {
        let policy = DevicePolicy::new(PolicyMode::Blacklist, [UniqueId::new("A")]);
        let engine = Reconciler::new(policy, FreshnessPolicy::default());
        let mut ctx = ReconcileContext::default();

        let out = engine.reconcile(
            &mut ctx,
            &snapshot(&[controller("A", "10.0.0.2"), controller("B", "10.0.0.3")]),
        );
        assert_eq!(out.to_register.len(), 1);
        assert_eq!(out.to_register[0].record_id, id("B"));
        assert!(out.to_prune.is_empty());
    }

    #[test]
    fn disallowed_persisted_device_is_pruned_and_tombstoned() {
        let policy = DevicePolicy::new(PolicyMode::Blacklist, [UniqueId::new("A")]);
        let engine = Reconciler::new(policy, FreshnessPolicy::default());
        let mut ctx = ReconcileContext::from_disk([persisted("A", "Lamp", 0)]);
        let snap = snapshot(&[controller("A", "10.0.0.2")]);

        let out = engine.reconcile(&mut ctx, &snap);
        assert_eq!(out.to_prune.len(), 1);
        assert_eq!(out.to_prune[0].reason, PruneReason::DisallowedByPolicy);
        assert!(out.to_update.is_empty());
        assert_eq!(ctx.lifecycle(&id("A")), LifecycleState::Pruned);

        let again = engine.reconcile(&mut ctx, &snap);
        assert!(again.is_empty());
    }

    // ── Offline bookkeeping ──────────────────────────────────────────

    #[test]
    fn absent_disk_record_increments_once_and_is_not_pruned() {
        let mut ctx = ReconcileContext::from_disk([persisted("A1", "Lamp", 0)]);
        let out = engine(Some(1)).reconcile(&mut ctx, &Snapshot::new());

        assert!(out.is_empty());
        assert_eq!(ctx.disk_record(&id("A1")).unwrap().restarts_since_seen, 1);
        assert_eq!(ctx.offline_records().len(), 1);
    }

    #[test]
    fn offline_records_are_never_pruned_while_absent() {
        let mut ctx = ReconcileContext::from_disk([persisted("A1", "delete me", 50)]);
        let engine = engine(Some(3));
        for _ in 0..5 {
            assert!(engine.reconcile(&mut ctx, &Snapshot::new()).is_empty());
        }
        assert_eq!(ctx.disk_record(&id("A1")).unwrap().restarts_since_seen, 55);
    }

    #[test]
    fn reappearance_resets_restarts() {
        let mut ctx = ReconcileContext::from_disk([persisted("A1", "Lamp", 2)]);
        let out = engine(Some(5)).reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.7")]));

        assert_eq!(out.to_update.len(), 1);
        let updated = &out.to_update[0];
        assert_eq!(updated.restarts_since_seen, 0);
        assert_eq!(updated.proto_device.ip_address.to_string(), "10.0.0.7");
        assert_eq!(ctx.lifecycle(&id("A1")), LifecycleState::Active);
        assert_eq!(ctx.disk_len(), 0);
    }

    #[test]
    fn active_device_goes_offline_then_returns() {
        let mut ctx = ReconcileContext::default();
        let engine = engine(None);
        let first = engine.reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.2")]));
        ctx.confirm_registered(first.to_register.iter().map(|r| &r.record_id));

        engine.reconcile(&mut ctx, &Snapshot::new());
        let entry = ctx.active_entry(&id("A1")).unwrap();
        assert_eq!(entry.state, LifecycleState::Offline);
        assert_eq!(entry.record.restarts_since_seen, 1);

        let back = engine.reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.2")]));
        assert_eq!(back.to_update.len(), 1);
        assert_eq!(back.to_update[0].restarts_since_seen, 0);
        assert_eq!(ctx.lifecycle(&id("A1")), LifecycleState::Active);
    }

    // ── Freshness ────────────────────────────────────────────────────

    #[test]
    fn threshold_prunes_on_reappearance() {
        let mut ctx = ReconcileContext::from_disk([persisted("A1", "Lamp", 3)]);
        let out = engine(Some(3)).reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.2")]));

        assert!(out.to_update.is_empty());
        assert_eq!(out.to_prune.len(), 1);
        assert_eq!(out.to_prune[0].reason, PruneReason::StaleBeyondThreshold);
    }

    #[test]
    fn deletion_marker_prunes_regardless_of_restarts() {
        let mut ctx = ReconcileContext::from_disk([persisted("A1", "Old lamp - DeLeTe", 0)]);
        let out = engine(None).reconcile(&mut ctx, &snapshot(&[controller("A1", "10.0.0.2")]));

        assert_eq!(out.to_prune.len(), 1);
        assert_eq!(out.to_prune[0].reason, PruneReason::MarkedForDeletion);
    }

    #[test]
    fn pruned_device_is_not_recreated() {
        let mut ctx = ReconcileContext::from_disk([persisted("A1", "delete", 0)]);
        let engine = engine(None);
        let snap = snapshot(&[controller("A1", "10.0.0.2")]);

        assert_eq!(engine.reconcile(&mut ctx, &snap).to_prune.len(), 1);
        let again = engine.reconcile(&mut ctx, &snap);
        assert!(again.is_empty());
        assert!(ctx.records_to_persist().is_empty());
    }

    #[test]
    fn end_to_end_offline_then_stale() {
        let mut ctx = ReconcileContext::from_disk([persisted("id1", "Lamp", 2)]);
        let engine = engine(Some(3));

        let first = engine.reconcile(&mut ctx, &Snapshot::new());
        assert!(first.to_prune.is_empty());
        let record = ctx.disk_record(&id("id1")).unwrap();
        assert_eq!(record.restarts_since_seen, 3);

        let second = engine.reconcile(&mut ctx, &snapshot(&[controller("id1", "10.0.0.2")]));
        assert_eq!(second.to_prune.len(), 1);
        assert_eq!(second.to_prune[0].record.record_id, id("id1"));
        assert_eq!(second.to_prune[0].reason, PruneReason::StaleBeyondThreshold);
        assert!(second.to_update.is_empty());
        assert_eq!(ctx.lifecycle(&id("id1")), LifecycleState::Pruned);
    }

    // ── Registry invariants ──────────────────────────────────────────

    #[test]
    fn record_lives_in_one_registry_only() {
        let mut ctx = ReconcileContext::from_disk([
            persisted("A1", "Lamp", 0),
            persisted("B2", "Strip", 0),
        ]);
        let outcome = engine(None).reconcile(
            &mut ctx,
            &snapshot(&[controller("A1", "10.0.0.2"), controller("C3", "10.0.0.4")]),
        );

        for unique_id in ["A1", "B2", "C3"] {
            let rid = id(unique_id);
            let in_disk = ctx.disk_record(&rid).is_some();
            let in_active = ctx.active_entry(&rid).is_some();
            assert!(in_disk ^ in_active, "{unique_id} in disk={in_disk} active={in_active}");
        }

        // C3 is pending until the bridge accepts it.
        assert_eq!(ctx.records_to_persist().len(), 2);
        ctx.confirm_registered(outcome.to_register.iter().map(|r| &r.record_id));
        assert_eq!(ctx.records_to_persist().len(), 3);
    }

    #[test]
    fn prune_batches_group_by_reason() {
        let policy = DevicePolicy::new(PolicyMode::Blacklist, [UniqueId::new("C3")]);
        let engine = Reconciler::new(policy, FreshnessPolicy::new(Some(2)));
        let mut ctx = ReconcileContext::from_disk([
            persisted("A1", "delete", 0),
            persisted("B2", "Strip", 4),
            persisted("C3", "Bulb", 0),
            persisted("D4", "Old delete", 9),
        ]);
        let out = engine.reconcile(
            &mut ctx,
            &snapshot(&[
                controller("A1", "10.0.0.2"),
                controller("B2", "10.0.0.3"),
                controller("C3", "10.0.0.4"),
                controller("D4", "10.0.0.5"),
            ]),
        );

        let batches = out.prune_batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[&PruneReason::MarkedForDeletion].len(), 2);
        assert_eq!(batches[&PruneReason::StaleBeyondThreshold].len(), 1);
        assert_eq!(batches[&PruneReason::DisallowedByPolicy].len(), 1);
    }
}
