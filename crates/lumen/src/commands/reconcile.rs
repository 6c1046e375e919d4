//! Single reconciliation pass.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use lumen_core::{
    AccessoryRecord, LanDiscovery, Platform, PruneReason, ReconcileOutcome, RecordId, UniqueId,
};

use crate::cli::{GlobalOpts, ReconcileArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Plan rows ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Register,
    Update,
    Prune,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Update => "update",
            Self::Prune => "prune",
        }
    }
}

/// One line of a pass plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub action: Action,
    pub record_id: RecordId,
    pub display_name: String,
    pub unique_id: UniqueId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<PruneReason>,
}

impl PlannedAction {
    fn new(action: Action, record: &AccessoryRecord, reason: Option<PruneReason>) -> Self {
        Self {
            action,
            record_id: record.record_id,
            display_name: record.display_name.clone(),
            unique_id: record.unique_id().clone(),
            reason,
        }
    }
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Action")]
    action: &'static str,
    #[tabled(rename = "Record ID")]
    record_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&PlannedAction> for PlanRow {
    fn from(a: &PlannedAction) -> Self {
        Self {
            action: a.action.as_str(),
            record_id: a.record_id.to_string(),
            name: a.display_name.clone(),
            unique_id: a.unique_id.to_string(),
            reason: a.reason.map(|r| r.to_string()).unwrap_or_default(),
        }
    }
}

/// Flatten an outcome into register, update, then prune lines.
pub fn plan_actions(outcome: &ReconcileOutcome) -> Vec<PlannedAction> {
    let registers = outcome
        .to_register
        .iter()
        .map(|r| PlannedAction::new(Action::Register, r, None));
    let updates = outcome
        .to_update
        .iter()
        .map(|r| PlannedAction::new(Action::Update, r, None));
    let prunes = outcome
        .to_prune
        .iter()
        .map(|p| PlannedAction::new(Action::Prune, &p.record, Some(p.reason)));
    registers.chain(updates).chain(prunes).collect()
}

pub fn print_plan(outcome: &ReconcileOutcome, global: &GlobalOpts) {
    let actions = plan_actions(outcome);
    let out = output::render_list(&global.output, &actions, |a| PlanRow::from(a), |a| {
        format!("{} {}", a.action.as_str(), a.record_id)
    });
    output::print_output(&out, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ReconcileArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_platform(global)?;
    cfg.read_only_cache = args.dry_run;

    let discovery = Arc::new(LanDiscovery::new(&cfg.discovery));
    let bridge = util::bridge(&cfg, args.dry_run)?;
    let platform = Platform::start(&cfg, discovery, bridge).await?;

    if args.dry_run {
        let spinner = output::spinner("Planning pass...", global.quiet);
        let planned = platform.plan().await;
        spinner.finish_and_clear();
        let outcome = planned?;
        print_plan(&outcome, global);
        if outcome.is_empty() && !global.quiet {
            eprintln!("Nothing to do");
        }
        return Ok(());
    }

    let spinner = output::spinner("Reconciling...", global.quiet);
    let pass = platform.rescan().await;
    spinner.finish_and_clear();
    // Persist and drain the bridge queue even when the pass was skipped.
    platform.shutdown().await?;
    let report = pass?;

    print_plan(&report.outcome, global);
    if !global.quiet {
        eprintln!(
            "{} discovered, {} registered, {} updated, {} pruned, {} offline, {} bound, {} binding failures",
            report.discovered,
            report.registered,
            report.updated,
            report.pruned,
            report.offline,
            report.bound,
            report.binding_failures,
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lumen_core::{DeviceCapability, DeviceController, DeviceIdentity, PruneAction};

    fn record(unique_id: &str) -> AccessoryRecord {
        let controller = DeviceController::rehydrate(
            &DeviceIdentity {
                unique_id: UniqueId::new(unique_id),
                ip_address: "192.168.1.40".parse().unwrap(),
                model_number: "AK001-ZJ2149".into(),
            },
            &DeviceCapability::new("Dimmer"),
        );
        AccessoryRecord::new(&controller, "Dimmer".into(), Utc::now())
    }

    #[test]
    fn plan_lists_registers_updates_then_prunes() {
        let outcome = ReconcileOutcome {
            to_register: vec![record("A1")],
            to_update: vec![record("B2")],
            to_prune: vec![PruneAction {
                record: record("C3"),
                reason: PruneReason::MarkedForDeletion,
            }],
        };

        let actions = plan_actions(&outcome);
        let kinds: Vec<_> = actions.iter().map(|a| a.action).collect();
        assert_eq!(kinds, vec![Action::Register, Action::Update, Action::Prune]);
        assert_eq!(actions[2].reason, Some(PruneReason::MarkedForDeletion));

        let json = serde_json::to_value(&actions[2]).unwrap();
        assert_eq!(json["action"], "prune");
        assert_eq!(json["reason"], "marked_for_deletion");
        assert_eq!(json["unique_id"], "C3");
        assert!(serde_json::to_value(&actions[0]).unwrap().get("reason").is_none());
    }
}
