// ── Freshness ──
//
// Decides whether a record that is about to be revived should instead be
// pruned. The deletion marker wins over the restart threshold.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::model::AccessoryRecord;

/// Why a record is removed from the bridge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum PruneReason {
    #[strum(serialize = "marked for deletion")]
    MarkedForDeletion,
    #[strum(serialize = "stale beyond restart threshold")]
    StaleBeyondThreshold,
    #[strum(serialize = "disallowed by device policy")]
    DisallowedByPolicy,
    #[strum(serialize = "malformed persisted record")]
    MalformedRecord,
}

impl PruneReason {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(PruneReason),
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// Passes a record may go unseen before it is stale. `None` disables
    /// restart-based pruning.
    prune_restarts: Option<u32>,
}

impl FreshnessPolicy {
    pub fn new(prune_restarts: Option<u32>) -> Self {
        Self { prune_restarts }
    }

    pub fn prune_restarts(&self) -> Option<u32> {
        self.prune_restarts
    }

    pub fn check(&self, record: &AccessoryRecord) -> Freshness {
        if record.has_deletion_marker() {
            return Freshness::Stale(PruneReason::MarkedForDeletion);
        }
        match self.prune_restarts {
            Some(threshold) if record.restarts_since_seen >= threshold => {
                Freshness::Stale(PruneReason::StaleBeyondThreshold)
            }
            _ => Freshness::Fresh,
        }
    }
}
