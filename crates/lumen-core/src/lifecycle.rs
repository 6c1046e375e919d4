// ── Record lifecycle ──
//
// Unknown → New → Active ⇄ Offline → Pruned. Pruned is terminal for the
// life of the process.

use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// Never seen by this process.
    #[default]
    Unknown,
    /// Submitted for registration, not yet confirmed.
    New,
    /// Registered and seen on the latest pass.
    Active,
    /// Known, but not seen on the latest pass. Persisted records start here.
    Offline,
    /// Unregistered. Never revived.
    Pruned,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unknown, Self::New)
                | (Self::New | Self::Offline, Self::Active)
                | (Self::Active, Self::Offline)
                | (Self::Offline, Self::Pruned)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Pruned)
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::New | Self::Active)
    }

    /// Written to the accessory cache. Only records the bridge has accepted.
    pub fn is_persistent(self) -> bool {
        matches!(self, Self::Active | Self::Offline)
    }
}
