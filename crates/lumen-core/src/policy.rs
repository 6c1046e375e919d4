// ── Device policy ──
//
// Allow/deny filtering by unique id. Evaluated on every pass for every
// device the engine considers admitting.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::UniqueId;

/// How the configured id list is interpreted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PolicyMode {
    /// Only listed devices are admitted.
    Whitelist,
    /// Listed devices are rejected; everything else is admitted.
    #[default]
    Blacklist,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePolicy {
    mode: PolicyMode,
    unique_ids: HashSet<UniqueId>,
}

impl DevicePolicy {
    pub fn new(mode: PolicyMode, unique_ids: impl IntoIterator<Item = UniqueId>) -> Self {
        Self {
            mode,
            unique_ids: unique_ids.into_iter().collect(),
        }
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    pub fn is_allowed(&self, unique_id: &UniqueId) -> bool {
        let listed = self.unique_ids.contains(unique_id);
        match self.mode {
            PolicyMode::Whitelist => listed,
            PolicyMode::Blacklist => !listed,
        }
    }
}
