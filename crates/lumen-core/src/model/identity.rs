// ── Core identity types ──
//
// UniqueId and RecordId form the foundation of every record the engine
// tracks. A RecordId is always derived from a UniqueId, never assigned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ── UniqueId ────────────────────────────────────────────────────────

/// Hardware identifier reported by a controller, normalized to bare
/// uppercase hex (`ACCF23A1B2C3`).
///
/// Separators and surrounding whitespace are stripped, so
/// `ac:cf:23:a1:b2:c3` and `AC-CF-23-A1-B2-C3` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UniqueId(String);

impl UniqueId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw
            .as_ref()
            .chars()
            .filter(|c| !matches!(c, ':' | '-') && !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trailing six characters, used to disambiguate display names.
    pub fn short_suffix(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(5)
            .map_or(0, |(idx, _)| idx);
        &self.0[start..]
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UniqueId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for UniqueId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for UniqueId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<UniqueId> for String {
    fn from(id: UniqueId) -> Self {
        id.0
    }
}

// ── RecordId ────────────────────────────────────────────────────────

/// Namespace for deriving record ids. Changing it orphans every cache.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x3f1c_8a2e_5b7d_5e41_9c06_d2a4_7be1_f058);

/// Stable record identifier: a name-based (v5) UUID of the [`UniqueId`].
///
/// The same controller always maps to the same record across restarts,
/// which is what lets a persisted record be matched to a rediscovered
/// device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn for_device(unique_id: &UniqueId) -> Self {
        Self(Uuid::new_v5(&RECORD_NAMESPACE, unique_id.as_str().as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RecordId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unique_id_strips_separators_and_uppercases() {
        assert_eq!(UniqueId::new("ac:cf:23:a1:b2:c3").as_str(), "ACCF23A1B2C3");
        assert_eq!(UniqueId::new(" AC-CF-23-A1-B2-C3 ").as_str(), "ACCF23A1B2C3");
        assert_eq!(UniqueId::new("accf23a1b2c3"), UniqueId::new("ACCF23A1B2C3"));
    }

    #[test]
    fn unique_id_deserialize_normalizes() {
        let id: UniqueId = serde_json::from_str("\"ac:cf:23:a1:b2:c3\"").unwrap();
        assert_eq!(id.as_str(), "ACCF23A1B2C3");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ACCF23A1B2C3\"");
    }

    #[test]
    fn short_suffix_takes_last_six() {
        assert_eq!(UniqueId::new("ACCF23A1B2C3").short_suffix(), "A1B2C3");
        assert_eq!(UniqueId::new("B2C3").short_suffix(), "B2C3");
    }

    #[test]
    fn record_id_is_stable_per_device() {
        let a = RecordId::for_device(&UniqueId::new("ACCF23A1B2C3"));
        let b = RecordId::for_device(&UniqueId::new("ac:cf:23:a1:b2:c3"));
        let c = RecordId::for_device(&UniqueId::new("600194D4E5F6"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_uuid().get_version_num(), 5);
    }

    #[test]
    fn record_id_parses_round_trip() {
        let id = RecordId::for_device(&UniqueId::new("ACCF23A1B2C3"));
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }
}
