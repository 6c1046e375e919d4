// ── Accessory records ──
//
// The persisted form of a device. Records survive restarts through the
// cache and are the unit the bridge registers, updates, and prunes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use super::device::{DeviceCapability, DeviceController, DeviceIdentity};
use super::identity::{RecordId, UniqueId};

/// Case-insensitive substring in a display name that asks for removal.
pub const DELETION_MARKER: &str = "delete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryRecord {
    pub record_id: RecordId,
    pub display_name: String,
    pub proto_device: DeviceIdentity,
    pub device_api: DeviceCapability,
    /// Reconciliation passes since the device was last observed.
    #[serde(default)]
    pub restarts_since_seen: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl AccessoryRecord {
    /// Create a record for a first-seen controller.
    pub fn new(controller: &DeviceController, display_name: String, now: DateTime<Utc>) -> Self {
        Self {
            record_id: RecordId::for_device(controller.unique_id()),
            display_name,
            proto_device: controller.identity.clone(),
            device_api: controller.capability.clone(),
            restarts_since_seen: 0,
            last_seen: Some(now),
        }
    }

    /// Stand-in for a persisted record whose body could not be decoded.
    /// Carries only what the bridge needs to unregister it.
    pub fn placeholder(record_id: RecordId, display_name: String) -> Self {
        Self {
            record_id,
            display_name,
            proto_device: DeviceIdentity {
                unique_id: UniqueId::new(""),
                ip_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                model_number: String::new(),
            },
            device_api: DeviceCapability::unknown(),
            restarts_since_seen: 0,
            last_seen: None,
        }
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.proto_device.unique_id
    }

    /// Fold a fresh observation into the record. Returns `true` if the
    /// identity or capability changed.
    ///
    /// An unknown capability never overwrites a known one: a controller
    /// that failed its state query keeps the description it had.
    pub fn merge_from(&mut self, controller: &DeviceController) -> bool {
        let mut changed = false;
        if self.proto_device != controller.identity {
            self.proto_device = controller.identity.clone();
            changed = true;
        }
        let keep_known = controller.capability.is_unknown() && !self.device_api.is_unknown();
        if !keep_known && self.device_api != controller.capability {
            self.device_api = controller.capability.clone();
            changed = true;
        }
        changed
    }

    pub fn mark_seen(&mut self, now: DateTime<Utc>) {
        self.restarts_since_seen = 0;
        self.last_seen = Some(now);
    }

    pub fn mark_missed(&mut self) {
        self.restarts_since_seen = self.restarts_since_seen.saturating_add(1);
    }

    pub fn has_deletion_marker(&self) -> bool {
        self.display_name.to_lowercase().contains(DELETION_MARKER)
    }
}

/// Display name for a newly discovered controller.
pub fn default_display_name(controller: &DeviceController, with_mac_suffix: bool) -> String {
    let base = if controller.capability.is_unknown() {
        controller.identity.model_number.as_str()
    } else {
        controller.capability.description.as_str()
    };
    if with_mac_suffix {
        format!("{base} {}", controller.unique_id().short_suffix())
    } else {
        base.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn controller(ip: &str, description: &str) -> DeviceController {
        DeviceController {
            identity: DeviceIdentity {
                unique_id: UniqueId::new("ACCF23A1B2C3"),
                ip_address: ip.parse().unwrap(),
                model_number: "AK001-ZJ2149".into(),
            },
            capability: DeviceCapability::new(description),
            state: None,
            model_code: None,
        }
    }

    fn porch() -> AccessoryRecord {
        let c = controller("192.168.1.40", "RGBW Bulb");
        AccessoryRecord::new(&c, "Porch".into(), Utc::now())
    }

    #[test]
    fn new_record_derives_id_from_unique_id() {
        let c = controller("192.168.1.40", "RGBW Bulb");
        let record = AccessoryRecord::new(&c, "Porch".into(), Utc::now());
        assert_eq!(record.record_id, RecordId::for_device(c.unique_id()));
        assert_eq!(record.restarts_since_seen, 0);
        assert!(record.last_seen.is_some());
    }

    #[test]
    fn merge_detects_ip_change() {
        let mut record = porch();
        assert!(!record.merge_from(&controller("192.168.1.40", "RGBW Bulb")));
        assert!(record.merge_from(&controller("192.168.1.41", "RGBW Bulb")));
        assert_eq!(record.proto_device.ip_address.to_string(), "192.168.1.41");
    }

    #[test]
    fn merge_keeps_known_capability_over_unknown() {
        let mut record = porch();
        let mut offline = controller("192.168.1.40", "RGBW Bulb");
        offline.capability = DeviceCapability::unknown();

        assert!(!record.merge_from(&offline));
        assert_eq!(record.device_api.description, "RGBW Bulb");
    }

    #[test]
    fn merge_upgrades_unknown_capability() {
        let c = controller("192.168.1.40", "Unknown");
        let mut record = AccessoryRecord::new(&c, "Porch".into(), Utc::now());
        assert!(record.merge_from(&controller("192.168.1.40", "CCT Bulb")));
        assert_eq!(record.device_api.description, "CCT Bulb");
    }

    #[test]
    fn deletion_marker_is_case_insensitive() {
        let mut record = porch();
        assert!(!record.has_deletion_marker());
        record.display_name = "Porch DELETE me".into();
        assert!(record.has_deletion_marker());
    }

    #[test]
    fn missed_and_seen_track_restarts() {
        let mut record = porch();
        record.mark_missed();
        record.mark_missed();
        assert_eq!(record.restarts_since_seen, 2);
        record.mark_seen(Utc::now());
        assert_eq!(record.restarts_since_seen, 0);
    }

    #[test]
    fn display_name_with_mac_suffix() {
        let c = controller("192.168.1.40", "RGBW Bulb");
        assert_eq!(default_display_name(&c, false), "RGBW Bulb");
        assert_eq!(default_display_name(&c, true), "RGBW Bulb A1B2C3");

        let unknown = controller("192.168.1.40", "Unknown");
        assert_eq!(default_display_name(&unknown, false), "AK001-ZJ2149");
    }
}
