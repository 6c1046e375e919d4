// ── Device domain types ──
//
// A DeviceController is one discovered controller as seen on a single
// pass: who it is, what it can do, and the state it last reported.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use lumen_api::RawState;

use super::identity::UniqueId;
use crate::capability;

/// Network-visible identity of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub unique_id: UniqueId,
    pub ip_address: IpAddr,
    pub model_number: String,
}

/// Capability descriptor. The description doubles as the capability tag
/// the binder dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapability {
    pub description: String,
}

impl DeviceCapability {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// The capability of a controller whose state could not be read.
    pub fn unknown() -> Self {
        Self::new(capability::UNKNOWN_DESCRIPTION)
    }

    pub fn from_model_code(code: u8) -> Self {
        Self::new(capability::description_for_model(code))
    }

    pub fn is_unknown(&self) -> bool {
        self.description == capability::UNKNOWN_DESCRIPTION
    }
}

/// Last state a controller reported over the control port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub is_on: bool,
    pub mode: u8,
    pub speed: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub warm_white: u8,
    pub cool_white: u8,
    pub firmware_version: u8,
}

impl DeviceState {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }

    pub fn has_color(&self) -> bool {
        self.red > 0 || self.green > 0 || self.blue > 0
    }
}

impl From<&RawState> for DeviceState {
    fn from(raw: &RawState) -> Self {
        Self {
            is_on: raw.is_on,
            mode: raw.mode,
            speed: raw.speed,
            red: raw.red,
            green: raw.green,
            blue: raw.blue,
            warm_white: raw.warm_white,
            cool_white: raw.cool_white,
            firmware_version: raw.firmware_version,
        }
    }
}

/// A discovered controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceController {
    pub identity: DeviceIdentity,
    pub capability: DeviceCapability,
    pub state: Option<DeviceState>,
    pub model_code: Option<u8>,
}

impl DeviceController {
    /// Build a controller from its identity and the outcome of its state
    /// query. No state means an unknown capability.
    pub fn new(identity: DeviceIdentity, state: Option<&RawState>) -> Self {
        match state {
            Some(raw) => Self {
                identity,
                capability: DeviceCapability::from_model_code(raw.model_code),
                state: Some(DeviceState::from(raw)),
                model_code: Some(raw.model_code),
            },
            None => Self {
                identity,
                capability: DeviceCapability::unknown(),
                state: None,
                model_code: None,
            },
        }
    }

    /// Rehydrate a controller from persisted identity and capability, with
    /// no live state.
    pub fn rehydrate(identity: &DeviceIdentity, capability: &DeviceCapability) -> Self {
        Self {
            identity: identity.clone(),
            capability: capability.clone(),
            state: None,
            model_code: None,
        }
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.identity.unique_id
    }
}
