// ── Capability binding ──
//
// Maps a capability description to a closed set of accessory kinds and
// derives the characteristics each kind exposes. An unlisted description
// fails binding; the record stays tracked but the accessory is inert.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;

use crate::model::{AccessoryRecord, DeviceController, DeviceState, RecordId, UniqueId};

/// Description of a controller whose model is not in the table, or whose
/// state could not be read.
pub const UNKNOWN_DESCRIPTION: &str = "Unknown";

/// Coolest and warmest color temperature, in mireds.
pub const MIN_MIREDS: u16 = 140;
pub const MAX_MIREDS: u16 = 500;

const MODEL_DESCRIPTIONS: &[(u8, &str)] = &[
    (0x33, "RGB Strip"),
    (0x04, "RGBW Strip"),
    (0x06, "RGBW Strip"),
    (0x44, "RGBW Bulb"),
    (0x07, "RGBWW Strip"),
    (0x25, "RGBWW Strip"),
    (0x35, "RGBWW Bulb"),
    (0x52, "CCT Bulb"),
    (0x62, "CCT Strip"),
    (0x41, "Dimmer"),
    (0x97, "Power Socket"),
];

const DESCRIPTION_KINDS: &[(&str, CapabilityKind)] = &[
    ("RGB Strip", CapabilityKind::Rgb),
    ("RGBW Strip", CapabilityKind::Rgbw),
    ("RGBW Bulb", CapabilityKind::Rgbw),
    ("RGBWW Strip", CapabilityKind::Rgbww),
    ("RGBWW Bulb", CapabilityKind::Rgbww),
    ("CCT Bulb", CapabilityKind::Cct),
    ("CCT Strip", CapabilityKind::Cct),
    ("Dimmer", CapabilityKind::Dimmer),
    ("Power Socket", CapabilityKind::Switch),
];

/// Look up the capability description for a controller model code.
pub fn description_for_model(code: u8) -> &'static str {
    MODEL_DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map_or(UNKNOWN_DESCRIPTION, |(_, d)| d)
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("no accessory kind handles capability '{description}'")]
    UnknownCapability { description: String },
}

// ── Kinds ───────────────────────────────────────────────────────────

/// The closed set of accessory kinds a record can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CapabilityKind {
    Rgb,
    Rgbw,
    Rgbww,
    Cct,
    Dimmer,
    Switch,
}

impl CapabilityKind {
    pub fn from_description(description: &str) -> Result<Self, BindingError> {
        DESCRIPTION_KINDS
            .iter()
            .find(|(d, _)| *d == description)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| BindingError::UnknownCapability {
                description: description.to_owned(),
            })
    }

    /// Characteristics this kind exposes for a given state. Without state
    /// every characteristic reports its resting value.
    pub fn characteristics(self, state: Option<&DeviceState>) -> Vec<Characteristic> {
        let state = state.copied().unwrap_or_default();
        let mut out = vec![Characteristic::On(state.is_on)];
        match self {
            Self::Rgb => out.extend(color(&state, 0)),
            Self::Rgbw => out.extend(color(&state, state.warm_white)),
            Self::Rgbww => {
                out.extend(color(&state, state.warm_white.max(state.cool_white)));
                out.push(Characteristic::ColorTemperature(mireds(&state)));
            }
            Self::Cct => {
                out.push(Characteristic::Brightness(percent(
                    state.warm_white.max(state.cool_white),
                )));
                out.push(Characteristic::ColorTemperature(mireds(&state)));
            }
            Self::Dimmer => {
                let level = state.red.max(state.warm_white);
                out.push(Characteristic::Brightness(percent(level)));
            }
            Self::Switch => {}
        }
        out
    }
}

/// One observable value of a bound accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Characteristic {
    On(bool),
    /// Percent, 0-100.
    Brightness(u8),
    /// Degrees, 0-359.
    Hue(u16),
    /// Percent, 0-100.
    Saturation(u8),
    /// Mireds, [`MIN_MIREDS`]-[`MAX_MIREDS`].
    ColorTemperature(u16),
}

// ── Binding ─────────────────────────────────────────────────────────

/// A record bound to its accessory kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundAccessory {
    pub record_id: RecordId,
    pub unique_id: UniqueId,
    pub display_name: String,
    pub description: String,
    pub kind: CapabilityKind,
    pub characteristics: Vec<Characteristic>,
    /// False when bound from persisted data only.
    pub reachable: bool,
}

/// Bind a record and its controller to an accessory kind.
pub fn bind(
    record: &AccessoryRecord,
    controller: &DeviceController,
) -> Result<BoundAccessory, BindingError> {
    let description = record.device_api.description.as_str();
    let kind = CapabilityKind::from_description(description)?;
    Ok(BoundAccessory {
        record_id: record.record_id,
        unique_id: record.unique_id().clone(),
        display_name: record.display_name.clone(),
        description: description.to_owned(),
        kind,
        characteristics: kind.characteristics(controller.state.as_ref()),
        reachable: controller.state.is_some(),
    })
}

// ── Conversions ─────────────────────────────────────────────────────

/// Scale a channel byte to a percentage, rounding to nearest.
fn percent(level: u8) -> u8 {
    let scaled = (u16::from(level) * 100 + 127) / 255;
    u8::try_from(scaled).unwrap_or(100)
}

/// Warm/cool white balance as a color temperature. All-warm is
/// [`MAX_MIREDS`]; all-cool or dark is [`MIN_MIREDS`].
fn mireds(state: &DeviceState) -> u16 {
    let warm = u32::from(state.warm_white);
    let total = warm + u32::from(state.cool_white);
    if total == 0 {
        return MIN_MIREDS;
    }
    let span = u32::from(MAX_MIREDS - MIN_MIREDS);
    let offset = (span * warm + total / 2) / total;
    MIN_MIREDS + u16::try_from(offset).unwrap_or(MAX_MIREDS - MIN_MIREDS)
}

/// Hue, saturation, and brightness for a color channel. A dark color with
/// a lit white channel reports white at the white channel's level.
fn color(state: &DeviceState, white: u8) -> [Characteristic; 3] {
    if !state.has_color() && white > 0 {
        return [
            Characteristic::Hue(0),
            Characteristic::Saturation(0),
            Characteristic::Brightness(percent(white)),
        ];
    }
    let (hue, saturation, value) = rgb_to_hsv(state.rgb());
    [
        Characteristic::Hue(hue),
        Characteristic::Saturation(saturation),
        Characteristic::Brightness(value),
    ]
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions,
    clippy::float_cmp
)]
fn rgb_to_hsv((r, g, b): (u8, u8, u8)) -> (u16, u8, u8) {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if (max - rf).abs() < f32::EPSILON {
        60.0 * ((gf - bf) / delta).rem_euclid(6.0)
    } else if (max - gf).abs() < f32::EPSILON {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

    (
        (hue.round() as u16) % 360,
        saturation.round() as u8,
        percent(max as u8),
    )
}
