// ── Domain model ──

pub mod device;
pub mod identity;
pub mod record;

pub use device::{DeviceCapability, DeviceController, DeviceIdentity, DeviceState};
pub use identity::{RecordId, UniqueId};
pub use record::{AccessoryRecord, DELETION_MARKER, default_display_name};
