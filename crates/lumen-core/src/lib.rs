//! Reconciliation layer between `lumen-api` and the `lumen` binary.
//!
//! This crate owns the decision logic, domain model, and platform
//! lifecycle for bridging LAN lighting controllers into a host registry:
//!
//! - **[`Platform`]** — Central facade. [`start()`](Platform::start) loads
//!   the accessory cache, [`rescan()`](Platform::rescan) runs one guarded
//!   pass, [`spawn_periodic()`](Platform::spawn_periodic) schedules more,
//!   and [`shutdown()`](Platform::shutdown) persists everything back.
//!
//! - **[`Reconciler`]** — Pure engine. Given a discovery [`Snapshot`] and a
//!   [`ReconcileContext`], decides the register, update, and prune batches
//!   while enforcing [`DevicePolicy`] and [`FreshnessPolicy`].
//!
//! - **Adapters** — [`DiscoverySource`] produces snapshots ([`LanDiscovery`]
//!   over UDP/TCP); [`BridgeAdapter`] executes batches ([`HttpBridge`],
//!   or [`LogBridge`] for dry runs).
//!
//! - **Binding** — [`capability::bind`] maps a record's description to a
//!   closed [`CapabilityKind`]; results live in the reactive
//!   [`AccessoryStore`].
//!
//! - **Domain model** ([`model`]) — [`AccessoryRecord`] plus the
//!   [`UniqueId`] / [`RecordId`] identity pair.

pub mod bridge;
pub mod cache;
pub mod capability;
pub mod config;
pub mod discovery;
pub mod error;
pub mod freshness;
pub mod lifecycle;
pub mod model;
pub mod platform;
pub mod policy;
pub mod reconcile;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{BridgeAdapter, BridgeError, HttpBridge, LogBridge};
pub use cache::{AccessoryCache, LoadedCache, MalformedEntry};
pub use capability::{BindingError, BoundAccessory, CapabilityKind, Characteristic};
pub use config::{BridgeConfig, DeviceManagement, DiscoveryConfig, PlatformConfig};
pub use discovery::{DiscoverySource, LanDiscovery};
pub use error::CoreError;
pub use freshness::{Freshness, FreshnessPolicy, PruneReason};
pub use lifecycle::LifecycleState;
pub use platform::{PassReport, Platform};
pub use policy::{DevicePolicy, PolicyMode};
pub use reconcile::{
    ActiveEntry, PruneAction, ReconcileContext, ReconcileOutcome, Reconciler, Snapshot,
};
pub use store::AccessoryStore;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AccessoryRecord, DeviceCapability, DeviceController, DeviceIdentity, DeviceState, RecordId,
    UniqueId,
};
