// ── Runtime platform configuration ──
//
// These types describe how the platform discovers, filters, and prunes.
// They never touch disk: the CLI builds a `PlatformConfig` from its config
// file and hands it in.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use lumen_api::discovery::DISCOVERY_PORT;

use crate::freshness::FreshnessPolicy;
use crate::model::UniqueId;
use crate::policy::{DevicePolicy, PolicyMode};

/// Allow/deny list for discovered devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceManagement {
    pub mode: PolicyMode,
    pub unique_ids: Vec<UniqueId>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub broadcast_address: SocketAddr,
    /// Extra broadcast targets, probed alongside the primary address.
    pub additional_targets: Vec<SocketAddr>,
    /// How long to collect probe replies.
    pub timeout: Duration,
    /// Bound on each per-device state query.
    pub query_timeout: Duration,
    /// Interval between periodic rescans. Zero disables them.
    pub rescan_interval: Duration,
}

impl DiscoveryConfig {
    pub fn targets(&self) -> Vec<SocketAddr> {
        let mut targets = vec![self.broadcast_address];
        for extra in &self.additional_targets {
            if !targets.contains(extra) {
                targets.push(*extra);
            }
        }
        targets
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), DISCOVERY_PORT),
            additional_targets: Vec::new(),
            timeout: Duration::from_millis(2000),
            query_timeout: Duration::from_millis(1500),
            rescan_interval: Duration::from_secs(60),
        }
    }
}

pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8581/";

/// Where and how to reach the host bridge registry.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub url: Url,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_BRIDGE_URL).expect("default bridge URL is valid"),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Full runtime configuration for a [`Platform`](crate::Platform).
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    pub device_management: DeviceManagement,
    /// Passes a record may go unseen before it is pruned on reappearance.
    pub prune_restarts: Option<u32>,
    pub discovery: DiscoveryConfig,
    pub bridge: BridgeConfig,
    /// Append the unique id suffix to new display names.
    pub names_with_mac_address: bool,
    /// Accessory cache location. `None` keeps records in memory only.
    pub cache_path: Option<PathBuf>,
    /// Load the cache but never write it back (dry runs).
    pub read_only_cache: bool,
}

impl PlatformConfig {
    pub fn policy(&self) -> DevicePolicy {
        DevicePolicy::new(
            self.device_management.mode,
            self.device_management.unique_ids.iter().cloned(),
        )
    }

    pub fn freshness(&self) -> FreshnessPolicy {
        FreshnessPolicy::new(self.prune_restarts)
    }
}
