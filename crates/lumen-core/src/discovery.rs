// ── Discovery sources ──
//
// Produce point-in-time snapshots of controllers on the network, and
// rehydrate persisted records into controllers without network traffic.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use lumen_api::device_query::CONTROL_PORT;
use lumen_api::{ProbeConfig, ProbeReply};

use crate::config::DiscoveryConfig;
use crate::error::CoreError;
use crate::model::{DeviceCapability, DeviceController, DeviceIdentity, UniqueId};
use crate::reconcile::Snapshot;

pub use lumen_api::discovery::{DISCOVERY_PORT, parse_target};

#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Scan the network once. Fails only if the scan itself could not run.
    async fn discover_controllers(&self) -> Result<Snapshot, CoreError>;

    /// Build controllers for an offline record from what was persisted.
    fn create_custom_controllers(
        &self,
        proto_device: &DeviceIdentity,
        device_api: &DeviceCapability,
    ) -> Vec<DeviceController> {
        vec![DeviceController::rehydrate(proto_device, device_api)]
    }
}

// ── LanDiscovery ────────────────────────────────────────────────────

/// UDP broadcast probe followed by a concurrent TCP state query.
#[derive(Debug, Clone)]
pub struct LanDiscovery {
    probe: ProbeConfig,
    query_timeout: Duration,
    control_port: u16,
}

impl LanDiscovery {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            probe: ProbeConfig {
                targets: config.targets(),
                timeout: config.timeout,
                ..ProbeConfig::default()
            },
            query_timeout: config.query_timeout,
            control_port: CONTROL_PORT,
        }
    }

    /// Override the local probe socket address.
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.probe.bind = bind;
        self
    }

    /// Override the controller TCP port.
    pub fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    fn identity(reply: &ProbeReply) -> DeviceIdentity {
        DeviceIdentity {
            unique_id: UniqueId::new(&reply.unique_id),
            ip_address: reply.ip,
            model_number: reply.model_number.clone(),
        }
    }
}

#[async_trait]
impl DiscoverySource for LanDiscovery {
    async fn discover_controllers(&self) -> Result<Snapshot, CoreError> {
        let replies = lumen_api::probe(&self.probe).await.map_err(|e| {
            CoreError::DiscoveryFailed {
                reason: e.to_string(),
            }
        })?;

        let addrs: Vec<SocketAddr> = replies
            .iter()
            .map(|r| SocketAddr::new(r.ip, self.control_port))
            .collect();
        let states = lumen_api::query_all(&addrs, self.query_timeout).await;

        let mut snapshot = Snapshot::new();
        for (reply, (addr, state)) in replies.iter().zip(states) {
            let identity = Self::identity(reply);
            if identity.unique_id.is_empty() {
                debug!(%addr, "ignoring reply with empty unique id");
                continue;
            }
            let state = match state {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!(
                        unique_id = %identity.unique_id,
                        %addr,
                        error = %e,
                        "state query failed; capability unknown"
                    );
                    None
                }
            };
            let controller = DeviceController::new(identity, state.as_ref());
            snapshot.insert(controller.unique_id().clone(), controller);
        }

        info!(
            found = snapshot.len(),
            targets = self.probe.targets.len(),
            "discovery complete"
        );
        Ok(snapshot)
    }
}
