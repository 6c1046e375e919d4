// ── Bridge adapters ──
//
// Execute reconciliation batches against the host accessory registry.
// Submission is fire-and-forget: an `Err` only means the adapter refused
// the batch, never that the registry rejected it.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lumen_api::{AccessoryPayload, BridgeClient};

use crate::model::AccessoryRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Bridge adapter is closed")]
    Closed,

    #[error("Bridge registry error: {message}")]
    Registry { message: String },
}

#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    fn register_new(&self, records: &[AccessoryRecord]) -> Result<(), BridgeError>;

    fn update_existing(&self, records: &[AccessoryRecord]) -> Result<(), BridgeError>;

    fn unregister(&self, records: &[AccessoryRecord], reason: &str) -> Result<(), BridgeError>;

    /// Stop accepting batches and finish delivering queued ones.
    async fn close(&self) {}
}

impl From<&AccessoryRecord> for AccessoryPayload {
    fn from(record: &AccessoryRecord) -> Self {
        Self {
            record_id: record.record_id.to_string(),
            display_name: record.display_name.clone(),
            unique_id: record.unique_id().to_string(),
            ip_address: record.proto_device.ip_address.to_string(),
            model_number: record.proto_device.model_number.clone(),
            description: record.device_api.description.clone(),
            restarts_since_seen: record.restarts_since_seen,
        }
    }
}

fn payloads(records: &[AccessoryRecord]) -> Vec<AccessoryPayload> {
    records.iter().map(AccessoryPayload::from).collect()
}

// ── HttpBridge ───────────────────────────────────────────────────────

#[derive(Debug)]
enum BridgeRequest {
    Register(Vec<AccessoryPayload>),
    Update(Vec<AccessoryPayload>),
    Unregister {
        accessories: Vec<AccessoryPayload>,
        reason: String,
    },
}

/// Delivers batches to the registry over HTTP from a background worker.
pub struct HttpBridge {
    tx: Mutex<Option<mpsc::UnboundedSender<BridgeRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HttpBridge {
    /// Spawn the delivery worker. Must be called inside a Tokio runtime.
    pub fn spawn(client: BridgeClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(bridge_worker(client, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    fn submit(&self, request: BridgeRequest) -> Result<(), BridgeError> {
        let guard = self.tx.lock().map_err(|_| BridgeError::Closed)?;
        let tx = guard.as_ref().ok_or(BridgeError::Closed)?;
        tx.send(request).map_err(|_| BridgeError::Closed)
    }
}

#[async_trait]
impl BridgeAdapter for HttpBridge {
    fn register_new(&self, records: &[AccessoryRecord]) -> Result<(), BridgeError> {
        self.submit(BridgeRequest::Register(payloads(records)))
    }

    fn update_existing(&self, records: &[AccessoryRecord]) -> Result<(), BridgeError> {
        self.submit(BridgeRequest::Update(payloads(records)))
    }

    fn unregister(&self, records: &[AccessoryRecord], reason: &str) -> Result<(), BridgeError> {
        self.submit(BridgeRequest::Unregister {
            accessories: payloads(records),
            reason: reason.to_owned(),
        })
    }

    async fn close(&self) {
        // Dropping the sender lets the worker drain the queue and exit.
        if let Ok(mut tx) = self.tx.lock() {
            *tx = None;
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "bridge worker terminated abnormally");
            }
        }
    }
}

async fn bridge_worker(client: BridgeClient, mut rx: mpsc::UnboundedReceiver<BridgeRequest>) {
    debug!(url = %client.base_url(), "bridge worker started");
    while let Some(request) = rx.recv().await {
        let (action, count, result) = match &request {
            BridgeRequest::Register(batch) => ("register", batch.len(), client.register(batch).await),
            BridgeRequest::Update(batch) => ("update", batch.len(), client.update(batch).await),
            BridgeRequest::Unregister {
                accessories,
                reason,
            } => (
                "unregister",
                accessories.len(),
                client.unregister(accessories, reason).await,
            ),
        };
        match result {
            Ok(()) => debug!(action, count, "bridge batch delivered"),
            Err(e) => warn!(
                action,
                count,
                transient = e.is_transient(),
                error = %e,
                "bridge registry rejected batch"
            ),
        }
    }
    debug!("bridge worker stopped");
}

// ── LogBridge ────────────────────────────────────────────────────────

/// Dry-run adapter: logs every action and delivers nothing.
#[derive(Debug, Default)]
pub struct LogBridge;

impl LogBridge {
    fn log(action: &str, records: &[AccessoryRecord], reason: Option<&str>) {
        for record in records {
            info!(
                action,
                record_id = %record.record_id,
                unique_id = %record.unique_id(),
                display_name = %record.display_name,
                reason = reason.unwrap_or(""),
                "dry run"
            );
        }
    }
}

#[async_trait]
impl BridgeAdapter for LogBridge {
    fn register_new(&self, records: &[AccessoryRecord]) -> Result<(), BridgeError> {
        Self::log("register", records, None);
        Ok(())
    }

    fn update_existing(&self, records: &[AccessoryRecord]) -> Result<(), BridgeError> {
        Self::log("update", records, None);
        Ok(())
    }

    fn unregister(&self, records: &[AccessoryRecord], reason: &str) -> Result<(), BridgeError> {
        Self::log("unregister", records, Some(reason));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceCapability, DeviceController, DeviceIdentity, UniqueId};
    use chrono::Utc;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> AccessoryRecord {
        let controller = DeviceController {
            identity: DeviceIdentity {
                unique_id: UniqueId::new("ACCF23A1B2C3"),
                ip_address: "192.168.1.40".parse().unwrap(),
                model_number: "AK001-ZJ2149".into(),
            },
            capability: DeviceCapability::new("RGBW Bulb"),
            state: None,
            model_code: None,
        };
        AccessoryRecord::new(&controller, "Porch".into(), Utc::now())
    }

    #[test]
    fn payload_carries_record_fields() {
        let record = record();
        let payload = AccessoryPayload::from(&record);
        assert_eq!(payload.record_id, record.record_id.to_string());
        assert_eq!(payload.unique_id, "ACCF23A1B2C3");
        assert_eq!(payload.ip_address, "192.168.1.40");
        assert_eq!(payload.description, "RGBW Bulb");
    }

    #[test]
    fn log_bridge_accepts_everything() {
        let bridge = LogBridge;
        assert!(bridge.register_new(&[record()]).is_ok());
        assert!(bridge.unregister(&[record()], "marked for deletion").is_ok());
    }

    #[tokio::test]
    async fn http_bridge_delivers_and_drains_on_close() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/accessories"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/accessories/unregister"))
            .and(body_partial_json(serde_json::json!({ "reason": "stale beyond restart threshold" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let bridge = HttpBridge::spawn(client(&server));
        bridge.register_new(&[record()]).unwrap();
        bridge
            .unregister(&[record()], "stale beyond restart threshold")
            .unwrap();
        bridge.close().await;

        assert_eq!(bridge.update_existing(&[record()]), Err(BridgeError::Closed));
    }

    #[tokio::test]
    async fn http_bridge_survives_registry_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/accessories"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let bridge = HttpBridge::spawn(client(&server));
        bridge.update_existing(&[record()]).unwrap();
        bridge.update_existing(&[record()]).unwrap();
        bridge.close().await;
    }

    fn client(server: &MockServer) -> BridgeClient {
        let url = Url::parse(&server.uri()).unwrap();
        BridgeClient::new(url, &lumen_api::TransportConfig::default()).unwrap()
    }
}
