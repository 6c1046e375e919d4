// ── Platform lifecycle ──
//
// Owns the reconciliation context for the life of the process: loads it
// from the cache on start, runs guarded passes against it, and persists
// it on shutdown.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::BridgeAdapter;
use crate::cache::AccessoryCache;
use crate::capability::{self, BoundAccessory};
use crate::config::PlatformConfig;
use crate::discovery::DiscoverySource;
use crate::error::CoreError;
use crate::freshness::PruneReason;
use crate::lifecycle::LifecycleState;
use crate::model::{AccessoryRecord, DeviceController, RecordId};
use crate::reconcile::{ReconcileContext, ReconcileOutcome, Reconciler, Snapshot};
use crate::store::AccessoryStore;

/// Counts from one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub discovered: usize,
    pub registered: usize,
    pub updated: usize,
    pub pruned: usize,
    pub offline: usize,
    pub bound: usize,
    pub binding_failures: usize,
    /// The batches the pass decided on.
    pub outcome: ReconcileOutcome,
}

// ── Platform ─────────────────────────────────────────────────────────

/// Cheaply cloneable handle to a running platform.
#[derive(Clone)]
pub struct Platform {
    inner: Arc<PlatformInner>,
}

struct PlatformInner {
    reconciler: Reconciler,
    discovery: Arc<dyn DiscoverySource>,
    bridge: Arc<dyn BridgeAdapter>,
    cache: Option<AccessoryCache>,
    read_only_cache: bool,
    context: Mutex<ReconcileContext>,
    store: AccessoryStore,
    in_flight: AtomicBool,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    last_pass: watch::Sender<Option<DateTime<Utc>>>,
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Platform {
    /// Load the accessory cache into a fresh context and tell the bridge
    /// to forget persisted entries that failed validation.
    pub async fn start(
        config: &PlatformConfig,
        discovery: Arc<dyn DiscoverySource>,
        bridge: Arc<dyn BridgeAdapter>,
    ) -> Result<Self, CoreError> {
        let cache = config.cache_path.clone().map(AccessoryCache::new);
        let loaded = match &cache {
            Some(cache) => cache.load()?,
            None => crate::cache::LoadedCache::default(),
        };

        // A torn duplicate must not take a valid record with the same id down
        // with it.
        let valid: HashSet<RecordId> = loaded.records.iter().map(|r| r.record_id).collect();
        let mut tombstones = Vec::new();
        for entry in loaded.malformed {
            warn!(
                index = entry.index,
                reason = %entry.reason,
                record_id = ?entry.recoverable.as_ref().map(|r| r.record_id.to_string()),
                "discarding malformed persisted record"
            );
            match entry.recoverable {
                Some(record) if valid.contains(&record.record_id) => {
                    debug!(record_id = %record.record_id, "valid record shares this id; keeping it");
                }
                Some(record) => tombstones.push(record),
                None => {}
            }
        }

        let mut context = ReconcileContext::from_disk(loaded.records);
        if !tombstones.is_empty() {
            if let Err(e) = bridge.unregister(&tombstones, PruneReason::MalformedRecord.as_str()) {
                warn!(error = %e, count = tombstones.len(), "startup prune not accepted");
            }
            context.tombstone(tombstones);
        }
        info!(
            records = context.disk_len(),
            cache = ?cache.as_ref().map(|c| c.path().display().to_string()),
            "platform started"
        );

        let (last_pass, _) = watch::channel(None);
        Ok(Self {
            inner: Arc::new(PlatformInner {
                reconciler: Reconciler::from_config(config),
                discovery,
                bridge,
                cache,
                read_only_cache: config.read_only_cache,
                context: Mutex::new(context),
                store: AccessoryStore::new(),
                in_flight: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                last_pass,
            }),
        })
    }

    // ── Passes ───────────────────────────────────────────────────────

    fn begin_pass(&self) -> Result<PassGuard<'_>, CoreError> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::RescanInProgress)?;
        Ok(PassGuard(&self.inner.in_flight))
    }

    /// Run one full pass: discover, reconcile, submit, bind.
    ///
    /// A discovery failure skips the pass and leaves every registry as it
    /// was. A call made while another pass is running fails with
    /// [`CoreError::RescanInProgress`].
    pub async fn rescan(&self) -> Result<PassReport, CoreError> {
        let _guard = self.begin_pass()?;

        let snapshot = match self.inner.discovery.discover_controllers().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "discovery failed; pass skipped");
                return Err(e);
            }
        };

        let (outcome, live, offline) = {
            let mut ctx = self.inner.context.lock().await;
            let outcome = self.inner.reconciler.reconcile(&mut ctx, &snapshot);
            self.submit(&mut ctx, &outcome);
            let live: Vec<AccessoryRecord> = ctx.live_records().into_iter().cloned().collect();
            let offline: Vec<AccessoryRecord> =
                ctx.offline_records().into_iter().cloned().collect();
            (outcome, live, offline)
        };

        let mut report = PassReport {
            discovered: snapshot.len(),
            registered: outcome.to_register.len(),
            updated: outcome.to_update.len(),
            pruned: outcome.to_prune.len(),
            offline: offline.len(),
            ..PassReport::default()
        };
        self.bind_pass(&snapshot, &live, &offline, &outcome, &mut report);
        report.outcome = outcome;

        self.inner.last_pass.send_replace(Some(Utc::now()));
        info!(
            discovered = report.discovered,
            registered = report.registered,
            updated = report.updated,
            pruned = report.pruned,
            offline = report.offline,
            bound = report.bound,
            binding_failures = report.binding_failures,
            "reconciliation pass complete"
        );
        Ok(report)
    }

    /// Preview a pass against a scratch copy of the context. Nothing is
    /// submitted and nothing is kept.
    pub async fn plan(&self) -> Result<ReconcileOutcome, CoreError> {
        let _guard = self.begin_pass()?;
        let snapshot = self.inner.discovery.discover_controllers().await?;
        let mut scratch = self.inner.context.lock().await.clone();
        Ok(self.inner.reconciler.reconcile(&mut scratch, &snapshot))
    }

    /// Hand the batches to the bridge. Empty batches are never submitted.
    fn submit(&self, ctx: &mut ReconcileContext, outcome: &ReconcileOutcome) {
        let bridge = &self.inner.bridge;

        if !outcome.to_register.is_empty() {
            match bridge.register_new(&outcome.to_register) {
                Ok(()) => ctx.confirm_registered(outcome.to_register.iter().map(|r| &r.record_id)),
                Err(e) => warn!(
                    error = %e,
                    count = outcome.to_register.len(),
                    "registration batch not accepted; records stay pending"
                ),
            }
        }
        if !outcome.to_update.is_empty() {
            if let Err(e) = bridge.update_existing(&outcome.to_update) {
                warn!(error = %e, count = outcome.to_update.len(), "update batch not accepted");
            }
        }
        for (reason, records) in outcome.prune_batches() {
            if let Err(e) = bridge.unregister(&records, reason.as_str()) {
                warn!(error = %e, reason = reason.as_str(), count = records.len(), "prune batch not accepted");
            }
        }
    }

    fn bind_pass(
        &self,
        snapshot: &Snapshot,
        live: &[AccessoryRecord],
        offline: &[AccessoryRecord],
        outcome: &ReconcileOutcome,
        report: &mut PassReport,
    ) {
        for record in live {
            if let Some(controller) = snapshot.get(record.unique_id()) {
                self.bind_one(record, controller, report);
            }
        }
        for record in offline {
            let controllers = self
                .inner
                .discovery
                .create_custom_controllers(&record.proto_device, &record.device_api);
            for controller in &controllers {
                self.bind_one(record, controller, report);
            }
        }
        for action in &outcome.to_prune {
            if self.inner.store.unbind(&action.record.record_id).is_some() {
                debug!(record_id = %action.record.record_id, "accessory unbound");
            }
        }
    }

    fn bind_one(&self, record: &AccessoryRecord, controller: &DeviceController, report: &mut PassReport) {
        match capability::bind(record, controller) {
            Ok(accessory) => {
                self.inner.store.bind(accessory);
                report.bound += 1;
            }
            Err(e) => {
                report.binding_failures += 1;
                warn!(
                    unique_id = %record.unique_id(),
                    record_id = %record.record_id,
                    ip = %record.proto_device.ip_address,
                    model = %record.proto_device.model_number,
                    error = %e,
                    "capability binding failed; accessory stays inert"
                );
            }
        }
    }

    // ── Background tasks ─────────────────────────────────────────────

    /// Rescan every `interval` until shutdown. The first tick fires after
    /// one full interval.
    pub async fn spawn_periodic(&self, interval: Duration) {
        if interval.is_zero() {
            debug!("periodic rescans disabled");
            return;
        }
        let handle = tokio::spawn(rescan_task(
            self.clone(),
            interval,
            self.inner.cancel.clone(),
        ));
        self.inner.task_handles.lock().await.push(handle);
    }

    /// Stop background tasks, persist the context, and close the bridge.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        drop(handles);

        let persisted = self.persist().await;
        self.inner.bridge.close().await;
        info!("platform stopped");
        persisted
    }

    /// Write the disk registry plus every non-pruned active record to the
    /// cache. A no-op without a cache or when the cache is read-only.
    pub async fn persist(&self) -> Result<(), CoreError> {
        let Some(cache) = &self.inner.cache else {
            return Ok(());
        };
        if self.inner.read_only_cache {
            debug!(cache = %cache.path().display(), "read-only cache; not persisting");
            return Ok(());
        }
        let records = self.inner.context.lock().await.records_to_persist();
        cache.save(&records)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn is_pass_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub async fn lifecycle(&self, id: &RecordId) -> LifecycleState {
        self.inner.context.lock().await.lifecycle(id)
    }

    /// Every record that would be persisted right now.
    pub async fn records(&self) -> Vec<AccessoryRecord> {
        self.inner.context.lock().await.records_to_persist()
    }

    pub fn accessories(&self) -> Arc<Vec<Arc<BoundAccessory>>> {
        self.inner.store.snapshot()
    }

    pub fn subscribe_accessories(&self) -> watch::Receiver<Arc<Vec<Arc<BoundAccessory>>>> {
        self.inner.store.subscribe()
    }

    pub fn last_pass(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_pass.subscribe()
    }
}

async fn rescan_task(platform: Platform, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match platform.rescan().await {
                    Ok(_) => {}
                    Err(CoreError::RescanInProgress) => {
                        debug!("previous pass still running; tick skipped");
                    }
                    Err(e) => warn!(error = %e, "periodic rescan failed"),
                }
            }
        }
    }
}
