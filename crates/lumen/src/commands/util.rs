//! Shared helpers for command handlers.

use std::sync::Arc;

use lumen_api::{BridgeClient, TransportConfig};
use lumen_core::{
    AccessoryCache, AccessoryRecord, BridgeAdapter, Freshness, FreshnessPolicy, HttpBridge,
    LogBridge, PlatformConfig, PruneReason, RecordId, UniqueId,
};

use crate::error::CliError;
use crate::output::Tone;

/// The bridge adapter for a command: logging only for dry runs, otherwise
/// the HTTP registry client. Must be called inside the runtime.
pub fn bridge(config: &PlatformConfig, dry_run: bool) -> Result<Arc<dyn BridgeAdapter>, CliError> {
    if dry_run {
        return Ok(Arc::new(LogBridge));
    }
    let transport = TransportConfig {
        timeout: config.bridge.timeout,
        api_key: config.bridge.api_key.clone(),
        ..TransportConfig::default()
    };
    let client = BridgeClient::new(config.bridge.url.clone(), &transport).map_err(|e| {
        CliError::Config {
            message: format!("cannot build bridge client: {e}"),
        }
    })?;
    Ok(Arc::new(HttpBridge::spawn(client)))
}

/// The configured accessory cache.
pub fn cache(config: &PlatformConfig) -> AccessoryCache {
    AccessoryCache::new(
        config
            .cache_path
            .clone()
            .unwrap_or_else(lumen_config::default_cache_path),
    )
}

/// Status word for a cached record: what would happen if it reappeared now.
pub fn record_status(record: &AccessoryRecord, freshness: &FreshnessPolicy) -> (&'static str, Tone) {
    match freshness.check(record) {
        Freshness::Fresh => ("ok", Tone::Good),
        Freshness::Stale(PruneReason::MarkedForDeletion) => {
            (PruneReason::MarkedForDeletion.as_str(), Tone::Bad)
        }
        Freshness::Stale(_) => ("stale", Tone::Warn),
    }
}

/// Find a record by record id or (normalized) unique id.
pub fn find_record<'a>(
    records: &'a mut [AccessoryRecord],
    identifier: &str,
) -> Result<&'a mut AccessoryRecord, CliError> {
    let by_record = identifier.parse::<RecordId>().ok();
    let by_unique = UniqueId::new(identifier);
    records
        .iter_mut()
        .find(|r| Some(r.record_id) == by_record || *r.unique_id() == by_unique)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "accessory".into(),
            identifier: identifier.into(),
            list_command: "accessories list".into(),
        })
}
