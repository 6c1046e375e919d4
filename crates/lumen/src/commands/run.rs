//! Long-running bridge.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use lumen_core::{LanDiscovery, Platform};

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;

use super::util;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_platform(global)?;
    cfg.read_only_cache = args.dry_run;
    let interval = args
        .interval_secs
        .map_or(cfg.discovery.rescan_interval, Duration::from_secs);

    let discovery = Arc::new(LanDiscovery::new(&cfg.discovery));
    let bridge = util::bridge(&cfg, args.dry_run)?;
    let platform = Platform::start(&cfg, discovery, bridge).await?;

    // A failed first pass is retried by the periodic task.
    if let Err(e) = platform.rescan().await {
        warn!(error = %e, "initial pass failed");
    }
    platform.spawn_periodic(interval).await;
    let watcher = tokio::spawn(log_accessory_changes(platform.clone()));
    info!(
        interval_secs = interval.as_secs(),
        dry_run = args.dry_run,
        "bridge running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    if platform.is_pass_in_flight() {
        info!("waiting for the running pass to finish");
    }
    platform.shutdown().await?;
    watcher.abort();

    if let Some(at) = *platform.last_pass().borrow() {
        info!(last_pass = %at.to_rfc3339(), "bridge stopped");
    }
    Ok(())
}

/// Log the bound accessory set whenever a pass changes it.
async fn log_accessory_changes(platform: Platform) {
    let mut accessories = platform.subscribe_accessories();
    while accessories.changed().await.is_ok() {
        let (total, reachable) = {
            let current = accessories.borrow_and_update();
            (current.len(), current.iter().filter(|a| a.reachable).count())
        };
        info!(total, reachable, "accessory set changed");
    }
}
