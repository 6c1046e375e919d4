//! Accessory cache inspection and editing.

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use lumen_core::{AccessoryRecord, LoadedCache};

use crate::cli::{AccessoriesArgs, AccessoriesCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Rows ────────────────────────────────────────────────────────────

/// A cached record plus what would happen to it on reappearance.
#[derive(Debug, Serialize)]
struct CachedAccessory {
    #[serde(flatten)]
    record: AccessoryRecord,
    status: &'static str,
    #[serde(skip)]
    tone: output::Tone,
}

#[derive(Tabled)]
struct AccessoryRow {
    #[tabled(rename = "Record ID")]
    record_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Missed")]
    missed: u32,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn row(a: &CachedAccessory, color: bool) -> AccessoryRow {
    let r = &a.record;
    AccessoryRow {
        record_id: r.record_id.to_string(),
        name: r.display_name.clone(),
        unique_id: r.unique_id().to_string(),
        ip: r.proto_device.ip_address.to_string(),
        description: r.device_api.description.clone(),
        missed: r.restarts_since_seen,
        last_seen: r
            .last_seen
            .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
        status: output::paint(a.status, a.tone, color),
    }
}

fn warn_malformed(loaded: &LoadedCache) {
    for entry in &loaded.malformed {
        warn!(index = entry.index, reason = %entry.reason, "skipping malformed cache entry");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: AccessoriesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let platform = config::load_platform(global)?;
    let cache = util::cache(&platform);
    let loaded = cache.load()?;
    warn_malformed(&loaded);

    match args.command {
        AccessoriesCommand::List => {
            let freshness = platform.freshness();
            let mut records = loaded.records;
            records.sort_by(|a, b| a.display_name.cmp(&b.display_name));
            let data: Vec<CachedAccessory> = records
                .into_iter()
                .map(|record| {
                    let (status, tone) = util::record_status(&record, &freshness);
                    CachedAccessory {
                        record,
                        status,
                        tone,
                    }
                })
                .collect();

            let color = output::should_color(&global.color);
            let out = output::render_list(
                &global.output,
                &data,
                |a| row(a, color),
                |a| a.record.record_id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AccessoriesCommand::Rename { id, name } => {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(CliError::Validation {
                    field: "name".into(),
                    reason: "display name cannot be empty".into(),
                });
            }
            let mut records = loaded.records;
            let record = util::find_record(&mut records, &id)?;
            let old = std::mem::replace(&mut record.display_name, name);
            let marked = record.has_deletion_marker();
            let record_id = record.record_id;

            cache.save(&records)?;
            tracing::info!(%record_id, from = %old, marked, "accessory renamed");
            if !global.quiet {
                eprintln!("Renamed {record_id}");
                if marked {
                    eprintln!("Marked for deletion: it will be pruned the next time it is seen");
                }
            }
            Ok(())
        }
    }
}
