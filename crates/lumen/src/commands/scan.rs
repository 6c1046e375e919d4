//! One-shot network scan.

use std::time::Duration;

use tabled::Tabled;

use lumen_core::{DeviceController, DiscoverySource, LanDiscovery};

use crate::cli::{GlobalOpts, ScanArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Tone};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ControllerRow {
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Power")]
    power: String,
}

fn row(controller: &DeviceController, color: bool) -> ControllerRow {
    let power = match controller.state {
        Some(state) if state.is_on => output::paint("on", Tone::Good, color),
        Some(_) => output::paint("off", Tone::Warn, color),
        None => output::paint("unreachable", Tone::Bad, color),
    };
    ControllerRow {
        unique_id: controller.unique_id().to_string(),
        ip: controller.identity.ip_address.to_string(),
        model: controller.identity.model_number.clone(),
        description: controller.capability.description.clone(),
        power,
    }
}

pub async fn handle(args: ScanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut platform = config::load_platform(global)?;
    if let Some(ms) = args.timeout_ms {
        platform.discovery.timeout = Duration::from_millis(ms);
    }
    let discovery = LanDiscovery::new(&platform.discovery);

    let spinner = output::spinner("Probing for controllers...", global.quiet);
    let result = discovery.discover_controllers().await;
    spinner.finish_and_clear();

    let controllers: Vec<DeviceController> = result?.into_values().collect();
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &controllers,
        |c| row(c, color),
        |c| c.unique_id().to_string(),
    );
    output::print_output(&out, global.quiet);
    if controllers.is_empty() && !global.quiet {
        eprintln!("No controllers responded");
    }
    Ok(())
}
