//! CLI configuration: thin wrapper around `lumen_config`.
//!
//! Adds `GlobalOpts`-aware path resolution on top of the shared loader.

use std::path::PathBuf;

use lumen_core::PlatformConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use lumen_config::{Config, init_config, load_config};

/// `--config` / `LUMEN_CONFIG`, else the platform config directory.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lumen_config::config_path)
}

/// Load the file (defaults when missing) with environment overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolve_path(global);
    tracing::debug!(path = %path.display(), "loading configuration");
    Ok(load_config(&path)?)
}

/// Load and validate into the runtime configuration.
pub fn load_platform(global: &GlobalOpts) -> Result<PlatformConfig, CliError> {
    Ok(load(global)?.to_platform_config()?)
}
