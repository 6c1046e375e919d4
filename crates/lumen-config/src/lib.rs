//! Configuration for the lumen bridge.
//!
//! TOML file + `LUMEN_` environment overrides, path resolution, and
//! translation to `lumen_core::PlatformConfig`. The binary adds
//! `GlobalOpts`-aware wrappers on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use lumen_core::discovery::parse_target;
use lumen_core::{
    BridgeConfig, DeviceManagement, DiscoveryConfig, PlatformConfig, PolicyMode, UniqueId,
};

/// Prefix for environment overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "LUMEN_";

const CACHE_FILE: &str = "accessories.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "deviceManagement")]
    pub device_management: DeviceManagementSection,
    pub pruning: PruningSection,
    pub discovery: DiscoverySection,
    pub bridge: BridgeSection,
    pub advanced: AdvancedSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceManagementSection {
    /// "whitelist" or "blacklist".
    #[serde(alias = "blacklistOrWhitelist")]
    pub blacklist_or_whitelist: String,

    #[serde(alias = "blacklistedUniqueIDs", alias = "blacklistedUniqueIds")]
    pub blacklisted_unique_ids: Vec<String>,
}

impl Default for DeviceManagementSection {
    fn default() -> Self {
        Self {
            blacklist_or_whitelist: PolicyMode::default().to_string(),
            blacklisted_unique_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PruningSection {
    /// Omitted disables restart-based pruning.
    #[serde(alias = "pruneRestarts", skip_serializing_if = "Option::is_none")]
    pub prune_restarts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoverySection {
    #[serde(alias = "broadcastAddress")]
    pub broadcast_address: String,

    #[serde(alias = "additionalSubnets")]
    pub additional_subnets: Vec<String>,

    #[serde(alias = "timeoutMs")]
    pub timeout_ms: u64,

    #[serde(alias = "queryTimeoutMs")]
    pub query_timeout_ms: u64,

    /// 0 disables periodic rescans.
    #[serde(alias = "rescanIntervalSecs")]
    pub rescan_interval_secs: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            broadcast_address: "255.255.255.255:48899".into(),
            additional_subnets: Vec::new(),
            timeout_ms: 2000,
            query_timeout_ms: 1500,
            rescan_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSection {
    pub url: String,

    /// API key (plaintext; prefer `api_key_env`).
    #[serde(alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(alias = "apiKeyEnv", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(alias = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            url: lumen_core::config::DEFAULT_BRIDGE_URL.into(),
            api_key: None,
            api_key_env: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvancedSection {
    /// Append the last six characters of the unique id to new names.
    #[serde(alias = "namesWithMacAddress")]
    pub names_with_mac_address: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    #[serde(alias = "cachePath", skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "lumen", "lumen")
}

fn dirs_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("lumen");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default accessory cache location under the platform data directory.
pub fn default_cache_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join(CACHE_FILE),
        |dirs| dirs.data_dir().join(CACHE_FILE),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// The provider stack: TOML file, then `LUMEN_*` environment overrides.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from `path` plus environment. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Write a default config file. Refuses to overwrite unless `force`.
pub fn init_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    save_config(&Config::default(), path)
}

// ── Translation to runtime config ───────────────────────────────────

impl Config {
    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        if out.bridge.api_key.is_some() {
            out.bridge.api_key = Some("********".into());
        }
        out
    }

    /// Resolve the bridge API key: named env var first, then plaintext.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        if let Some(ref env_name) = self.bridge.api_key_env {
            if let Ok(val) = std::env::var(env_name) {
                return Some(SecretString::from(val));
            }
        }
        self.bridge
            .api_key
            .as_ref()
            .map(|key| SecretString::from(key.clone()))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.storage
            .cache_path
            .clone()
            .unwrap_or_else(default_cache_path)
    }

    /// Validate and build the runtime `PlatformConfig`.
    pub fn to_platform_config(&self) -> Result<PlatformConfig, ConfigError> {
        let mode: PolicyMode = self
            .device_management
            .blacklist_or_whitelist
            .parse()
            .map_err(|_| {
                invalid(
                    "device_management.blacklist_or_whitelist",
                    format!(
                        "expected 'whitelist' or 'blacklist', got '{}'",
                        self.device_management.blacklist_or_whitelist
                    ),
                )
            })?;
        let unique_ids = self
            .device_management
            .blacklisted_unique_ids
            .iter()
            .map(UniqueId::new)
            .filter(|id| !id.is_empty())
            .collect();

        let broadcast_address = parse_target(&self.discovery.broadcast_address)
            .map_err(|e| invalid("discovery.broadcast_address", e.to_string()))?;
        let additional_targets = self
            .discovery
            .additional_subnets
            .iter()
            .map(|s| parse_target(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid("discovery.additional_subnets", e.to_string()))?;
        if self.discovery.timeout_ms == 0 {
            return Err(invalid("discovery.timeout_ms", "must be greater than zero"));
        }

        let url = Url::parse(&self.bridge.url)
            .map_err(|e| invalid("bridge.url", format!("{e}: {}", self.bridge.url)))?;

        Ok(PlatformConfig {
            device_management: DeviceManagement { mode, unique_ids },
            prune_restarts: self.pruning.prune_restarts,
            discovery: DiscoveryConfig {
                broadcast_address,
                additional_targets,
                timeout: Duration::from_millis(self.discovery.timeout_ms),
                query_timeout: Duration::from_millis(self.discovery.query_timeout_ms),
                rescan_interval: Duration::from_secs(self.discovery.rescan_interval_secs),
            },
            bridge: BridgeConfig {
                url,
                api_key: self.resolve_api_key(),
                timeout: Duration::from_secs(self.bridge.timeout_secs),
            },
            names_with_mac_address: self.advanced.names_with_mac_address,
            cache_path: Some(self.cache_path()),
            read_only_cache: false,
        })
    }
}
