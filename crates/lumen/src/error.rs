//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use lumen_config::ConfigError;
use lumen_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const DISCOVERY: i32 = 7;
    pub const BRIDGE: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Discovery ────────────────────────────────────────────────────

    #[error("Discovery failed: {reason}")]
    #[diagnostic(
        code(lumen::discovery_failed),
        help(
            "Check that this host can send UDP broadcasts on port 48899.\n\
             Add per-subnet broadcast addresses under [discovery] additional_subnets."
        )
    )]
    DiscoveryFailed { reason: String },

    #[error("A reconciliation pass is already running")]
    #[diagnostic(code(lumen::pass_in_progress))]
    PassInProgress,

    // ── Bridge ───────────────────────────────────────────────────────

    #[error("Bridge registry error: {message}")]
    #[diagnostic(
        code(lumen::bridge),
        help(
            "Check [bridge] url and api_key in your config.\n\
             Try: lumen reconcile --dry-run"
        )
    )]
    Bridge { message: String },

    // ── Cache ────────────────────────────────────────────────────────

    #[error("Accessory cache error at {path}: {reason}")]
    #[diagnostic(
        code(lumen::cache),
        help("Move the file aside to start from an empty cache.")
    )]
    Cache { path: String, reason: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(lumen::not_found),
        help("Run: lumen {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lumen::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(lumen::config_exists),
        help("Use --force to overwrite.\nPath: {path}")
    )]
    ConfigExists { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(lumen::config),
        help("Inspect the effective configuration with: lumen config show")
    )]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(lumen::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DiscoveryFailed { .. } => exit_code::DISCOVERY,
            Self::Bridge { .. } => exit_code::BRIDGE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ConfigExists { .. } | Self::Config { .. } => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DiscoveryFailed { reason } => CliError::DiscoveryFailed { reason },
            CoreError::RescanInProgress => CliError::PassInProgress,
            CoreError::Bridge(e) => CliError::Bridge {
                message: e.to_string(),
            },
            CoreError::Persistence { path, reason } => CliError::Cache {
                path: path.display().to_string(),
                reason,
            },
            CoreError::MalformedRecord { index, reason } => CliError::Cache {
                path: format!("entry #{index}"),
                reason,
            },
            CoreError::Config { message } => CliError::Config { message },
            e @ CoreError::Binding(_) => CliError::Internal(e.to_string()),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::AlreadyExists { path } => CliError::ConfigExists {
                path: path.display().to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            e @ (ConfigError::Validation { .. }
            | ConfigError::Serialization(_)
            | ConfigError::Figment(_)) => CliError::Config {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::BridgeError;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::DiscoveryFailed {
                    reason: "no route".into(),
                },
                exit_code::DISCOVERY,
            ),
            (CoreError::Bridge(BridgeError::Closed), exit_code::BRIDGE),
            (
                CoreError::Config {
                    message: "bad".into(),
                },
                exit_code::CONFIG,
            ),
            (CoreError::RescanInProgress, exit_code::GENERAL),
        ];
        for (core, expected) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), expected, "{label}");
        }
    }

    #[test]
    fn config_exists_is_a_config_error() {
        let err = CliError::from(ConfigError::AlreadyExists {
            path: "/tmp/lumen/config.toml".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert_ne!(exit_code::SUCCESS, err.exit_code());
    }
}
