// ── Core error types ──
//
// User-facing errors from lumen-core. Wire-level failures from lumen-api
// are folded into domain variants by the `From<lumen_api::Error>` impl;
// consumers never match on socket or HTTP details.

use std::path::PathBuf;

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::capability::BindingError;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Discovery ────────────────────────────────────────────────────
    #[error("Discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("A reconciliation pass is already in progress")]
    RescanInProgress,

    // ── Binding ──────────────────────────────────────────────────────
    #[error(transparent)]
    Binding(#[from] BindingError),

    // ── Persistence ──────────────────────────────────────────────────
    #[error("Malformed persisted record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("Accessory cache error at {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    // ── Bridge ───────────────────────────────────────────────────────
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<lumen_api::Error> for CoreError {
    fn from(err: lumen_api::Error) -> Self {
        match err {
            lumen_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid bridge URL: {e}"),
            },
            lumen_api::Error::InvalidAddress { address, reason } => CoreError::Config {
                message: format!("Invalid discovery address '{address}': {reason}"),
            },
            e if e.is_bridge() => CoreError::Bridge(BridgeError::Registry {
                message: e.to_string(),
            }),
            e => CoreError::DiscoveryFailed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_failure_maps_to_discovery() {
        let err = CoreError::from(lumen_api::Error::ProbeFailed {
            reason: "network unreachable".into(),
        });
        assert!(matches!(err, CoreError::DiscoveryFailed { .. }));
        assert!(err.to_string().contains("network unreachable"));
    }

    #[test]
    fn bad_address_maps_to_config() {
        let err = CoreError::from(lumen_api::Error::InvalidAddress {
            address: "nope".into(),
            reason: "invalid IP address syntax".into(),
        });
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn registry_errors_map_to_bridge() {
        let err = CoreError::from(lumen_api::Error::Unauthorized { status: 401 });
        assert!(matches!(err, CoreError::Bridge(BridgeError::Registry { .. })));
    }
}
