use thiserror::Error;

/// Top-level error type for the `lumen-api` crate.
///
/// Covers every failure mode across the wire surfaces this crate speaks:
/// the UDP discovery probe, the TCP state query, and the bridge registry
/// HTTP API. `lumen-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Sockets ─────────────────────────────────────────────────────
    /// Socket bind, send, or receive failure.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation did not complete within its deadline.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── LAN protocol ────────────────────────────────────────────────
    /// Address could not be parsed or resolved.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A controller replied with bytes that do not match the protocol.
    #[error("malformed response from {peer}: {reason}")]
    MalformedResponse { peer: String, reason: String },

    /// No probe could be sent on any configured broadcast address.
    #[error("discovery probe could not be sent: {reason}")]
    ProbeFailed { reason: String },

    // ── Bridge registry HTTP ────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API key rejected by the bridge registry.
    #[error("bridge rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Non-success status from the bridge registry.
    #[error("bridge registry error (HTTP {status}): {message}")]
    Bridge { status: u16, message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Io(_) => true,
            Self::Bridge { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the error came from the bridge registry surface.
    pub fn is_bridge(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::InvalidUrl(_) | Self::Unauthorized { .. } | Self::Bridge { .. }
        )
    }
}
