// lumen-api: wire plumbing for LAN lighting controllers and the host bridge registry

pub mod bridge;
pub mod device_query;
pub mod discovery;
pub mod error;
pub mod transport;

pub use bridge::{AccessoryPayload, BridgeClient};
pub use device_query::{RawState, query_all, query_state};
pub use discovery::{ProbeConfig, ProbeReply, probe};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
