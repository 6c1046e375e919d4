// Controller state query
//
// Each controller accepts a fixed 4-byte request on TCP 5577 and answers
// with a 14-byte state frame. The last byte of every frame is the
// wrapping byte sum of the bytes before it.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::Error;

/// TCP port controllers accept commands on.
pub const CONTROL_PORT: u16 = 5577;

/// Length of a state response frame.
pub const STATE_RESPONSE_LEN: usize = 14;

const STATE_REQUEST_BODY: [u8; 3] = [0x81, 0x8A, 0x8B];
const STATE_RESPONSE_HEADER: u8 = 0x81;
const POWER_ON: u8 = 0x23;

/// Decoded state frame, before any interpretation by the domain layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawState {
    pub model_code: u8,
    pub is_on: bool,
    pub mode: u8,
    pub speed: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub warm_white: u8,
    pub firmware_version: u8,
    pub cool_white: u8,
}

/// Wrapping byte-sum checksum used by every frame.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// The state request frame, checksum included.
pub fn state_request() -> [u8; 4] {
    let [a, b, c] = STATE_REQUEST_BODY;
    [a, b, c, checksum(&STATE_REQUEST_BODY)]
}

/// Decode a state response frame.
pub fn parse_state_response(frame: &[u8], peer: &str) -> Result<RawState, Error> {
    let malformed = |reason: String| Error::MalformedResponse {
        peer: peer.to_owned(),
        reason,
    };

    let frame: &[u8; STATE_RESPONSE_LEN] = frame
        .try_into()
        .map_err(|_| malformed(format!("expected {STATE_RESPONSE_LEN} bytes, got {}", frame.len())))?;

    let [
        header,
        model_code,
        power,
        mode,
        _,
        speed,
        red,
        green,
        blue,
        warm_white,
        firmware_version,
        cool_white,
        _,
        sum,
    ] = *frame;

    if header != STATE_RESPONSE_HEADER {
        return Err(malformed(format!("unexpected header byte {header:#04x}")));
    }
    let expected = checksum(&frame[..STATE_RESPONSE_LEN - 1]);
    if sum != expected {
        return Err(malformed(format!(
            "checksum mismatch: got {sum:#04x}, expected {expected:#04x}"
        )));
    }

    Ok(RawState {
        model_code,
        is_on: power == POWER_ON,
        mode,
        speed,
        red,
        green,
        blue,
        warm_white,
        firmware_version,
        cool_white,
    })
}

/// Query one controller's state, bounded by `timeout` end to end.
pub async fn query_state(addr: SocketAddr, timeout: Duration) -> Result<RawState, Error> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(&state_request()).await?;
        let mut frame = [0u8; STATE_RESPONSE_LEN];
        stream.read_exact(&mut frame).await?;
        Ok::<_, Error>(frame)
    };

    let frame = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| Error::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })??;

    trace!(%addr, ?frame, "state frame");
    parse_state_response(&frame, &addr.to_string())
}

/// Query many controllers concurrently. Results keep the input order.
pub async fn query_all(
    addrs: &[SocketAddr],
    timeout: Duration,
) -> Vec<(SocketAddr, Result<RawState, Error>)> {
    let results = join_all(addrs.iter().map(|addr| query_state(*addr, timeout))).await;
    let out: Vec<_> = addrs.iter().copied().zip(results).collect();
    debug!(
        queried = out.len(),
        failed = out.iter().filter(|(_, r)| r.is_err()).count(),
        "state queries complete"
    );
    out
}
