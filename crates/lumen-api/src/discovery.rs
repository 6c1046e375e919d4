// LAN discovery probe
//
// Controllers answer a fixed ASCII probe on UDP 48899 with a single
// comma-separated line: `<ip>,<unique id>,<model number>`. The probe is
// broadcast once per target address; replies are collected until the
// deadline passes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::Error;

/// UDP port controllers listen on for the discovery probe.
pub const DISCOVERY_PORT: u16 = 48899;

/// Probe payload understood by the controllers.
pub const PROBE_PAYLOAD: &[u8] = b"HF-A11ASSISTHREAD";

const RECV_BUFFER_SIZE: usize = 512;

/// One controller's answer to the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReply {
    pub ip: IpAddr,
    pub unique_id: String,
    pub model_number: String,
}

/// Where and how long to probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Broadcast (or unicast) addresses the probe is sent to.
    pub targets: Vec<SocketAddr>,
    /// How long to keep collecting replies after the probe is sent.
    pub timeout: Duration,
    /// Local address to bind the probe socket to.
    pub bind: SocketAddr,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            targets: vec![SocketAddr::new(
                IpAddr::V4(Ipv4Addr::BROADCAST),
                DISCOVERY_PORT,
            )],
            timeout: Duration::from_millis(2000),
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        }
    }
}

/// Parse a single probe reply line.
///
/// Returns `None` for anything that is not three non-empty fields with a
/// parseable IP address in the first position.
pub fn parse_probe_reply(raw: &str) -> Option<ProbeReply> {
    let mut fields = raw.trim().split(',').map(str::trim);
    let ip = fields.next()?.parse::<IpAddr>().ok()?;
    let unique_id = fields.next().filter(|s| !s.is_empty())?;
    let model_number = fields.next().filter(|s| !s.is_empty())?;
    if fields.next().is_some() {
        return None;
    }
    Some(ProbeReply {
        ip,
        unique_id: unique_id.to_owned(),
        model_number: model_number.to_owned(),
    })
}

/// Parse a target address, defaulting the port to [`DISCOVERY_PORT`].
pub fn parse_target(raw: &str) -> Result<SocketAddr, Error> {
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Ok(addr);
    }
    raw.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DISCOVERY_PORT))
        .map_err(|e| Error::InvalidAddress {
            address: raw.into(),
            reason: e.to_string(),
        })
}

/// Broadcast the probe and collect replies until the timeout elapses.
///
/// Replies are de-duplicated by unique id; a later reply from the same
/// controller replaces the earlier one (its address may have changed).
/// Fails only if the socket cannot be bound or no probe could be sent.
pub async fn probe(config: &ProbeConfig) -> Result<Vec<ProbeReply>, Error> {
    let socket = UdpSocket::bind(config.bind).await?;
    socket.set_broadcast(true)?;

    let mut sent = 0usize;
    let mut last_error = None;
    for target in &config.targets {
        match socket.send_to(PROBE_PAYLOAD, target).await {
            Ok(_) => {
                debug!(%target, "discovery probe sent");
                sent += 1;
            }
            Err(e) => {
                warn!(%target, error = %e, "failed to send discovery probe");
                last_error = Some(e);
            }
        }
    }
    if sent == 0 {
        return Err(Error::ProbeFailed {
            reason: last_error.map_or_else(|| "no targets configured".into(), |e| e.to_string()),
        });
    }

    let deadline = Instant::now() + config.timeout;
    let mut replies: Vec<ProbeReply> = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
        let Ok(result) = received else { break };
        let (len, peer) = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "discovery receive failed");
                continue;
            }
        };

        let Some(payload) = buf.get(..len) else { continue };
        if payload == PROBE_PAYLOAD {
            // Our own broadcast looped back.
            continue;
        }
        let text = String::from_utf8_lossy(payload);
        trace!(%peer, payload = %text, "discovery reply");

        match parse_probe_reply(&text) {
            Some(reply) => {
                if let Some(existing) = replies
                    .iter_mut()
                    .find(|r| same_device(&r.unique_id, &reply.unique_id))
                {
                    *existing = reply;
                } else {
                    replies.push(reply);
                }
            }
            None => debug!(%peer, payload = %text, "ignoring malformed discovery reply"),
        }
    }

    debug!(count = replies.len(), "discovery window closed");
    Ok(replies)
}

/// Controllers report the same MAC-derived id with or without separators
/// and in either case.
fn same_device(a: &str, b: &str) -> bool {
    let significant = |s: &str| {
        s.chars()
            .filter(|c| !matches!(c, ':' | '-') && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect::<Vec<_>>()
    };
    significant(a) == significant(b)
}
