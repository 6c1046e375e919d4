#![allow(clippy::unwrap_used)]
// Integration tests for the LAN probe and state query against local fakes.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

use lumen_api::device_query::{checksum, state_request};
use lumen_api::discovery::PROBE_PAYLOAD;
use lumen_api::{Error, ProbeConfig, probe, query_all, query_state};

// ── Helpers ─────────────────────────────────────────────────────────

/// Spawn a fake controller answering the discovery probe with `replies`.
async fn fake_responder(replies: Vec<&'static str>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], PROBE_PAYLOAD);
        for reply in replies {
            socket.send_to(reply.as_bytes(), peer).await.unwrap();
        }
    });
    addr
}

/// Spawn a fake controller answering one state request with `frame`.
async fn fake_controller(frame: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4];
        stream.read_exact(&mut request).await.unwrap();
        assert_eq!(request, state_request());
        stream.write_all(&frame).await.unwrap();
    });
    addr
}

fn state_frame(model_code: u8) -> Vec<u8> {
    let mut f = vec![
        0x81, model_code, 0x23, 0x61, 0x00, 0x10, 0xFF, 0x80, 0x00, 0x00, 0x09, 0x00, 0x00,
    ];
    f.push(checksum(&f));
    f
}

fn probe_config(target: SocketAddr) -> ProbeConfig {
    ProbeConfig {
        targets: vec![target],
        timeout: Duration::from_millis(300),
        bind: "127.0.0.1:0".parse().unwrap(),
    }
}

// ── Discovery probe ─────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_collects_replies() {
    let target = fake_responder(vec![
        "127.0.0.1,ACCF23A1B2C3,AK001-ZJ2149",
        "127.0.0.1,600194D4E5F6,AK001-ZJ200",
    ])
    .await;

    let replies = probe(&probe_config(target)).await.unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].unique_id, "ACCF23A1B2C3");
    assert_eq!(replies[1].model_number, "AK001-ZJ200");
}

#[tokio::test]
async fn test_probe_skips_garbage_and_dedupes() {
    let target = fake_responder(vec![
        "127.0.0.1,ACCF23A1B2C3,OLD-MODEL",
        "+ok",
        "127.0.0.1,ACCF23A1B2C3,AK001-ZJ2149",
    ])
    .await;

    let replies = probe(&probe_config(target)).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].model_number, "AK001-ZJ2149");
}

#[tokio::test]
async fn test_probe_dedupes_differently_formatted_ids() {
    let target = fake_responder(vec![
        "127.0.0.1,ac:cf:23:a1:b2:c3,OLD-MODEL",
        "127.0.0.1,ACCF23A1B2C3,AK001-ZJ2149",
    ])
    .await;

    let replies = probe(&probe_config(target)).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].unique_id, "ACCF23A1B2C3");
    assert_eq!(replies[0].model_number, "AK001-ZJ2149");
}

#[tokio::test]
async fn test_probe_with_silent_network_is_empty() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = silent.local_addr().unwrap();

    let replies = probe(&probe_config(target)).await.unwrap();
    assert!(replies.is_empty());
}

// ── State query ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_query_state_decodes_frame() {
    let addr = fake_controller(state_frame(0x44)).await;

    let state = query_state(addr, Duration::from_millis(500)).await.unwrap();
    assert_eq!(state.model_code, 0x44);
    assert!(state.is_on);
    assert_eq!((state.red, state.green, state.blue), (0xFF, 0x80, 0x00));
}

#[tokio::test]
async fn test_query_state_rejects_corrupt_frame() {
    let mut frame = state_frame(0x44);
    frame[13] ^= 0xFF;
    let addr = fake_controller(frame).await;

    let result = query_state(addr, Duration::from_millis(500)).await;
    assert!(
        matches!(result, Err(Error::MalformedResponse { .. })),
        "expected MalformedResponse, got: {result:?}"
    );
}

#[tokio::test]
async fn test_query_state_times_out_on_silent_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let result = query_state(addr, Duration::from_millis(100)).await;
    assert!(
        matches!(result, Err(Error::Timeout { timeout_ms: 100 })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn test_query_all_keeps_order_and_isolates_failures() {
    let good = fake_controller(state_frame(0x33)).await;
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let results = query_all(&[closed, good], Duration::from_millis(500)).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, closed);
    assert!(results[0].1.is_err());
    assert_eq!(results[1].0, good);
    assert_eq!(results[1].1.as_ref().unwrap().model_code, 0x33);
}
