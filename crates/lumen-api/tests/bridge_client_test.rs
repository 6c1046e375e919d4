#![allow(clippy::unwrap_used)]
// Integration tests for `BridgeClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumen_api::{AccessoryPayload, BridgeClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BridgeClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = BridgeClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn lamp() -> AccessoryPayload {
    AccessoryPayload {
        record_id: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        display_name: "RGBWW Bulb".into(),
        unique_id: "ACCF23A1B2C3".into(),
        ip_address: "192.168.1.40".into(),
        model_number: "AK001-ZJ2149".into(),
        description: "RGBWW Bulb".into(),
        restarts_since_seen: 0,
    }
}

// ── Batches ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_posts_batch() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/accessories"))
        .and(body_json(json!([{
            "record_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "display_name": "RGBWW Bulb",
            "unique_id": "ACCF23A1B2C3",
            "ip_address": "192.168.1.40",
            "model_number": "AK001-ZJ2149",
            "description": "RGBWW Bulb",
            "restarts_since_seen": 0
        }])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client.register(&[lamp()]).await.unwrap();
}

#[tokio::test]
async fn test_update_puts_batch() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/accessories"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.update(&[lamp()]).await.unwrap();
}

#[tokio::test]
async fn test_unregister_carries_reason() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/accessories/unregister"))
        .and(body_json(json!({
            "reason": "marked for deletion",
            "accessories": [lamp()]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .unregister(&[lamp()], "marked for deletion")
        .await
        .unwrap();
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/accessories"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.register(&[lamp()]).await;
    assert!(
        matches!(result, Err(Error::Unauthorized { status: 401 })),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_carries_body_preview() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/accessories"))
        .respond_with(ResponseTemplate::new(500).set_body_string("registry offline"))
        .mount(&server)
        .await;

    let err = client.update(&[lamp()]).await.unwrap_err();
    match err {
        Error::Bridge { status, ref message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "registry offline");
            assert!(err.is_transient());
        }
        other => panic!("expected Bridge error, got: {other:?}"),
    }
}

// ── Transport ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_api_key_header_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/accessories"))
        .and(header("X-API-KEY", "s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport =
        TransportConfig::default().with_api_key(SecretString::from("s3cret".to_string()));
    let client = BridgeClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();
    client.register(&[lamp()]).await.unwrap();
}
