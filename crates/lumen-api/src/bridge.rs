// Bridge registry HTTP client
//
// Wraps `reqwest::Client` with registry URL construction and status
// handling. The registry accepts accessory batches as JSON; responses
// carry no payload the caller needs.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Wire shape of one accessory as the registry sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryPayload {
    pub record_id: String,
    pub display_name: String,
    pub unique_id: String,
    pub ip_address: String,
    pub model_number: String,
    pub description: String,
    pub restarts_since_seen: u32,
}

#[derive(Serialize)]
struct UnregisterRequest<'a> {
    reason: &'a str,
    accessories: &'a [AccessoryPayload],
}

/// Raw HTTP client for the host bridge's accessory registry.
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BridgeClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The registry base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register accessories that the registry has never seen.
    pub async fn register(&self, accessories: &[AccessoryPayload]) -> Result<(), Error> {
        let url = self.api_url("accessories")?;
        debug!(count = accessories.len(), "POST {url}");
        let resp = self.http.post(url).json(accessories).send().await?;
        check_status(resp).await
    }

    /// Update accessories the registry already holds.
    pub async fn update(&self, accessories: &[AccessoryPayload]) -> Result<(), Error> {
        let url = self.api_url("accessories")?;
        debug!(count = accessories.len(), "PUT {url}");
        let resp = self.http.put(url).json(accessories).send().await?;
        check_status(resp).await
    }

    /// Remove accessories from the registry.
    pub async fn unregister(
        &self,
        accessories: &[AccessoryPayload],
        reason: &str,
    ) -> Result<(), Error> {
        let url = self.api_url("accessories/unregister")?;
        debug!(count = accessories.len(), reason, "POST {url}");
        let body = UnregisterRequest {
            reason,
            accessories,
        };
        let resp = self.http.post(url).json(&body).send().await?;
        check_status(resp).await
    }

    /// Build `{base}/api/{path}`.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Unauthorized {
            status: status.as_u16(),
        });
    }
    let body = resp.text().await.unwrap_or_default();
    let preview: String = body.chars().take(200).collect();
    Err(Error::Bridge {
        status: status.as_u16(),
        message: preview,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_tolerates_trailing_slash() {
        let client = BridgeClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://bridge.local:8581/").unwrap(),
        );
        assert_eq!(
            client.api_url("accessories").unwrap().as_str(),
            "http://bridge.local:8581/api/accessories"
        );
    }

    #[test]
    fn api_url_keeps_base_path() {
        let client = BridgeClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://bridge.local/registry").unwrap(),
        );
        assert_eq!(
            client.api_url("accessories/unregister").unwrap().as_str(),
            "http://bridge.local/registry/api/accessories/unregister"
        );
    }
}
