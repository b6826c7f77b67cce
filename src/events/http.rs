use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

use super::{Event, EventTransport};
use crate::config::GatewayConfig;
use crate::error::{TransportError, TransportResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the gateway key.
pub const KEY_HEADER: &str = "X-Event-Key";
/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "X-Event-Signature";

/// Wire body accepted by the event gateway
#[derive(Debug, Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    /// Payload as a JSON-encoded string.
    data: String,
}

/// Publishes events to an external HTTP event gateway
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    key: String,
    secret: Vec<u8>,
    timeout_ms: u64,
}

impl HttpTransport {
    /// Create a new gateway transport
    pub fn new(config: &GatewayConfig, timeout_ms: u64) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            client,
            url: format!(
                "{}/apps/{}/events",
                config.base_url.trim_end_matches('/'),
                config.app_id
            ),
            key: config.key.clone(),
            secret: config.secret.as_bytes().to_vec(),
            timeout_ms,
        })
    }

    /// Endpoint events are posted to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hex HMAC-SHA256 of `body` under the gateway secret
    pub fn sign(&self, body: &[u8]) -> String {
        sign(&self.secret, body)
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[async_trait]
impl EventTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(&self, event: &Event) -> TransportResult<()> {
        let body = serde_json::to_vec(&TriggerBody {
            name: &event.name,
            channels: [event.channel.as_str()],
            data: serde_json::to_string(&event.payload)?,
        })?;
        let signature = self.sign(&body);

        let response = self
            .client
            .post(&self.url)
            .header(KEY_HEADER, &self.key)
            .header(SIGNATURE_HEADER, signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    TransportError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        debug!(channel = %event.channel, event = %event.name, "Event posted to gateway");
        Ok(())
    }
}
