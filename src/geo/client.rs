use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::GeoLocation;
use super::GeoLookup;
use crate::config::GeoConfig;
use crate::error::{GeoError, GeoResult};

/// Client for the geo-lookup provider
#[derive(Clone)]
pub struct GeoClient {
    client: Client,
    base_url: String,
    config: GeoConfig,
}

impl GeoClient {
    /// Create a new geo client
    pub fn new(config: &GeoConfig) -> GeoResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(GeoError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    /// Look up an address, retrying per the configured policy
    pub async fn locate(&self, ip: &str) -> GeoResult<GeoLocation> {
        let url = format!("{}/lookup/{}", self.base_url, ip);

        let mut retries = 0;

        loop {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.config
                        .retry_delay_ms
                        .saturating_mul(2_u64.saturating_pow(retries - 1)),
                );
                warn!(
                    ip = %ip,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying geo lookup"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url).await {
                Ok(location) => {
                    info!(
                        ip = %ip,
                        country = %location.country,
                        latency_ms = start.elapsed().as_millis(),
                        "Geo lookup succeeded"
                    );
                    return Ok(location);
                }
                Err(e) => {
                    debug!(
                        ip = %ip,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Geo lookup attempt failed"
                    );
                    // Malformed bodies will not improve on retry.
                    if retries >= self.config.max_retries
                        || matches!(e, GeoError::InvalidResponse { .. })
                    {
                        return Err(e);
                    }
                    retries += 1;
                }
            }
        }
    }

    async fn execute_request(&self, url: &str) -> GeoResult<GeoLocation> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }
            } else {
                GeoError::Http(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeoError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| GeoError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        GeoLocation::from_value(&body)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GeoLookup for GeoClient {
    async fn lookup(&self, ip: &str) -> GeoResult<GeoLocation> {
        self.locate(ip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let config = GeoConfig {
            base_url: "https://geo.example.com/api/".to_string(),
            ..GeoConfig::default()
        };

        let client = GeoClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://geo.example.com/api");
    }
}
