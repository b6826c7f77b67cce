//! Visitor identity enrichment.
//!
//! [`IdentityResolver`] turns raw request metadata (peer address and
//! User-Agent) into an [`EnrichmentRecord`]. Enrichment is best effort: a
//! failed geo lookup or an unrecognized User-Agent leaves the affected
//! fields empty and is logged, never returned as an error.

pub mod user_agent;

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{GeoConfig, IdentityConfig};
use crate::geo::{GeoLocation, GeoLookup};

/// Derived, per-request metadata about a visitor.
///
/// Never persisted on its own; copied into a session when one is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    /// Effective client address (loopback already remapped).
    pub ip: String,
    /// Operating system from the User-Agent.
    pub os: String,
    /// Browser from the User-Agent.
    pub browser: String,
    /// Continent from the geo lookup.
    pub continent: String,
    /// Country from the geo lookup.
    pub country: String,
    /// City from the geo lookup.
    pub city: String,
}

impl EnrichmentRecord {
    /// Create a record with only the address set
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    fn apply_location(&mut self, location: GeoLocation) {
        self.continent = location.continent;
        self.country = location.country;
        self.city = location.city;
    }
}

/// Derives [`EnrichmentRecord`]s from request metadata
#[derive(Clone)]
pub struct IdentityResolver {
    geo: Arc<dyn GeoLookup>,
    loopback_sentinel: String,
    lookup_timeout: Duration,
}

impl IdentityResolver {
    /// Create a resolver with an explicit lookup timeout
    pub fn new(
        geo: Arc<dyn GeoLookup>,
        config: &IdentityConfig,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            geo,
            loopback_sentinel: config.loopback_sentinel.clone(),
            lookup_timeout,
        }
    }

    /// Create a resolver whose timeout covers every attempt the geo client may make
    pub fn from_config(
        geo: Arc<dyn GeoLookup>,
        identity: &IdentityConfig,
        geo_config: &GeoConfig,
    ) -> Self {
        Self::new(geo, identity, lookup_budget(geo_config))
    }

    /// Resolve the enrichment record for one request
    pub async fn resolve(&self, remote_addr: &str, user_agent: Option<&str>) -> EnrichmentRecord {
        let mut record = EnrichmentRecord::with_ip(self.effective_ip(remote_addr));

        let agent = user_agent::parse(user_agent.unwrap_or_default());
        if agent.os.is_empty() || agent.browser.is_empty() {
            debug!(user_agent = ?user_agent, "User-Agent only partially recognized");
        }
        record.os = agent.os;
        record.browser = agent.browser;

        if record.ip.is_empty() {
            warn!("No client address available, skipping geo lookup");
            return record;
        }

        match tokio::time::timeout(self.lookup_timeout, self.geo.lookup(&record.ip)).await {
            Ok(Ok(location)) => record.apply_location(location),
            Ok(Err(e)) => {
                warn!(ip = %record.ip, error = %e, "Geo lookup failed, enrichment degraded");
            }
            Err(_) => {
                warn!(
                    ip = %record.ip,
                    timeout_ms = self.lookup_timeout.as_millis(),
                    "Geo lookup timed out, enrichment degraded"
                );
            }
        }

        record
    }

    /// Map loopback clients to the sentinel address; everything else passes through.
    pub fn effective_ip(&self, remote_addr: &str) -> String {
        let trimmed = remote_addr.trim();
        match trimmed.parse::<IpAddr>() {
            Ok(addr) if addr.is_loopback() => self.loopback_sentinel.clone(),
            _ => trimmed.to_string(),
        }
    }
}

/// Upper bound on a full geo lookup, retries and backoff included.
fn lookup_budget(config: &GeoConfig) -> Duration {
    let attempts = u64::from(config.max_retries).saturating_add(1);
    let backoff = config
        .retry_delay_ms
        .saturating_mul(2_u64.saturating_pow(config.max_retries) - 1);
    let requests = config.timeout_ms.saturating_mul(attempts);
    Duration::from_millis(requests.saturating_add(backoff))
}
