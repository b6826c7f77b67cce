//! Geo-lookup collaborator.
//!
//! Resolves a client address to approximate geography through an external
//! HTTP provider (`GET <base>/lookup/<ip>`). Callers treat every error as
//! degraded enrichment rather than a request failure.

mod client;
mod types;


pub use client::GeoClient;
pub use types::GeoLocation;

use async_trait::async_trait;

use crate::error::GeoResult;

/// Source of approximate geography for a network address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Look up the location of `ip`.
    async fn lookup(&self, ip: &str) -> GeoResult<GeoLocation>;
}
