//! # Visitor Pulse
//!
//! A page-view ingestion service. Each tracked request is enriched with
//! visitor identity (address, approximate geography, OS and browser), bound
//! to a stable per-visitor session, counted against a (page, session)
//! counter, and announced to live subscribers.
//!
//! ## Features
//!
//! - **Identity enrichment**: geo lookup and User-Agent parsing that degrade to empty fields
//! - **Sessions**: write-once session records keyed by an opaque token
//! - **Page-view ledger**: atomic create-or-increment counters per (page, session)
//! - **Live events**: bounded, non-blocking fan-out to SSE subscribers and an HTTP gateway
//!
//! ## Architecture
//!
//! ```text
//! HTTP request → IngestionPipeline → IdentityResolver → Geo provider (HTTP)
//!                      ↓
//!               SQLite (sessions, pageviews)
//!                      ↓
//!               EventPublisher → SSE dashboard / HTTP gateway
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use visitor_pulse::{Config, IngestionPipeline, RequestContext};
//! use visitor_pulse::events::{BroadcastTransport, EventPublisher};
//! use visitor_pulse::geo::GeoClient;
//! use visitor_pulse::identity::IdentityResolver;
//! use visitor_pulse::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let geo = Arc::new(GeoClient::new(&config.geo)?);
//!     let identity = IdentityResolver::from_config(geo, &config.identity, &config.geo);
//!     let dashboard = Arc::new(BroadcastTransport::new(64));
//!     let publisher = EventPublisher::new(vec![dashboard], &config.events);
//!     let pipeline = IngestionPipeline::new(
//!         identity,
//!         Arc::new(storage.clone()),
//!         Arc::new(storage),
//!         publisher.sender(),
//!     );
//!     let outcome = pipeline.ingest("about", RequestContext::new("127.0.0.1")).await?;
//!     println!("session {} has {} visits", outcome.session_token, outcome.visit_count);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the service.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Event publishing and transports.
pub mod events;
/// Geo-lookup provider client.
pub mod geo;
/// Visitor identity enrichment.
pub mod identity;
/// Per-request ingestion pipeline.
pub mod pipeline;
/// HTTP routes and shared state.
pub mod server;
/// SQLite storage layer for sessions and page views.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{IngestOutcome, IngestionPipeline, RequestContext};
pub use server::{AppState, SharedState};
