//! HTTP surface.
//!
//! This module provides:
//! - Visitor-facing tracked pages (one ingestion per request)
//! - Dashboard listing and per-session detail endpoints
//! - A server-sent event stream of live notifications
//! - Shared application state management

mod handlers;

pub use handlers::*;

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::events::BroadcastTransport;
use crate::pipeline::IngestionPipeline;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend (dashboard reads).
    pub storage: SqliteStorage,
    /// Page-view ingestion pipeline.
    pub pipeline: IngestionPipeline,
    /// In-process event fan-out feeding `/events`.
    pub broadcast: BroadcastTransport,
    /// Cancelled when the server begins shutting down; ends open event streams.
    pub shutdown_token: CancellationToken,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        pipeline: IngestionPipeline,
        broadcast: BroadcastTransport,
    ) -> Self {
        Self {
            config,
            storage,
            pipeline,
            broadcast,
            shutdown_token: CancellationToken::new(),
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

/// Build the router with all routes
pub fn router(state: SharedState) -> Router {
    Router::new()
        // Tracked pages
        .route("/about", get(handlers::about))
        .route("/pages/{page}", get(handlers::page))
        // Dashboard
        .route("/dashboard", get(handlers::dashboard))
        .route("/dashboard/{session}", get(handlers::session_pages))
        .route("/get-all-sessions", get(handlers::all_sessions))
        .route("/events", get(handlers::events))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves
pub async fn serve(
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> AppResult<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Failed to bind {}: {}", addr, e),
        })?;

    serve_on(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Resolving `shutdown` also cancels `state.shutdown_token`, so long-lived
/// `/events` streams end and graceful shutdown can complete.
pub async fn serve_on(
    listener: TcpListener,
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> AppResult<()> {
    let local_addr = listener.local_addr().map_err(|e| AppError::Internal {
        message: format!("Failed to read listener address: {}", e),
    })?;
    info!(addr = %local_addr, "HTTP server listening");

    let token = state.shutdown_token.clone();
    let shutdown = async move {
        shutdown.await;
        token.cancel();
    };

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| AppError::Internal {
        message: format!("HTTP server error: {}", e),
    })
}
