use clap::{Parser, Subcommand};
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use visitor_pulse::{
    config::{Config, LogFormat},
    events::{BroadcastTransport, EventPublisher, EventTransport, HttpTransport},
    geo::GeoClient,
    identity::IdentityResolver,
    pipeline::IngestionPipeline,
    server::{self, AppState},
    storage::SqliteStorage,
};

/// Events retained per live dashboard subscriber before it starts skipping.
const DASHBOARD_BACKLOG: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "visitor-pulse", version, about = "Page-view ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Apply migrations and run the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Visitor Pulse starting..."
    );

    // Initialize storage (runs migrations)
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => {
            info!("Database schema is up to date");
            Ok(())
        }
        Command::Serve => serve(config, storage).await,
    }
}

async fn serve(config: Config, storage: SqliteStorage) -> anyhow::Result<()> {
    // Initialize geo client
    let geo = match GeoClient::new(&config.geo) {
        Ok(c) => {
            info!(base_url = %config.geo.base_url, "Geo client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize geo client");
            return Err(e.into());
        }
    };
    let identity = IdentityResolver::from_config(Arc::new(geo), &config.identity, &config.geo);

    // Event transports
    let broadcast = BroadcastTransport::new(DASHBOARD_BACKLOG);
    let mut transports: Vec<Arc<dyn EventTransport>> = vec![Arc::new(broadcast.clone())];
    match &config.events.gateway {
        Some(gateway) => {
            let transport = HttpTransport::new(gateway, config.events.publish_timeout_ms)?;
            info!(url = %transport.url(), "HTTP event gateway enabled");
            transports.push(Arc::new(transport));
        }
        None => warn!("EVENTS_URL not set, events only reach the live dashboard"),
    }
    let publisher = EventPublisher::new(transports, &config.events);

    let pipeline = IngestionPipeline::new(
        identity,
        Arc::new(storage.clone()),
        Arc::new(storage.clone()),
        publisher.sender(),
    );

    // Create application state
    let state = Arc::new(AppState::new(config, storage, pipeline, broadcast));

    if let Err(e) = server::serve(state, shutdown_signal()).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    // All request handles are gone once serve returns; drain queued events.
    publisher.shutdown().await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
