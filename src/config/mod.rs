use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Geo-lookup provider.
    pub geo: GeoConfig,
    /// Identity enrichment.
    pub identity: IdentityConfig,
    /// SQLite database.
    pub database: DatabaseConfig,
    /// Event queue and transports.
    pub events: EventsConfig,
    /// HTTP server.
    pub server: ServerConfig,
    /// Logging output.
    pub logging: LoggingConfig,
}

/// Geo-lookup provider configuration
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Provider base URL; lookups go to `<base_url>/lookup/<ip>`.
    pub base_url: String,
    /// Per-attempt request timeout.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff, doubled on each retry.
    pub retry_delay_ms: u64,
}

/// Visitor identity configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Address substituted for loopback clients so local testing gets real geo data.
    pub loopback_sentinel: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path; parent directories are created on startup.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Event transport configuration
#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// HTTP event gateway; `None` keeps events in-process only.
    pub gateway: Option<GatewayConfig>,
    /// Capacity of the outbound event queue.
    pub buffer_size: usize,
    /// Per-transport delivery timeout.
    pub publish_timeout_ms: u64,
}

/// Credentials for the HTTP event gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Application id in the event path.
    pub app_id: String,
    /// Public key sent with every request.
    pub key: String,
    /// Signing secret.
    pub secret: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Name of the session cookie.
    pub cookie_name: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Upper bound on `GEO_MAX_RETRIES`; larger values are clamped.
pub const MAX_GEO_RETRIES: u32 = 10;

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let geo = GeoConfig {
            base_url: env::var("GEO_BASE_URL")
                .unwrap_or_else(|_| "https://www.iplocate.io/api".to_string()),
            timeout_ms: parse_env("GEO_TIMEOUT_MS", 3000),
            max_retries: parse_env::<u32>("GEO_MAX_RETRIES", 0).min(MAX_GEO_RETRIES),
            retry_delay_ms: parse_env("GEO_RETRY_DELAY_MS", 200),
        };

        let identity = IdentityConfig {
            loopback_sentinel: env::var("LOOPBACK_SENTINEL_IP")
                .unwrap_or_else(|_| IdentityConfig::default().loopback_sentinel),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/visitors.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
        };

        let gateway = match env::var("EVENTS_URL") {
            Ok(base_url) if !base_url.trim().is_empty() => {
                let secret = env::var("EVENTS_SECRET").unwrap_or_default();
                if secret.is_empty() {
                    return Err(AppError::Config {
                        message: "EVENTS_SECRET is required when EVENTS_URL is set".to_string(),
                    });
                }
                Some(GatewayConfig {
                    base_url,
                    app_id: env::var("EVENTS_APP_ID").unwrap_or_default(),
                    key: env::var("EVENTS_KEY").unwrap_or_default(),
                    secret,
                })
            }
            _ => None,
        };

        let events = EventsConfig {
            gateway,
            buffer_size: parse_env("EVENTS_BUFFER_SIZE", 1024),
            publish_timeout_ms: parse_env("EVENTS_PUBLISH_TIMEOUT_MS", 3000),
        };

        let port = match env::var("SERVER_PORT") {
            Ok(raw) => raw.parse().map_err(|_| AppError::Config {
                message: format!("SERVER_PORT must be a port number, got '{}'", raw),
            })?,
            Err(_) => 5000,
        };

        let server = ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "visitor_session".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            geo,
            identity,
            database,
            events,
            server,
            logging,
        })
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.iplocate.io/api".to_string(),
            timeout_ms: 3000,
            max_retries: 0,
            retry_delay_ms: 200,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            loopback_sentinel: "72.229.28.185".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            gateway: None,
            buffer_size: 1024,
            publish_timeout_ms: 3000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cookie_name: "visitor_session".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_config_default() {
        let config = GeoConfig::default();
        assert_eq!(config.base_url, "https://www.iplocate.io/api");
        assert_eq!(config.timeout_ms, 3000);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_identity_config_default_sentinel() {
        assert_eq!(IdentityConfig::default().loopback_sentinel, "72.229.28.185");
    }

    #[test]
    fn test_events_config_default_is_in_process_only() {
        let config = EventsConfig::default();
        assert!(config.gateway.is_none());
        assert_eq!(config.buffer_size, 1024);
    }
}
