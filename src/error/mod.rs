use thiserror::Error;

/// Application-level errors
///
/// Geo and transport failures never reach this level: enrichment degrades
/// and event delivery is fire-and-forget.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    /// A storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Unexpected failure outside the storage path.
    #[error("Internal error: {message}")]
    Internal {
        /// What failed.
        message: String,
    },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not open or reach the database.
    #[error("Database connection failed: {message}")]
    Connection {
        /// Driver message.
        message: String,
    },

    /// A query returned data that could not be decoded.
    #[error("Query failed: {message}")]
    Query {
        /// What could not be decoded.
        message: String,
    },

    /// The session token is already taken.
    #[error("Session already exists: {token}")]
    SessionExists {
        /// Conflicting token.
        token: String,
    },

    /// No session has this token.
    #[error("Session not found: {token}")]
    SessionNotFound {
        /// Requested token.
        token: String,
    },

    /// Schema migration failed.
    #[error("Migration failed: {message}")]
    Migration {
        /// Migrator message.
        message: String,
    },

    /// Any other driver error.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Geo-lookup provider errors
#[derive(Debug, Error)]
pub enum GeoError {
    /// Provider answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Response body was not a usable location object.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// What was wrong with the body.
        message: String,
    },

    /// No answer within the configured timeout.
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout that expired.
        timeout_ms: u64,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Event transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Gateway answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Delivery did not finish within the publish timeout.
    #[error("Publish timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout that expired.
        timeout_ms: u64,
    },

    /// Payload could not be encoded.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for geo lookups
pub type GeoResult<T> = Result<T, GeoError>;

/// Result type alias for event transports
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Database connection failed: failed to connect");

        let err = StorageError::SessionExists {
            token: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Session already exists: abc");

        let err = StorageError::SessionNotFound {
            token: "sess-123".to_string(),
        };
        assert_eq!(err.to_string(), "Session not found: sess-123");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_geo_error_display() {
        let err = GeoError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - rate limited");

        let err = GeoError::InvalidResponse {
            message: "missing city".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: missing city");

        let err = GeoError::Timeout { timeout_ms: 3000 };
        assert_eq!(err.to_string(), "Request timeout after 3000ms");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Api {
            status: 401,
            message: "bad signature".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - bad signature");

        let err = TransportError::Timeout { timeout_ms: 500 };
        assert_eq!(err.to_string(), "Publish timeout after 500ms");
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let storage_err = StorageError::SessionNotFound {
            token: "test-123".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }
}
