//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy if one is present, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use serial_test::serial;
use std::env;
use visitor_pulse::config::{Config, LogFormat, MAX_GEO_RETRIES};

#[test]
#[serial]
fn test_config_from_env_loads_with_defaults() {
    let config = Config::from_env().expect("defaults should always load");

    assert_eq!(config.identity.loopback_sentinel, "72.229.28.185");
    assert_eq!(config.server.cookie_name, "visitor_session");
    assert!(config.events.buffer_size > 0);
}

#[test]
#[serial]
fn test_config_from_env_custom_geo() {
    env::set_var("GEO_BASE_URL", "https://geo.internal/api");
    env::set_var("GEO_TIMEOUT_MS", "1500");
    env::set_var("GEO_MAX_RETRIES", "2");

    let config = Config::from_env().unwrap();
    assert_eq!(config.geo.base_url, "https://geo.internal/api");
    assert_eq!(config.geo.timeout_ms, 1500);
    assert_eq!(config.geo.max_retries, 2);

    env::remove_var("GEO_BASE_URL");
    env::remove_var("GEO_TIMEOUT_MS");
    env::remove_var("GEO_MAX_RETRIES");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/visitors.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/visitors.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_invalid_number_uses_default() {
    env::set_var("DATABASE_MAX_CONNECTIONS", "not-a-number");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.max_connections, 5);

    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_garbage_geo_numbers_use_defaults() {
    env::set_var("GEO_TIMEOUT_MS", "soon");
    env::set_var("GEO_RETRY_DELAY_MS", "-5");

    let config = Config::from_env().unwrap();
    assert_eq!(config.geo.timeout_ms, 3000);
    assert_eq!(config.geo.retry_delay_ms, 200);

    env::remove_var("GEO_TIMEOUT_MS");
    env::remove_var("GEO_RETRY_DELAY_MS");
}

#[test]
#[serial]
fn test_config_geo_retries_are_clamped() {
    env::set_var("GEO_MAX_RETRIES", "64");

    let config = Config::from_env().unwrap();
    assert_eq!(config.geo.max_retries, MAX_GEO_RETRIES);

    env::remove_var("GEO_MAX_RETRIES");
}

#[test]
#[serial]
fn test_config_invalid_port_is_error() {
    env::set_var("SERVER_PORT", "eighty");

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("SERVER_PORT"));

    env::remove_var("SERVER_PORT");
}

#[test]
#[serial]
fn test_config_gateway_requires_secret() {
    env::set_var("EVENTS_URL", "https://events.example.com");
    env::remove_var("EVENTS_SECRET");

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("EVENTS_SECRET"));

    env::remove_var("EVENTS_URL");
}

#[test]
#[serial]
fn test_config_gateway_enabled() {
    env::set_var("EVENTS_URL", "https://events.example.com");
    env::set_var("EVENTS_APP_ID", "1234");
    env::set_var("EVENTS_KEY", "public-key");
    env::set_var("EVENTS_SECRET", "shh");

    let config = Config::from_env().unwrap();
    let gateway = config.events.gateway.expect("gateway should be configured");
    assert_eq!(gateway.base_url, "https://events.example.com");
    assert_eq!(gateway.app_id, "1234");
    assert_eq!(gateway.key, "public-key");
    assert_eq!(gateway.secret, "shh");

    env::remove_var("EVENTS_URL");
    env::remove_var("EVENTS_APP_ID");
    env::remove_var("EVENTS_KEY");
    env::remove_var("EVENTS_SECRET");
}

#[test]
#[serial]
fn test_config_from_env_server_and_cookie() {
    env::set_var("SERVER_HOST", "0.0.0.0");
    env::set_var("SERVER_PORT", "8080");
    env::set_var("SESSION_COOKIE_NAME", "vp");

    let config = Config::from_env().unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.cookie_name, "vp");

    env::remove_var("SERVER_HOST");
    env::remove_var("SERVER_PORT");
    env::remove_var("SESSION_COOKIE_NAME");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    env::remove_var("LOG_FORMAT");
    env::remove_var("LOG_LEVEL");
}
