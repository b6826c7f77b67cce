//! Integration tests for the geo-lookup client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use visitor_pulse::config::GeoConfig;
use visitor_pulse::error::GeoError;
use visitor_pulse::geo::{GeoClient, GeoLocation, GeoLookup};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> GeoClient {
    let config = GeoConfig {
        base_url: base_url.to_string(),
        timeout_ms: 500,
        max_retries,
        retry_delay_ms: 10,
    };

    GeoClient::new(&config).expect("Failed to create client")
}

#[tokio::test]
async fn test_successful_lookup() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lookup/72.229.28.185"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip": "72.229.28.185",
            "country": "United States",
            "continent": "North America",
            "city": "New York",
            "time_zone": "America/New_York"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 0);
    let location = client.lookup("72.229.28.185").await.unwrap();

    assert_eq!(
        location,
        GeoLocation::new("North America", "United States", "New York")
    );
}

#[tokio::test]
async fn test_non_success_status_is_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 0);
    let err = client.lookup("203.0.113.1").await.unwrap_err();

    match err {
        GeoError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "slow down");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 3);
    let err = client.lookup("203.0.113.1").await.unwrap_err();

    // Not retried: a malformed body will not fix itself.
    assert!(matches!(err, GeoError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_wrong_shape_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "reserved range"
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 0);
    let err = client.lookup("10.0.0.1").await.unwrap_err();

    assert!(matches!(err, GeoError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 2);
    let err = client.lookup("203.0.113.1").await.unwrap_err();

    assert!(matches!(err, GeoError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"country": "", "continent": "", "city": ""}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 0);
    let err = client.lookup("203.0.113.1").await.unwrap_err();

    assert!(matches!(err, GeoError::Timeout { timeout_ms: 500 }));
}

#[tokio::test]
async fn test_unreachable_provider_is_http_error() {
    // Nothing listens on port 9 (discard) in the test environment.
    let client = create_test_client("http://127.0.0.1:9", 0);
    let err = client.lookup("203.0.113.1").await.unwrap_err();

    assert!(matches!(err, GeoError::Http(_) | GeoError::Timeout { .. }));
}
