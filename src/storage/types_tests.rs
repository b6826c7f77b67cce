//! Unit tests for storage record types.

use super::*;

fn sample_enrichment() -> EnrichmentRecord {
    EnrichmentRecord {
        ip: "72.229.28.185".to_string(),
        os: "Macintosh".to_string(),
        browser: "Safari".to_string(),
        continent: "North America".to_string(),
        country: "United States".to_string(),
        city: "New York".to_string(),
    }
}

#[test]
fn test_session_new_copies_every_enrichment_field() {
    let enrichment = sample_enrichment();
    let session = Session::new("tok-1", &enrichment);

    assert_eq!(session.token, "tok-1");
    assert_eq!(session.ip, "72.229.28.185");
    assert_eq!(session.continent, "North America");
    assert_eq!(session.country, "United States");
    assert_eq!(session.city, "New York");
    assert_eq!(session.os, "Macintosh");
    assert_eq!(session.browser, "Safari");
}

#[test]
fn test_session_enrichment_roundtrip() {
    let enrichment = sample_enrichment();
    let session = Session::new("tok-2", &enrichment);
    assert_eq!(session.enrichment(), enrichment);
}

#[test]
fn test_session_serializes_with_token() {
    let session = Session::new("tok-3", &sample_enrichment());
    let json = serde_json::to_value(&session).unwrap();

    assert_eq!(json["token"], "tok-3");
    assert_eq!(json["city"], "New York");
    assert!(json["created_at"].is_string());
}

#[test]
fn test_visit_outcome_serialization() {
    let outcome = VisitOutcome {
        created: true,
        visit_count: 1,
        first_visited_at: Utc::now(),
    };
    let json = serde_json::to_value(outcome).unwrap();

    assert_eq!(json["created"], true);
    assert_eq!(json["visit_count"], 1);
}
