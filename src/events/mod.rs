//! Real-time visitor notifications.
//!
//! Ingestion hands [`Event`]s to an [`EventSender`]; a background worker owned
//! by the [`EventPublisher`] delivers them to every registered
//! [`EventTransport`]. Delivery is at-most-once and never blocks ingestion.

mod broadcast;
mod http;
mod publisher;

pub use broadcast::BroadcastTransport;
pub use http::{sign, HttpTransport, KEY_HEADER, SIGNATURE_HEADER};
pub use publisher::{EventPublisher, EventSender};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TransportResult;
use crate::storage::Session;

/// Channel carrying new-session notifications.
pub const SESSION_CHANNEL: &str = "session";
/// Channel carrying page-view notifications.
pub const PAGEVIEW_CHANNEL: &str = "pageview";
/// Event name used on both channels.
pub const NEW_EVENT: &str = "new";

/// Flat string payload of an event.
pub type EventPayload = BTreeMap<String, String>;

/// One notification bound for subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Channel name (`session` or `pageview`).
    pub channel: String,
    /// Event name within the channel.
    pub name: String,
    /// Event data.
    pub payload: EventPayload,
}

impl Event {
    /// Create an event
    pub fn new(channel: impl Into<String>, name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            channel: channel.into(),
            name: name.into(),
            payload,
        }
    }

    /// `session`/`new` carrying the full enrichment snapshot and token
    pub fn session_created(session: &Session) -> Self {
        let payload = EventPayload::from([
            ("ip".to_string(), session.ip.clone()),
            ("continent".to_string(), session.continent.clone()),
            ("country".to_string(), session.country.clone()),
            ("city".to_string(), session.city.clone()),
            ("os".to_string(), session.os.clone()),
            ("browser".to_string(), session.browser.clone()),
            ("session".to_string(), session.token.clone()),
            ("time".to_string(), session.created_at.to_rfc3339()),
        ]);
        Self::new(SESSION_CHANNEL, NEW_EVENT, payload)
    }

    /// `pageview`/`new` for one recorded visit
    pub fn page_viewed(
        page: &str,
        session_token: &str,
        ip: &str,
        visit_count: i64,
        at: DateTime<Utc>,
    ) -> Self {
        let payload = EventPayload::from([
            ("page".to_string(), page.to_string()),
            ("session".to_string(), session_token.to_string()),
            ("ip".to_string(), ip.to_string()),
            ("visits".to_string(), visit_count.to_string()),
            ("time".to_string(), at.to_rfc3339()),
        ]);
        Self::new(PAGEVIEW_CHANNEL, NEW_EVENT, payload)
    }

    /// Payload value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

/// Outbound delivery mechanism for events.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one event.
    async fn publish(&self, event: &Event) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EnrichmentRecord;

    #[test]
    fn test_session_created_payload_has_every_field() {
        let enrichment = EnrichmentRecord {
            ip: "203.0.113.9".to_string(),
            os: "Windows".to_string(),
            browser: "Chrome".to_string(),
            continent: "Asia".to_string(),
            country: "Japan".to_string(),
            city: "Tokyo".to_string(),
        };
        let session = Session::new("tok", &enrichment);

        let event = Event::session_created(&session);

        assert_eq!(event.channel, "session");
        assert_eq!(event.name, "new");
        assert_eq!(event.payload.len(), 8);
        assert_eq!(event.get("city"), Some("Tokyo"));
        assert_eq!(event.get("session"), Some("tok"));
        assert_eq!(event.get("time"), Some(session.created_at.to_rfc3339().as_str()));
    }

    #[test]
    fn test_page_viewed_payload() {
        let event = Event::page_viewed("about", "tok", "10.1.1.1", 3, Utc::now());

        assert_eq!(event.channel, "pageview");
        assert_eq!(event.name, "new");
        assert_eq!(event.get("page"), Some("about"));
        assert_eq!(event.get("visits"), Some("3"));
        assert_eq!(event.get("ip"), Some("10.1.1.1"));
        assert!(event.get("missing").is_none());
    }
}
