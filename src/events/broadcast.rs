use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use super::{Event, EventTransport};
use crate::error::TransportResult;

/// In-process fan-out to live subscribers (the dashboard event stream).
///
/// Slow subscribers that fall more than `capacity` events behind skip the
/// missed events rather than holding up delivery.
#[derive(Clone)]
pub struct BroadcastTransport {
    tx: broadcast::Sender<Event>,
}

impl BroadcastTransport {
    /// Create a transport retaining up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventTransport for BroadcastTransport {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn publish(&self, event: &Event) -> TransportResult<()> {
        // No subscribers is not a delivery failure.
        if self.tx.send(event.clone()).is_err() {
            trace!(channel = %event.channel, "No live subscribers for event");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPayload, NEW_EVENT, SESSION_CHANNEL};

    fn event() -> Event {
        Event::new(SESSION_CHANNEL, NEW_EVENT, EventPayload::new())
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let transport = BroadcastTransport::new(8);
        assert_eq!(transport.subscriber_count(), 0);
        assert!(transport.publish(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let transport = BroadcastTransport::new(8);
        let mut first = transport.subscribe();
        let mut second = transport.subscribe();

        transport.publish(&event()).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), event());
        assert_eq!(second.recv().await.unwrap(), event());
    }
}
