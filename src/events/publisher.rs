use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Event, EventTransport};
use crate::config::EventsConfig;
use crate::error::{AppError, AppResult, TransportError};

/// Cloneable, non-blocking handle used by request tasks to enqueue events
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Enqueue an event (fire-and-forget).
    ///
    /// Returns false if the event was dropped because the queue is full or
    /// the publisher has shut down.
    pub fn publish(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    channel = %event.channel,
                    event = %event.name,
                    "Event queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!(
                    channel = %event.channel,
                    event = %event.name,
                    "Event publisher closed, dropping event"
                );
                false
            }
        }
    }

    /// Number of events dropped before reaching the queue
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bounded outbound event queue with a background delivery worker
pub struct EventPublisher {
    sender: EventSender,
    worker_handle: Option<JoinHandle<()>>,
}

impl EventPublisher {
    /// Start a publisher delivering to `transports`. Must be called within a tokio runtime.
    pub fn new(transports: Vec<Arc<dyn EventTransport>>, config: &EventsConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
        let publish_timeout = Duration::from_millis(config.publish_timeout_ms);

        info!(
            transports = transports.len(),
            buffer_size = config.buffer_size,
            "Event publisher starting"
        );

        let worker_handle = tokio::spawn(async move {
            Self::worker_loop(rx, transports, publish_timeout).await;
        });

        Self {
            sender: EventSender {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            worker_handle: Some(worker_handle),
        }
    }

    /// Handle for enqueueing events
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Background worker loop
    async fn worker_loop(
        mut rx: mpsc::Receiver<Event>,
        transports: Vec<Arc<dyn EventTransport>>,
        publish_timeout: Duration,
    ) {
        // One event at a time keeps per-transport delivery in enqueue order.
        while let Some(event) = rx.recv().await {
            Self::deliver(&transports, &event, publish_timeout).await;
        }

        debug!("Event publisher worker loop exited");
    }

    /// Deliver one event to all transports in parallel
    async fn deliver(
        transports: &[Arc<dyn EventTransport>],
        event: &Event,
        publish_timeout: Duration,
    ) {
        let futures: Vec<_> = transports
            .iter()
            .map(|transport| async move {
                let delivery = tokio::time::timeout(publish_timeout, transport.publish(event));
                let result = match delivery.await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout {
                        timeout_ms: publish_timeout.as_millis() as u64,
                    }),
                };
                (transport.name(), result)
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        // Log any delivery failures but don't propagate
        for (transport, result) in results {
            match result {
                Ok(()) => debug!(
                    transport = %transport,
                    channel = %event.channel,
                    event = %event.name,
                    "Event delivered"
                ),
                Err(e) => warn!(
                    transport = %transport,
                    channel = %event.channel,
                    event = %event.name,
                    error = %e,
                    "Failed to deliver event"
                ),
            }
        }
    }

    /// Gracefully shut down, delivering every queued event first.
    ///
    /// Events enqueued through senders that are still alive after this call
    /// are dropped.
    pub async fn shutdown(mut self) -> AppResult<()> {
        let dropped = self.sender.dropped();
        // Dropping our sender closes the queue once request handles are gone.
        drop(self.sender);

        if let Some(handle) = self.worker_handle.take() {
            handle.await.map_err(|e| AppError::Internal {
                message: format!("Event publisher worker panicked: {}", e),
            })?;
        }

        info!(dropped_events = dropped, "Event publisher shutdown complete");
        Ok(())
    }
}
