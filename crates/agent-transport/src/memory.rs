//! # In-Memory Broker
//!
//! A `Transport` backend living entirely in process.
//!
//! Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
//! semantics. Every subscription sees every frame and filters by route, the
//! way a topic exchange binds queues. Publishing with no subscriber drops the
//! frame, as a broker does with an unroutable message.
//!
//! Clones share the same channel, so one clone can play the agent and
//! another the orchestrator.

use crate::topics::{Route, TransportProtocol};
use crate::transport::{InboundFrame, Subscription, Transport};
use crate::{TransportError, DEFAULT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

struct BrokerInner {
    /// `None` once closed.
    sender: RwLock<Option<broadcast::Sender<InboundFrame>>>,
    frames_published: AtomicU64,
    capacity: usize,
}

/// In-memory implementation of `Transport`.
#[derive(Clone)]
pub struct InMemoryBroker {
    protocol: TransportProtocol,
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create a broker speaking `protocol` with default capacity.
    #[must_use]
    pub fn new(protocol: TransportProtocol) -> Self {
        Self::with_capacity(protocol, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker with a specific per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(protocol: TransportProtocol, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            protocol,
            inner: Arc::new(BrokerInner {
                sender: RwLock::new(Some(sender)),
                frames_published: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Get the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .sender
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total frames accepted for publishing.
    #[must_use]
    pub fn frames_published(&self) -> u64 {
        self.inner.frames_published.load(Ordering::Relaxed)
    }

    /// Shut the broker down. Subscriptions drain and then end; further
    /// publishes fail with `TransportError::Closed`.
    pub fn close(&self) {
        if self.inner.sender.write().take().is_some() {
            debug!("in-memory broker closed");
        }
    }

    /// Returns true once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.sender.read().is_none()
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    fn protocol(&self) -> TransportProtocol {
        self.protocol
    }

    async fn publish(&self, route: &Route, payload: Vec<u8>) -> Result<(), TransportError> {
        let guard = self.inner.sender.read();
        let sender = guard.as_ref().ok_or(TransportError::Closed)?;

        self.inner.frames_published.fetch_add(1, Ordering::Relaxed);
        let size = payload.len();
        let frame = InboundFrame {
            route: route.clone(),
            payload,
        };

        match sender.send(frame) {
            Ok(receivers) => {
                debug!(route = %route, size, receivers, "Frame published");
            }
            Err(_) => {
                warn!(route = %route, size, "Frame dropped (no subscribers)");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, route: &Route) -> Result<Subscription, TransportError> {
        let receiver = self
            .inner
            .sender
            .read()
            .as_ref()
            .ok_or(TransportError::Closed)?
            .subscribe();
        debug!(route = %route, "New subscription created");
        Ok(Subscription::new(receiver, self.protocol, route.clone()))
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBroker")
            .field("protocol", &self.protocol)
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
