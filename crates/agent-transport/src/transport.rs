//! # Transport Port
//!
//! The seam between the agent core and a broker client library.
//!
//! The core only ever calls [`Transport::publish`] and
//! [`Transport::subscribe`]. Connection setup, TLS, retries and broker
//! addressing stay inside the backend. Timeouts are applied by the caller.

use crate::topics::{key_matches, Route, TransportProtocol};
use crate::TransportError;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// One message as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Route the message was published to.
    pub route: Route,
    /// Raw bytes, normally an encoded envelope.
    pub payload: Vec<u8>,
}

/// Publish/subscribe access to a broker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Naming scheme this backend speaks.
    fn protocol(&self) -> TransportProtocol;

    /// Publish raw bytes to `route`.
    async fn publish(&self, route: &Route, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Start receiving messages whose key matches `route.key` on
    /// `route.exchange`. Wildcards follow the backend's protocol.
    async fn subscribe(&self, route: &Route) -> Result<Subscription, TransportError>;
}

/// A subscription handle for receiving frames.
///
/// Backends feed a `broadcast` channel; the handle filters by route.
pub struct Subscription {
    receiver: broadcast::Receiver<InboundFrame>,
    protocol: TransportProtocol,
    pattern: Route,
}

impl Subscription {
    /// Wrap a backend channel, keeping only frames matching `pattern`.
    pub fn new(
        receiver: broadcast::Receiver<InboundFrame>,
        protocol: TransportProtocol,
        pattern: Route,
    ) -> Self {
        Self {
            receiver,
            protocol,
            pattern,
        }
    }

    /// The route pattern of this subscription.
    #[must_use]
    pub fn pattern(&self) -> &Route {
        &self.pattern
    }

    fn matches(&self, frame: &InboundFrame) -> bool {
        frame.route.exchange == self.pattern.exchange
            && key_matches(self.protocol, &self.pattern.key, &frame.route.key)
    }

    /// Receive the next matching frame.
    ///
    /// # Returns
    ///
    /// - `Some(frame)` - The next matching frame
    /// - `None` - The backend closed the channel
    pub async fn recv(&mut self) -> Option<InboundFrame> {
        loop {
            let frame = match self.receiver.recv().await {
                Ok(f) => f,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, route = %self.pattern, "Subscriber lagged, frames dropped");
                    continue;
                }
            };

            if self.matches(&frame) {
                return Some(frame);
            }
        }
    }

    /// Try to receive the next matching frame without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(frame))` - A matching frame was available
    /// - `Ok(None)` - Nothing available right now
    /// - `Err(TransportError::Closed)` - The backend closed the channel
    pub fn try_recv(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        loop {
            let frame = match self.receiver.try_recv() {
                Ok(f) => f,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(TransportError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.matches(&frame) {
                return Ok(Some(frame));
            }
        }
    }

    /// Convert into a stream of matching frames.
    pub fn into_stream(self) -> impl Stream<Item = InboundFrame> + Send + Unpin {
        let Self {
            receiver,
            protocol,
            pattern,
        } = self;
        BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(frame)
                if frame.route.exchange == pattern.exchange
                    && key_matches(protocol, &pattern.key, &frame.route.key) =>
            {
                Some(frame)
            }
            _ => None,
        })
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("protocol", &self.protocol)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
