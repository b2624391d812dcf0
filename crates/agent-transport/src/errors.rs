//! Transport error types.

use thiserror::Error;

/// Errors surfaced by a `Transport` backend.
///
/// Connection retries are the backend's business; by the time one of these
/// reaches the core the backend has given up on the operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection or broker was closed.
    #[error("Transport closed")]
    Closed,

    /// The backend refused the publish.
    #[error("Publish to {route} failed: {reason}")]
    PublishFailed {
        /// Route of the failed publish.
        route: String,
        /// Backend-specific reason.
        reason: String,
    },

    /// Subscription could not be established.
    #[error("Subscribe to {route} failed: {reason}")]
    SubscribeFailed {
        /// Route of the failed subscription.
        route: String,
        /// Backend-specific reason.
        reason: String,
    },

    /// Protocol name not recognized.
    #[error("Unsupported transport protocol: {0}")]
    UnsupportedProtocol(String),
}
