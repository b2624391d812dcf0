//! # Error Types
//!
//! Codec errors shared by every crate that touches the wire format.

use thiserror::Error;

/// Errors raised while turning bytes into an envelope or a typed message.
///
/// Decode failures are never retried: they mean corruption or an untrusted
/// sender, and the caller decides whether to drop or alert.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Required fields are missing or have the wrong type.
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// The header names a message type outside the recognized set.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// The input exceeds the configured maximum; nothing was decoded.
    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// The envelope was produced by an incompatible protocol version.
    #[error("Unsupported version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },
}

/// Errors raised while encoding a message or envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The serializer rejected the value.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The encoded form exceeds the configured maximum.
    #[error("Encoded size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },
}
