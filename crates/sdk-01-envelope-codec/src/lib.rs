//! # Envelope Codec Subsystem (SDK-01)
//!
//! Converts typed agent messages to and from wire bytes, independent of
//! transport and of cryptography.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Pure transforms, no I/O
//! - **Ports Layer** (`ports/`): Trait definitions for the inbound interface
//! - **Service Layer** (`service.rs`): Wires domain logic to ports
//!
//! ## Guarantees
//!
//! - `encode` is total over every variant and deterministic
//! - Oversized input fails with `TooLarge` before any parsing
//! - Unknown types are rejected or passed through by policy, never coerced
//!   into a default-valued message

pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::body::{decode_body, encode_body};
pub use domain::entities::{CodecConfig, EncodedBody, UnknownTypePolicy};
pub use domain::frame::{decode_envelope, encode_envelope};
pub use ports::inbound::EnvelopeCodecApi;
pub use service::EnvelopeCodecService;
