//! # Agent Types
//!
//! Shared vocabulary of the fleet agent SDK: identities, the closed set of
//! message variants, and the wire envelope.
//!
//! ## Modules
//!
//! - `entities`: agent identity, status and public key bundles
//! - `messages`: `MessageType` registry and the `AgentMessage` tagged union
//! - `envelope`: header, sealed body and the signed wire envelope
//! - `errors`: `DecodeError` / `EncodeError`

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod messages;

pub use entities::{
    AgentId, AgentStatus, EncryptionPublicKey, PublicKeyBundle, Signature, SigningPublicKey,
    YardUid, ORCHESTRATOR_ID, PUBLIC_KEY_FORMAT,
};
pub use envelope::{
    current_timestamp_millis, Envelope, EnvelopeHeader, SealedBody, DEFAULT_MAX_ENVELOPE_BYTES,
    PROTOCOL_VERSION,
};
pub use errors::{DecodeError, EncodeError};
pub use messages::*;
