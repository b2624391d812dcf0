//! # Envelope
//!
//! The signed (and optionally encrypted) wire unit carrying one domain
//! message plus its routing and sequencing header.
//!
//! ## Security Properties
//!
//! - **Versioning**: every envelope carries `version`; the signing layout is
//!   tied to it.
//! - **Reproducible Signatures**: `signing_bytes()` lays the header out in a
//!   fixed order with length prefixes, independent of JSON formatting.
//! - **Envelope Authority**: `sender_id` is the sole source of identity.
//! - **Flag Binding**: `encrypted`, `session_token` and `reply_to` are part of
//!   the signed bytes, so stripping or swapping them breaks the signature.

use crate::entities::{AgentId, Signature};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current envelope protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default upper bound on an encoded envelope (1 MiB).
pub const DEFAULT_MAX_ENVELOPE_BYTES: usize = 1024 * 1024;

/// Routing and sequencing header.
///
/// Field order here is the order used by `signing_bytes()`; adding a field
/// requires a new `PROTOCOL_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Sender identity. Payloads MUST NOT duplicate this.
    pub sender_id: AgentId,
    /// Intended recipient.
    pub recipient_id: AgentId,
    /// Stable wire name of the body type (see `MessageType`).
    pub message_type: String,
    /// Strictly increasing per sender within a session.
    pub sequence_number: u64,
    /// Unix milliseconds at creation (sender wall clock).
    pub timestamp: u64,
    /// Session the envelope belongs to; absent before checkin completes.
    #[serde(default)]
    pub session_token: Option<String>,
    /// Correlates request/response pairs.
    pub correlation_id: Uuid,
    /// Topic to publish a response to.
    #[serde(default)]
    pub reply_to: Option<String>,
    /// True when `body` holds a `SealedBody` instead of the plain payload.
    pub encrypted: bool,
}

impl EnvelopeHeader {
    /// Canonical bytes of the header for the given protocol version.
    #[must_use]
    pub fn signing_bytes(&self, version: u16) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(&version.to_be_bytes());
        put_field(&mut buf, self.sender_id.as_str().as_bytes());
        put_field(&mut buf, self.recipient_id.as_str().as_bytes());
        put_field(&mut buf, self.message_type.as_bytes());
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        put_optional_field(&mut buf, self.session_token.as_deref());
        buf.extend_from_slice(self.correlation_id.as_bytes());
        put_optional_field(&mut buf, self.reply_to.as_deref());
        buf.push(u8::from(self.encrypted));
        buf
    }
}

/// An encrypted body: the symmetric content key wrapped for the recipient
/// plus the body ciphertext.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBody {
    /// Sender's one-time X25519 public key for the key wrap.
    #[serde_as(as = "Hex")]
    pub ephemeral_public_key: [u8; 32],
    /// Nonce of the key-wrap AEAD.
    #[serde_as(as = "Hex")]
    pub key_nonce: [u8; 24],
    /// Content key encrypted under the key-encryption key.
    #[serde_as(as = "Hex")]
    pub wrapped_key: Vec<u8>,
    /// Nonce of the body AEAD.
    #[serde_as(as = "Hex")]
    pub body_nonce: [u8; 24],
    /// Body encrypted under the content key.
    #[serde_as(as = "Hex")]
    pub ciphertext: Vec<u8>,
}

/// The wire envelope.
///
/// `body` is kept as the exact text that was signed: the JSON of the payload
/// for plain envelopes, the JSON of a `SealedBody` for encrypted ones.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version. MUST be checked before anything else is trusted.
    pub version: u16,
    /// Routing and sequencing header.
    pub header: EnvelopeHeader,
    /// Signed body text.
    pub body: String,
    /// Ed25519 signature over `signing_bytes()`; absent on unsigned envelopes.
    #[serde_as(as = "Option<Hex>")]
    pub signature: Option<Signature>,
}

impl Envelope {
    /// Build an unsigned envelope at the current protocol version.
    #[must_use]
    pub fn new(header: EnvelopeHeader, body: String) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            header,
            body,
            signature: None,
        }
    }

    /// Bytes covered by the signature: header layout followed by the body.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = self.header.signing_bytes(self.version);
        put_field(&mut buf, self.body.as_bytes());
        buf
    }

    /// Returns true if the envelope carries a signature.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Returns the current Unix timestamp in milliseconds.
///
/// A clock before `UNIX_EPOCH` yields 0 instead of panicking.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn put_field(buf: &mut Vec<u8>, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn put_optional_field(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(v) => {
            buf.push(1);
            put_field(buf, v.as_bytes());
        }
        None => buf.push(0),
    }
}
