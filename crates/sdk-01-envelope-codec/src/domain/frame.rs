//! # Envelope Framing
//!
//! `Envelope` <-> wire bytes.
//!
//! ## Decode Order
//!
//! 1. Size limit, before any parsing
//! 2. JSON well-formedness
//! 3. Protocol version
//! 4. Header and body field types
//!
//! Nothing after a failed step is attempted; there is no partial decode.

use agent_types::{DecodeError, EncodeError, Envelope, PROTOCOL_VERSION};
use serde_json::Value;

/// Serialize an envelope to wire bytes.
///
/// # Errors
///
/// `EncodeError::TooLarge` if the result exceeds `max_bytes`.
pub fn encode_envelope(envelope: &Envelope, max_bytes: usize) -> Result<Vec<u8>, EncodeError> {
    let bytes =
        serde_json::to_vec(envelope).map_err(|e| EncodeError::Serialization(e.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(EncodeError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }
    Ok(bytes)
}

/// Parse wire bytes into an envelope.
///
/// The body is left as text; it is only interpreted after the signature has
/// been checked.
pub fn decode_envelope(bytes: &[u8], max_bytes: usize) -> Result<Envelope, DecodeError> {
    if bytes.len() > max_bytes {
        return Err(DecodeError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| DecodeError::Malformed("missing or invalid version".to_string()))?;
    if version != u64::from(PROTOCOL_VERSION) {
        return Err(DecodeError::UnsupportedVersion {
            received: u16::try_from(version).unwrap_or(u16::MAX),
            supported: PROTOCOL_VERSION,
        });
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if envelope.header.message_type.is_empty() {
        return Err(DecodeError::Malformed("empty message_type".to_string()));
    }
    Ok(envelope)
}
