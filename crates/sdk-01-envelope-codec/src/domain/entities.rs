//! # Codec Entities
//!
//! Configuration and intermediate values of the Envelope Codec.

use agent_types::DEFAULT_MAX_ENVELOPE_BYTES;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do with a message type outside the recognized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Fail with `DecodeError::UnknownType`.
    #[default]
    Reject,
    /// Deliver as `AgentMessage::Unknown` with the raw JSON body.
    PassThrough,
}

impl FromStr for UnknownTypePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "pass_through" | "passthrough" => Ok(Self::PassThrough),
            other => Err(format!("unknown type policy '{other}'")),
        }
    }
}

/// Codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest encoded envelope accepted or produced.
    pub max_envelope_bytes: usize,
    /// Handling of unrecognized message types.
    pub unknown_types: UnknownTypePolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_envelope_bytes: DEFAULT_MAX_ENVELOPE_BYTES,
            unknown_types: UnknownTypePolicy::Reject,
        }
    }
}

/// A message reduced to its wire name and body text.
///
/// `body` is the exact text later signed and, for encrypted envelopes,
/// sealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// Value for `EnvelopeHeader::message_type`.
    pub message_type: String,
    /// Canonical JSON of the payload.
    pub body: String,
}
