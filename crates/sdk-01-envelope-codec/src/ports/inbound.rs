//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this subsystem.

use crate::domain::entities::{CodecConfig, EncodedBody};
use agent_types::{AgentMessage, DecodeError, EncodeError, Envelope, EnvelopeHeader};

/// Primary Envelope Codec API.
///
/// Implementations must be thread-safe (`Send + Sync`) and side-effect
/// free.
pub trait EnvelopeCodecApi: Send + Sync {
    /// Active configuration.
    fn config(&self) -> &CodecConfig;

    // =========================================================================
    // Body
    // =========================================================================

    /// Reduce a message to its wire type name and canonical body text.
    fn encode_body(&self, message: &AgentMessage) -> Result<EncodedBody, EncodeError>;

    /// Rebuild a typed message from a wire type name and body text.
    ///
    /// Only call this on body text whose envelope signature was verified
    /// (and which was decrypted, if sealed).
    fn decode_body(&self, message_type: &str, body: &str) -> Result<AgentMessage, DecodeError>;

    // =========================================================================
    // Envelope
    // =========================================================================

    /// Serialize an envelope, enforcing the size limit.
    fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>, EncodeError>;

    /// Parse wire bytes, enforcing the size limit and protocol version.
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, DecodeError>;

    // =========================================================================
    // Plain (unsigned, unencrypted) one-shot
    // =========================================================================

    /// Encode `message` into an unsigned plain envelope under `header`.
    ///
    /// `header.message_type` is overwritten with the message's type and
    /// `header.encrypted` is cleared. Sequence and timestamp are the
    /// caller's.
    fn encode(&self, header: EnvelopeHeader, message: &AgentMessage)
        -> Result<Vec<u8>, EncodeError>;

    /// Decode a plain envelope into its header and message.
    ///
    /// Performs no signature check. Sealed envelopes are `Malformed` here.
    fn decode(&self, bytes: &[u8]) -> Result<(EnvelopeHeader, AgentMessage), DecodeError>;
}
