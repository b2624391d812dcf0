//! # Envelope Codec Service
//!
//! Application service layer that implements the `EnvelopeCodecApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`EnvelopeCodecApi`)
//! - Delegates every transform to the domain layer

use crate::domain::body;
use crate::domain::entities::{CodecConfig, EncodedBody, UnknownTypePolicy};
use crate::domain::frame;
use crate::ports::inbound::EnvelopeCodecApi;
use agent_types::{AgentMessage, DecodeError, EncodeError, Envelope, EnvelopeHeader};
use tracing::debug;

/// Envelope Codec Service.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodecService {
    config: CodecConfig,
}

impl EnvelopeCodecService {
    /// Create a codec with the given configuration.
    #[must_use]
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Shorthand for a codec with a custom size limit and policy.
    #[must_use]
    pub fn with_limits(max_envelope_bytes: usize, unknown_types: UnknownTypePolicy) -> Self {
        Self::new(CodecConfig {
            max_envelope_bytes,
            unknown_types,
        })
    }
}

impl EnvelopeCodecApi for EnvelopeCodecService {
    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn encode_body(&self, message: &AgentMessage) -> Result<EncodedBody, EncodeError> {
        body::encode_body(message)
    }

    fn decode_body(&self, message_type: &str, body: &str) -> Result<AgentMessage, DecodeError> {
        let result = body::decode_body(message_type, body, self.config.unknown_types);
        if let Ok(AgentMessage::Unknown { message_type, .. }) = &result {
            debug!(message_type = %message_type, "passing through unknown message type");
        }
        result
    }

    fn encode_envelope(&self, envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
        frame::encode_envelope(envelope, self.config.max_envelope_bytes)
    }

    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope, DecodeError> {
        frame::decode_envelope(bytes, self.config.max_envelope_bytes)
    }

    fn encode(
        &self,
        mut header: EnvelopeHeader,
        message: &AgentMessage,
    ) -> Result<Vec<u8>, EncodeError> {
        let encoded = self.encode_body(message)?;
        header.message_type = encoded.message_type;
        header.encrypted = false;
        self.encode_envelope(&Envelope::new(header, encoded.body))
    }

    fn decode(&self, bytes: &[u8]) -> Result<(EnvelopeHeader, AgentMessage), DecodeError> {
        let envelope = self.decode_envelope(bytes)?;
        if envelope.header.encrypted {
            return Err(DecodeError::Malformed(
                "sealed body cannot be decoded without decryption".to_string(),
            ));
        }
        let message = self.decode_body(&envelope.header.message_type, &envelope.body)?;
        Ok((envelope.header, message))
    }
}
