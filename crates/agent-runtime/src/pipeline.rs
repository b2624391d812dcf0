//! # Envelope Pipeline
//!
//! Encrypt-then-sign on the way out, verify-then-decrypt on the way in.
//!
//! ```text
//! seal: message -> encode body -> [encrypt for recipient] -> sign -> bytes
//! open: bytes -> decode envelope -> verify -> [decrypt] -> decode body
//! ```
//!
//! The body is never interpreted before the signature checks out. The one
//! exception is key discovery: a `checkin` or `checkin_ack` from a sender
//! without provisioned keys is parsed only to read the keys it announces,
//! and nothing from it is returned unless its signature verifies under
//! those keys.
//!
//! Session checks are not part of the pipeline; see
//! [`AgentClient`](crate::AgentClient).

use crate::AgentError;
use agent_crypto::{CryptoError, CryptoProvider};
use agent_telemetry::{
    metric_inc, time_histogram, DECRYPT_FAILURES, ENVELOPES_SEALED, ENVELOPE_DURATION,
    SIGNATURE_FAILURES,
};
use agent_types::{
    AgentMessage, DecodeError, EncodeError, Envelope, EnvelopeHeader, MessageType,
    PublicKeyBundle, SealedBody,
};
use sdk_01_envelope_codec::{EnvelopeCodecApi, EnvelopeCodecService};
use tracing::{debug, warn};

/// A verified, decrypted and decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Opened {
    /// Header as signed by the sender.
    pub header: EnvelopeHeader,
    /// Typed body.
    pub message: AgentMessage,
    /// Keys the sender announced and was verified against, when it had no
    /// provisioned keys. Installing them is the caller's decision.
    pub announced_keys: Option<PublicKeyBundle>,
}

/// Stateless seal/open for one local identity.
#[derive(Debug, Clone)]
pub struct EnvelopePipeline {
    codec: EnvelopeCodecService,
    crypto: CryptoProvider,
    sign_outbound: bool,
    require_signatures: bool,
}

impl EnvelopePipeline {
    /// Pipeline that signs everything and requires signatures.
    pub fn new(codec: EnvelopeCodecService, crypto: CryptoProvider) -> Self {
        Self {
            codec,
            crypto,
            sign_outbound: true,
            require_signatures: true,
        }
    }

    /// Set whether outbound envelopes are signed.
    #[must_use]
    pub fn sign_outbound(mut self, sign: bool) -> Self {
        self.sign_outbound = sign;
        self
    }

    /// Set whether unsigned inbound envelopes are refused.
    #[must_use]
    pub fn require_signatures(mut self, require: bool) -> Self {
        self.require_signatures = require;
        self
    }

    /// Codec in use.
    pub fn codec(&self) -> &EnvelopeCodecService {
        &self.codec
    }

    /// Crypto provider in use.
    pub fn crypto(&self) -> &CryptoProvider {
        &self.crypto
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Turn `message` into wire bytes under `header`.
    ///
    /// `header.message_type` is filled from the message. When
    /// `header.encrypted` is set the body is sealed for
    /// `header.recipient_id`, whose keys must be in the key store.
    ///
    /// # Errors
    ///
    /// - `Encode` if the body or envelope does not serialize or is too large
    /// - `Crypto(NoKey)` if the recipient is unknown or our key is revoked
    pub fn seal(
        &self,
        mut header: EnvelopeHeader,
        message: &AgentMessage,
    ) -> Result<Vec<u8>, AgentError> {
        let _timer = time_histogram!(ENVELOPE_DURATION, &["seal"]);

        let encoded = self.codec.encode_body(message)?;
        header.message_type = encoded.message_type;

        let body = if header.encrypted {
            let sealed = self
                .crypto
                .encrypt_for(&header.recipient_id, encoded.body.as_bytes())?;
            serde_json::to_string(&sealed).map_err(|e| EncodeError::Serialization(e.to_string()))?
        } else {
            encoded.body
        };

        let mut envelope = Envelope::new(header, body);
        if self.sign_outbound {
            envelope.signature = Some(self.crypto.sign(&envelope.signing_bytes())?);
        }
        let bytes = self.codec.encode_envelope(&envelope)?;

        let header = &envelope.header;
        metric_inc!(ENVELOPES_SEALED, &[type_label(&header.message_type)]);
        debug!(
            recipient = %header.recipient_id,
            message_type = %header.message_type,
            sequence = header.sequence_number,
            encrypted = header.encrypted,
            size = bytes.len(),
            "envelope sealed"
        );
        Ok(bytes)
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Verify, decrypt and decode wire bytes.
    ///
    /// # Errors
    ///
    /// - `Decode` for oversize, malformed, wrong-version or unknown-type input
    /// - `Unsigned` / `UnknownSender` / `Crypto(InvalidSignature)` when the
    ///   signature cannot be trusted
    /// - `Crypto(DecryptFailed)` when a sealed body fails authentication
    pub fn open(&self, bytes: &[u8]) -> Result<Opened, AgentError> {
        let _timer = time_histogram!(ENVELOPE_DURATION, &["open"]);

        let envelope = self.codec.decode_envelope(bytes)?;
        let announced_keys = self.verify(&envelope)?;

        let Envelope { header, body, .. } = envelope;
        let body = if header.encrypted {
            self.unseal(&body)?
        } else {
            body
        };
        let message = self.codec.decode_body(&header.message_type, &body)?;

        debug!(
            sender = %header.sender_id,
            message_type = %header.message_type,
            sequence = header.sequence_number,
            "envelope opened"
        );
        Ok(Opened {
            header,
            message,
            announced_keys,
        })
    }

    fn verify(&self, envelope: &Envelope) -> Result<Option<PublicKeyBundle>, AgentError> {
        let sender = &envelope.header.sender_id;
        let Some(signature) = envelope.signature.as_ref() else {
            if self.require_signatures {
                metric_inc!(SIGNATURE_FAILURES);
                warn!(sender = %sender, "unsigned envelope refused");
                return Err(AgentError::Unsigned(sender.clone()));
            }
            return Ok(None);
        };

        let signed = envelope.signing_bytes();
        if self.crypto.peer_keys(sender).is_some() {
            self.crypto
                .verify_from(sender, &signed, signature)
                .inspect_err(|_| metric_inc!(SIGNATURE_FAILURES))?;
            return Ok(None);
        }

        let Some(announced) = self.announced_keys(envelope) else {
            metric_inc!(SIGNATURE_FAILURES);
            warn!(sender = %sender, "no verification key for sender");
            return Err(AgentError::UnknownSender(sender.clone()));
        };
        if !self.crypto.verify(&signed, signature, &announced.signing) {
            metric_inc!(SIGNATURE_FAILURES);
            warn!(sender = %sender, "signature does not match announced key");
            return Err(CryptoError::InvalidSignature.into());
        }
        Ok(Some(announced))
    }

    /// Keys carried in a plain checkin request or ack.
    fn announced_keys(&self, envelope: &Envelope) -> Option<PublicKeyBundle> {
        if envelope.header.encrypted {
            return None;
        }
        match MessageType::from_name(&envelope.header.message_type)? {
            MessageType::Checkin | MessageType::CheckinAck => {}
            _ => return None,
        }
        match self
            .codec
            .decode_body(&envelope.header.message_type, &envelope.body)
            .ok()?
        {
            AgentMessage::Checkin(request) => Some(request.public_keys),
            AgentMessage::CheckinAck(ack) => ack.orchestrator_keys,
            _ => None,
        }
    }

    fn unseal(&self, body: &str) -> Result<String, AgentError> {
        let sealed: SealedBody = serde_json::from_str(body)
            .map_err(|e| DecodeError::Malformed(format!("sealed body: {e}")))?;
        let plaintext = self
            .crypto
            .decrypt(&sealed)
            .inspect_err(|_| metric_inc!(DECRYPT_FAILURES))?;
        String::from_utf8(plaintext)
            .map_err(|_| DecodeError::Malformed("sealed body is not UTF-8".to_string()).into())
    }
}

/// Metric label for a wire type name; unknown names collapse to one label.
pub(crate) fn type_label(message_type: &str) -> &'static str {
    MessageType::from_name(message_type).map_or("unknown", |t| t.as_str())
}
