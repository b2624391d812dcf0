//! # Agent Errors
//!
//! One error type for everything an [`AgentClient`](crate::AgentClient)
//! call can fail with. Subsystem errors are wrapped unchanged.

use crate::config::ConfigError;
use agent_crypto::CryptoError;
use agent_transport::TransportError;
use agent_types::{AgentId, DecodeError, EncodeError};
use sdk_02_session_manager::{RejectError, SessionError};
use std::time::Duration;
use thiserror::Error;

/// Errors of the agent runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    /// Inbound bytes did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An outbound message could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Signing, verification or decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The session refused an inbound envelope.
    #[error(transparent)]
    Rejected(#[from] RejectError),

    /// Lifecycle operation not allowed in the current state.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transport backend failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport call did not finish in time.
    #[error("{operation} timed out after {timeout:?}")]
    TransportTimeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Timeout that was exceeded.
        timeout: Duration,
    },

    /// The orchestrator answered the checkin with a non-success code, or
    /// the checkin guard vetoed the ack.
    #[error("Checkin refused ({code}): {message}")]
    CheckinRefused {
        /// Response code of the ack.
        code: String,
        /// Reason given.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An envelope without signature arrived while signatures are required.
    #[error("Unsigned envelope from {0}")]
    Unsigned(AgentId),

    /// No public key is known for the sender and it announced none.
    #[error("No verification key for sender {0}")]
    UnknownSender(AgentId),

    /// The message type has no outbound route.
    #[error("No outbound route for message type '{0}'")]
    NoRoute(String),

    /// A reply was requested for a delivery that named no `reply_to`.
    #[error("Delivery from {0} carries no reply route")]
    NoReplyRoute(AgentId),
}

impl AgentError {
    /// Returns true if the envelope failed authentication. The session is
    /// torn down on these.
    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::InvalidSignature) | Self::Unsigned(_) | Self::UnknownSender(_)
        )
    }

    /// Short label used as the rejection reason in metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode(DecodeError::Malformed(_)) => "malformed",
            Self::Decode(DecodeError::UnknownType(_)) => "unknown_type",
            Self::Decode(DecodeError::TooLarge { .. }) => "too_large",
            Self::Decode(DecodeError::UnsupportedVersion { .. }) => "unsupported_version",
            Self::Crypto(CryptoError::InvalidSignature) => "invalid_signature",
            Self::Crypto(CryptoError::DecryptFailed) => "decrypt_failed",
            Self::Crypto(CryptoError::NoKey(_)) => "no_key",
            Self::Crypto(_) => "crypto",
            Self::Rejected(RejectError::Replay { .. }) => "replay",
            Self::Rejected(RejectError::WrongSession) => "wrong_session",
            Self::Rejected(RejectError::NotActive { .. }) => "not_active",
            Self::Rejected(RejectError::Misrouted { .. }) => "misrouted",
            Self::Unsigned(_) => "unsigned",
            Self::UnknownSender(_) => "unknown_sender",
            Self::Encode(_) => "encode",
            Self::Session(_) => "session",
            Self::Transport(_) => "transport",
            Self::Config(_) => "config",
            Self::TransportTimeout { .. } => "timeout",
            Self::CheckinRefused { .. } => "checkin_refused",
            Self::Cancelled => "cancelled",
            Self::NoRoute(_) => "no_route",
            Self::NoReplyRoute(_) => "no_reply_route",
        }
    }
}
