//! # Session Errors

use crate::domain::entities::SessionState;
use agent_types::AgentId;
use thiserror::Error;

/// Reasons an inbound envelope is refused by the session.
///
/// The envelope MUST be discarded; none of its content is trusted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RejectError {
    /// Sequence number not above the last one accepted from this sender.
    #[error("Replay from {sender}: sequence {sequence} <= last seen {last_seen}")]
    Replay {
        /// Sender of the envelope.
        sender: AgentId,
        /// Sequence number received.
        sequence: u64,
        /// Highest sequence number accepted so far.
        last_seen: u64,
    },

    /// Session token does not match the active session, or an ack does not
    /// belong to the pending handshake.
    #[error("Envelope does not belong to the current session")]
    WrongSession,

    /// A non-control message arrived outside `Active`.
    #[error("Session not active (state: {state})")]
    NotActive {
        /// State at the time of the check.
        state: SessionState,
    },

    /// The envelope is addressed to somebody else.
    #[error("Envelope addressed to {recipient}")]
    Misrouted {
        /// Recipient named in the header.
        recipient: AgentId,
    },
}

/// Illegal lifecycle operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The requested operation is not allowed from the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        /// Operation attempted.
        operation: &'static str,
        /// State at the time.
        state: SessionState,
    },
}
