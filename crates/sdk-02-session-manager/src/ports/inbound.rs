//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this subsystem.

use crate::domain::entities::{
    AcceptedMessage, CheckinTicket, DisconnectReason, SessionState,
};
use crate::domain::errors::{RejectError, SessionError};
use agent_types::{AgentId, EnvelopeHeader};
use uuid::Uuid;

/// Primary Session Manager API.
///
/// One instance per agent. All methods serialize on a single lock, so
/// inbound delivery and outbound production may call concurrently.
pub trait SessionManagerApi: Send + Sync {
    /// The agent this session belongs to.
    fn agent_id(&self) -> &AgentId;

    /// Current state.
    fn state(&self) -> SessionState;

    /// Token of the active session, if any.
    fn session_token(&self) -> Option<String>;

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// DISCONNECTED -> CHECKING_IN. Starts a fresh session record.
    fn begin_checkin(&self) -> Result<CheckinTicket, SessionError>;

    /// CHECKING_IN -> ACTIVE, for the ack echoing `checkin_id`.
    ///
    /// Call only after the ack's signature was verified.
    ///
    /// # Errors
    ///
    /// `RejectError::WrongSession` when nothing is pending or the id belongs
    /// to another attempt (a stale ack).
    fn complete_checkin(
        &self,
        checkin_id: Uuid,
        session_token: Option<String>,
    ) -> Result<(), RejectError>;

    /// CHECKING_IN -> DISCONNECTED if `checkin_id` is still pending.
    ///
    /// Returns `true` if the attempt was cancelled.
    fn cancel_checkin(&self, checkin_id: Uuid) -> bool;

    /// ACTIVE -> CHECKING_OUT.
    fn begin_checkout(&self) -> Result<(), SessionError>;

    /// CHECKING_OUT -> DISCONNECTED.
    fn complete_checkout(&self) -> Result<(), SessionError>;

    /// Any state -> DISCONNECTED.
    fn force_disconnect(&self, reason: DisconnectReason);

    // =========================================================================
    // Sequencing
    // =========================================================================

    /// Next outbound sequence number. Strictly increasing.
    fn next_sequence(&self) -> u64;

    /// Check an inbound header and record its sequence number.
    ///
    /// # Errors
    ///
    /// - `RejectError::Misrouted` if addressed to another agent
    /// - `RejectError::NotActive` for non-control types outside ACTIVE
    /// - `RejectError::WrongSession` for an ack outside its handshake, or a
    ///   session token mismatch while ACTIVE or CHECKING_OUT
    /// - `RejectError::Replay` if the sequence number is not new
    fn accept(&self, header: &EnvelopeHeader) -> Result<AcceptedMessage, RejectError>;
}
