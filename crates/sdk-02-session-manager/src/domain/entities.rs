//! # Session Entities

use agent_types::{AgentId, MessageType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of an agent session.
///
/// ```text
/// DISCONNECTED ──begin_checkin──▶ CHECKING_IN ──complete_checkin──▶ ACTIVE
///      ▲                              │                               │
///      │◀──────cancel / timeout───────┘                        begin_checkout
///      │                                                              ▼
///      └────────────────complete_checkout─────────────────────── CHECKING_OUT
///
/// Any state ──force_disconnect──▶ DISCONNECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    #[default]
    Disconnected,
    CheckingIn,
    Active,
    CheckingOut,
}

impl SessionState {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::CheckingIn => "checking_in",
            SessionState::Active => "active",
            SessionState::CheckingOut => "checking_out",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session was torn down without a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// An inbound envelope failed signature verification or decryption.
    VerificationFailed,
    /// The transport reported the connection lost.
    TransportLost,
    /// The handshake was cancelled or timed out.
    Cancelled,
    /// Requested by the application.
    Requested,
}

impl DisconnectReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::VerificationFailed => "verification_failed",
            DisconnectReason::TransportLost => "transport_lost",
            DisconnectReason::Cancelled => "cancelled",
            DisconnectReason::Requested => "requested",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle of an in-flight checkin. Its id is echoed by the matching ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckinTicket {
    pub checkin_id: Uuid,
}

/// An inbound envelope that passed the session checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMessage {
    pub sender_id: AgentId,
    pub message_type: String,
    pub sequence_number: u64,
    pub correlation_id: Uuid,
}

impl AcceptedMessage {
    /// Recognized type, `None` for pass-through types.
    #[must_use]
    pub fn known_type(&self) -> Option<MessageType> {
        MessageType::from_name(&self.message_type)
    }
}

/// Mutable session record. Owned by the session manager only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub session_token: Option<String>,
    pub pending_checkin: Option<Uuid>,
    /// Highest sequence number accepted per sender in this session.
    pub last_sequence_seen: HashMap<AgentId, u64>,
    /// Last outbound sequence number issued.
    pub last_sequence_sent: u64,
}

impl Session {
    /// Forget everything tied to the current session. The outbound counter
    /// keeps running so numbers never repeat within the process.
    pub fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.session_token = None;
        self.pending_checkin = None;
        self.last_sequence_seen.clear();
    }
}
