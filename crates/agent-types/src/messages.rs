//! # Message Variants
//!
//! The closed, versioned set of payloads exchanged between an agent and the
//! orchestrator.
//!
//! ## Design Rules
//!
//! - Payloads are carried in an `Envelope` whose header names the type.
//! - Payloads MUST NOT duplicate the sender identity (envelope authority).
//! - Unrecognized types survive as `AgentMessage::Unknown` so that the codec
//!   can pass them through or reject them by policy, never corrupt them.

use crate::entities::{AgentStatus, PublicKeyBundle, YardUid};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Response code the orchestrator uses for an accepted checkin or checkout.
pub const RESPONSE_CODE_OK: &str = "200";

// =============================================================================
// MESSAGE TYPE REGISTRY
// =============================================================================

/// Stable identifiers of the recognized message types.
///
/// Both the string name and the integer code are part of the wire contract
/// shared with the orchestrator schema and MUST NOT be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Checkin,
    CheckinAck,
    Checkout,
    CheckoutAck,
    AgentState,
    AgentSensor,
    AgentUpdate,
    Assignment,
    InstantActions,
    MissionRequest,
    SummaryRequest,
    DatabaseRequest,
}

impl MessageType {
    /// Every recognized type, in code order.
    pub const ALL: [MessageType; 12] = [
        MessageType::Checkin,
        MessageType::CheckinAck,
        MessageType::Checkout,
        MessageType::CheckoutAck,
        MessageType::AgentState,
        MessageType::AgentSensor,
        MessageType::AgentUpdate,
        MessageType::Assignment,
        MessageType::InstantActions,
        MessageType::MissionRequest,
        MessageType::SummaryRequest,
        MessageType::DatabaseRequest,
    ];

    /// Wire name carried in the envelope header.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Checkin => "checkin",
            MessageType::CheckinAck => "checkin_ack",
            MessageType::Checkout => "checkout",
            MessageType::CheckoutAck => "checkout_ack",
            MessageType::AgentState => "agent_state",
            MessageType::AgentSensor => "agent_sensor",
            MessageType::AgentUpdate => "agent_update",
            MessageType::Assignment => "assignment",
            MessageType::InstantActions => "instant_actions",
            MessageType::MissionRequest => "mission_request",
            MessageType::SummaryRequest => "summary_request",
            MessageType::DatabaseRequest => "database_request",
        }
    }

    /// Integer code shared with the orchestrator schema.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            MessageType::Checkin => 1,
            MessageType::CheckinAck => 2,
            MessageType::Checkout => 3,
            MessageType::CheckoutAck => 4,
            MessageType::AgentState => 10,
            MessageType::AgentSensor => 11,
            MessageType::AgentUpdate => 12,
            MessageType::Assignment => 20,
            MessageType::InstantActions => 21,
            MessageType::MissionRequest => 30,
            MessageType::SummaryRequest => 31,
            MessageType::DatabaseRequest => 32,
        }
    }

    /// Look up a type by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Look up a type by integer code.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Checkin/checkout handshake messages, accepted outside an active session.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            MessageType::Checkin
                | MessageType::CheckinAck
                | MessageType::Checkout
                | MessageType::CheckoutAck
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// HANDSHAKE PAYLOADS
// =============================================================================

/// Request to open a session for a yard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRequest {
    /// Yard the agent registers to.
    pub yard_uid: YardUid,
    /// Status at checkin time.
    pub status: AgentStatus,
    /// Public keys the orchestrator uses to verify and encrypt for us.
    pub public_keys: PublicKeyBundle,
    /// Encoding marker for `public_keys`.
    pub public_key_format: String,
    /// Token allowing the orchestrator to provision a broker account.
    pub registration_token: String,
    /// Correlates the acknowledgement with this attempt.
    pub checkin_id: Uuid,
    /// Free-form agent description merged into the registration.
    #[serde(default)]
    pub agent_data: Map<String, Value>,
}

/// Broker account credentials provisioned during checkin.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BrokerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerAccount")
            .field("username", &self.username)
            .field("password", &"*".repeat(self.password.len()))
            .finish()
    }
}

/// Orchestrator reply to a checkin request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinAck {
    /// `"200"` when accepted; anything else is a refusal.
    pub response_code: String,
    /// Human readable reason, mostly for refusals.
    #[serde(default)]
    pub message: Option<String>,
    /// Echo of `CheckinRequest::checkin_id`.
    pub checkin_id: Uuid,
    /// Token every subsequent envelope of the session must carry.
    #[serde(default)]
    pub session_token: Option<String>,
    /// Orchestrator keys, for agents provisioned without them.
    #[serde(default)]
    pub orchestrator_keys: Option<PublicKeyBundle>,
    /// Broker account created from the registration token.
    #[serde(default)]
    pub account: Option<BrokerAccount>,
    /// Yard description (map, obstacles, ...) as provided by the orchestrator.
    #[serde(default)]
    pub yard: Option<Value>,
}

impl CheckinAck {
    /// Returns true if the orchestrator accepted the checkin.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.response_code == RESPONSE_CODE_OK
    }
}

/// Request to close the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Orchestrator reply to a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutAck {
    pub response_code: String,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// UPLINK PAYLOADS (agent -> orchestrator)
// =============================================================================

/// Progress of the assignment an agent is executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentProgress {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Agent and assignment status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateReport {
    pub status: AgentStatus,
    #[serde(default)]
    pub assignment: Option<AssignmentProgress>,
}

/// Position and orientation in yard coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub orientations: Vec<f64>,
}

/// Position and sensor broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    pub pose: Pose,
    #[serde(default)]
    pub sensors: Map<String, Value>,
}

/// Change of the agent's registered properties (name, geometry, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Request for the orchestrator to start a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionRequest {
    pub work_process_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Query sent as a summary or database request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuery {
    pub query: String,
    #[serde(default)]
    pub conditions: Value,
}

// =============================================================================
// DOWNLINK PAYLOADS (orchestrator -> agent)
// =============================================================================

/// Work the agent must execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    #[serde(default)]
    pub work_process_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Commands that reserve, release or cancel an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantCommand {
    ReserveForMission,
    ReleaseFromMission,
    AssignmentCancel,
}

/// An instant action sent outside the assignment flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantAction {
    pub command: InstantCommand,
    #[serde(default)]
    pub work_process_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

// =============================================================================
// TAGGED UNION
// =============================================================================

/// A typed domain message.
///
/// `Unknown` keeps the raw type name and JSON body of a type this build does
/// not recognize.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    Checkin(CheckinRequest),
    CheckinAck(CheckinAck),
    Checkout(CheckoutRequest),
    CheckoutAck(CheckoutAck),
    AgentState(AgentStateReport),
    AgentSensor(SensorReport),
    AgentUpdate(AgentUpdate),
    Assignment(Assignment),
    InstantActions(InstantAction),
    MissionRequest(MissionRequest),
    SummaryRequest(DataQuery),
    DatabaseRequest(DataQuery),
    Unknown { message_type: String, body: Value },
}

impl AgentMessage {
    /// Recognized type of this message, `None` for `Unknown`.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        let ty = match self {
            AgentMessage::Checkin(_) => MessageType::Checkin,
            AgentMessage::CheckinAck(_) => MessageType::CheckinAck,
            AgentMessage::Checkout(_) => MessageType::Checkout,
            AgentMessage::CheckoutAck(_) => MessageType::CheckoutAck,
            AgentMessage::AgentState(_) => MessageType::AgentState,
            AgentMessage::AgentSensor(_) => MessageType::AgentSensor,
            AgentMessage::AgentUpdate(_) => MessageType::AgentUpdate,
            AgentMessage::Assignment(_) => MessageType::Assignment,
            AgentMessage::InstantActions(_) => MessageType::InstantActions,
            AgentMessage::MissionRequest(_) => MessageType::MissionRequest,
            AgentMessage::SummaryRequest(_) => MessageType::SummaryRequest,
            AgentMessage::DatabaseRequest(_) => MessageType::DatabaseRequest,
            AgentMessage::Unknown { .. } => return None,
        };
        Some(ty)
    }

    /// Wire name of this message's type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            AgentMessage::Unknown { message_type, .. } => message_type,
            known => known.message_type().map_or("", |t| t.as_str()),
        }
    }

    /// Returns true for checkin/checkout handshake messages.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.message_type().is_some_and(|t| t.is_control())
    }
}
