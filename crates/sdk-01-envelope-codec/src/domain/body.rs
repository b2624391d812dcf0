//! # Body Codec
//!
//! `AgentMessage` <-> (`message_type`, JSON body text).
//!
//! Encoding is total over every variant, `Unknown` included, and
//! deterministic: struct fields serialize in declaration order and maps in
//! key order.

use crate::domain::entities::{EncodedBody, UnknownTypePolicy};
use agent_types::{AgentMessage, DecodeError, EncodeError, MessageType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encode a message into its wire type name and body text.
pub fn encode_body(message: &AgentMessage) -> Result<EncodedBody, EncodeError> {
    let body = match message {
        AgentMessage::Checkin(p) => to_json(p)?,
        AgentMessage::CheckinAck(p) => to_json(p)?,
        AgentMessage::Checkout(p) => to_json(p)?,
        AgentMessage::CheckoutAck(p) => to_json(p)?,
        AgentMessage::AgentState(p) => to_json(p)?,
        AgentMessage::AgentSensor(p) => to_json(p)?,
        AgentMessage::AgentUpdate(p) => to_json(p)?,
        AgentMessage::Assignment(p) => to_json(p)?,
        AgentMessage::InstantActions(p) => to_json(p)?,
        AgentMessage::MissionRequest(p) => to_json(p)?,
        AgentMessage::SummaryRequest(p) | AgentMessage::DatabaseRequest(p) => to_json(p)?,
        AgentMessage::Unknown { body, .. } => to_json(body)?,
    };

    Ok(EncodedBody {
        message_type: message.type_name().to_string(),
        body,
    })
}

/// Decode body text of the given wire type.
///
/// # Errors
///
/// - `DecodeError::UnknownType` for an unrecognized type under
///   `UnknownTypePolicy::Reject`
/// - `DecodeError::Malformed` when the body is not valid JSON or misses
///   required fields of the named type
pub fn decode_body(
    message_type: &str,
    body: &str,
    policy: UnknownTypePolicy,
) -> Result<AgentMessage, DecodeError> {
    let Some(known) = MessageType::from_name(message_type) else {
        return match policy {
            UnknownTypePolicy::Reject => Err(DecodeError::UnknownType(message_type.to_string())),
            UnknownTypePolicy::PassThrough => Ok(AgentMessage::Unknown {
                message_type: message_type.to_string(),
                body: from_json::<Value>(message_type, body)?,
            }),
        };
    };

    let message = match known {
        MessageType::Checkin => AgentMessage::Checkin(from_json(message_type, body)?),
        MessageType::CheckinAck => AgentMessage::CheckinAck(from_json(message_type, body)?),
        MessageType::Checkout => AgentMessage::Checkout(from_json(message_type, body)?),
        MessageType::CheckoutAck => AgentMessage::CheckoutAck(from_json(message_type, body)?),
        MessageType::AgentState => AgentMessage::AgentState(from_json(message_type, body)?),
        MessageType::AgentSensor => AgentMessage::AgentSensor(from_json(message_type, body)?),
        MessageType::AgentUpdate => AgentMessage::AgentUpdate(from_json(message_type, body)?),
        MessageType::Assignment => AgentMessage::Assignment(from_json(message_type, body)?),
        MessageType::InstantActions => {
            AgentMessage::InstantActions(from_json(message_type, body)?)
        }
        MessageType::MissionRequest => {
            AgentMessage::MissionRequest(from_json(message_type, body)?)
        }
        MessageType::SummaryRequest => {
            AgentMessage::SummaryRequest(from_json(message_type, body)?)
        }
        MessageType::DatabaseRequest => {
            AgentMessage::DatabaseRequest(from_json(message_type, body)?)
        }
    };
    Ok(message)
}

fn to_json<T: Serialize>(payload: &T) -> Result<String, EncodeError> {
    serde_json::to_string(payload).map_err(|e| EncodeError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(message_type: &str, body: &str) -> Result<T, DecodeError> {
    serde_json::from_str(body)
        .map_err(|e| DecodeError::Malformed(format!("{message_type} body: {e}")))
}
