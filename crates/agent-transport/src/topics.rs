//! # Routes
//!
//! Exchange and routing-key naming for both broker protocols.
//!
//! | Purpose | AMQP key | MQTT topic | Exchange (AMQP) |
//! |---------|----------|------------|-----------------|
//! | checkin | `agent.{id}.checkin` | `agent/{id}/checkin` | anonymous |
//! | checkin response | `agent.{id}.checkinresponse` | `agent/{id}/checkinresponse` | anonymous |
//! | state | `agent.{id}.state` | `agent/{id}/state` | uplink |
//! | sensors | `agent.{id}.visualization` | `agent/{id}/visualization` | uplink |
//! | mission request | `agent.{id}.mission_req` | `agent/{id}/mission_req` | uplink |
//! | summary request | `agent.{id}.summary_req` | `agent/{id}/summary_req` | uplink |
//! | database request | `agent.{id}.database_req` | `agent/{id}/database_req` | uplink |
//! | update | `agent.{id}.update` | `agent/{id}/update` | uplink |
//! | assignment | `agent.{id}.assignment` | `agent/{id}/assignment` | downlink |
//! | instant actions | `agent.{id}.instantActions` | `agent/{id}/instantActions` | downlink |
//! | yard visualization | `yard.{yard}.visualization` | `yard/{yard}/visualization` | uplink |
//! | yard update | `yard.{yard}.update` | `yard/{yard}/update` | uplink |
//!
//! MQTT has a single exchange for everything.

use crate::TransportError;
use agent_types::{AgentId, MessageType, YardUid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broker protocol an agent is deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// Broker-exchange protocol, `.`-separated routing keys.
    #[default]
    Amqp,
    /// Lightweight pub/sub protocol, `/`-separated topics.
    Mqtt,
}

impl TransportProtocol {
    /// Routing key segment separator.
    #[must_use]
    pub fn separator(&self) -> char {
        match self {
            Self::Amqp => '.',
            Self::Mqtt => '/',
        }
    }

    /// Wildcard matching exactly one segment.
    #[must_use]
    pub fn single_wildcard(&self) -> &'static str {
        match self {
            Self::Amqp => "*",
            Self::Mqtt => "+",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amqp => write!(f, "amqp"),
            Self::Mqtt => write!(f, "mqtt"),
        }
    }
}

impl FromStr for TransportProtocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "amqp" | "rabbitmq" => Ok(Self::Amqp),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(TransportError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// Exchange names used by the broker deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchanges {
    /// Agent to orchestrator.
    pub uplink: String,
    /// Orchestrator to agent.
    pub downlink: String,
    /// Checkin traffic of agents without a broker account yet.
    pub anonymous: String,
    /// Single exchange of the MQTT deployment.
    pub mqtt: String,
}

impl Default for Exchanges {
    fn default() -> Self {
        Self {
            uplink: "xchange_helyos.agents.ul".to_string(),
            downlink: "xchange_helyos.agents.dl".to_string(),
            anonymous: "xchange_helyos.agents.anonymous".to_string(),
            mqtt: "xchange_helyos.agents.mqtt".to_string(),
        }
    }
}

/// Exchange plus routing key; the unit `Transport` publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Exchange name.
    pub exchange: String,
    /// Routing key (AMQP) or topic (MQTT). Subscriptions may use wildcards.
    pub key: String,
}

impl Route {
    /// Create a route.
    pub fn new(exchange: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.key)
    }
}

/// Route builder for one agent.
#[derive(Debug, Clone)]
pub struct Topics {
    protocol: TransportProtocol,
    agent_id: AgentId,
    yard_uid: Option<YardUid>,
    exchanges: Exchanges,
}

impl Topics {
    /// Routes for `agent_id` under `protocol`. Yard routes stay `None`
    /// until [`set_yard`](Self::set_yard) is called.
    pub fn new(protocol: TransportProtocol, agent_id: AgentId, exchanges: Exchanges) -> Self {
        Self {
            protocol,
            agent_id,
            yard_uid: None,
            exchanges,
        }
    }

    /// Record the yard the agent checked in to.
    pub fn set_yard(&mut self, yard_uid: impl Into<YardUid>) {
        self.yard_uid = Some(yard_uid.into());
    }

    /// Protocol the routes are named for.
    #[must_use]
    pub fn protocol(&self) -> TransportProtocol {
        self.protocol
    }

    /// Agent the routes belong to.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Yard, once known.
    #[must_use]
    pub fn yard_uid(&self) -> Option<&str> {
        self.yard_uid.as_deref()
    }

    fn key(&self, scope: &str, id: &str, leaf: &str) -> String {
        let sep = self.protocol.separator();
        format!("{scope}{sep}{id}{sep}{leaf}")
    }

    fn route(&self, exchange: &str, leaf: &str) -> Route {
        Route::new(self.exchange(exchange), self.key("agent", self.agent_id.as_str(), leaf))
    }

    fn yard_route(&self, leaf: &str) -> Option<Route> {
        self.yard_uid
            .as_deref()
            .map(|yard| Route::new(self.exchange(&self.exchanges.uplink), self.key("yard", yard, leaf)))
    }

    fn exchange(&self, amqp_exchange: &str) -> String {
        match self.protocol {
            TransportProtocol::Amqp => amqp_exchange.to_string(),
            TransportProtocol::Mqtt => self.exchanges.mqtt.clone(),
        }
    }

    /// Checkin and checkout requests.
    #[must_use]
    pub fn checkin(&self) -> Route {
        self.route(&self.exchanges.anonymous, "checkin")
    }

    /// Where the orchestrator answers checkin and checkout.
    #[must_use]
    pub fn checkin_response(&self) -> Route {
        self.route(&self.exchanges.anonymous, "checkinresponse")
    }

    /// Agent state reports.
    #[must_use]
    pub fn state(&self) -> Route {
        self.route(&self.exchanges.uplink, "state")
    }

    /// Sensor / pose reports.
    #[must_use]
    pub fn visualization(&self) -> Route {
        self.route(&self.exchanges.uplink, "visualization")
    }

    /// Mission requests.
    #[must_use]
    pub fn mission_request(&self) -> Route {
        self.route(&self.exchanges.uplink, "mission_req")
    }

    /// Summary requests.
    #[must_use]
    pub fn summary_request(&self) -> Route {
        self.route(&self.exchanges.uplink, "summary_req")
    }

    /// Database requests.
    #[must_use]
    pub fn database_request(&self) -> Route {
        self.route(&self.exchanges.uplink, "database_req")
    }

    /// Agent property updates.
    #[must_use]
    pub fn update(&self) -> Route {
        self.route(&self.exchanges.uplink, "update")
    }

    /// Assignments for this agent.
    #[must_use]
    pub fn assignment(&self) -> Route {
        self.route(&self.exchanges.downlink, "assignment")
    }

    /// Instant actions for this agent.
    #[must_use]
    pub fn instant_actions(&self) -> Route {
        self.route(&self.exchanges.downlink, "instantActions")
    }

    /// Yard visualization broadcast; `None` before the yard is known.
    #[must_use]
    pub fn yard_visualization(&self) -> Option<Route> {
        self.yard_route("visualization")
    }

    /// Yard updates; `None` before the yard is known.
    #[must_use]
    pub fn yard_update(&self) -> Option<Route> {
        self.yard_route("update")
    }

    /// Route for a `reply_to` key named by the orchestrator.
    #[must_use]
    pub fn reply(&self, key: &str) -> Route {
        Route::new(self.exchange(&self.exchanges.uplink), key)
    }

    /// Outbound route for a message type, `None` for types the agent only
    /// receives.
    #[must_use]
    pub fn outbound(&self, message_type: MessageType) -> Option<Route> {
        match message_type {
            MessageType::Checkin | MessageType::Checkout => Some(self.checkin()),
            MessageType::AgentState => Some(self.state()),
            MessageType::AgentSensor => Some(self.visualization()),
            MessageType::AgentUpdate => Some(self.update()),
            MessageType::MissionRequest => Some(self.mission_request()),
            MessageType::SummaryRequest => Some(self.summary_request()),
            MessageType::DatabaseRequest => Some(self.database_request()),
            MessageType::CheckinAck
            | MessageType::CheckoutAck
            | MessageType::Assignment
            | MessageType::InstantActions => None,
        }
    }

}

/// Match a routing key against a subscription pattern.
///
/// Single-segment wildcard is `*` (AMQP) or `+` (MQTT); `#` matches zero or
/// more trailing segments in both.
#[must_use]
pub fn key_matches(protocol: TransportProtocol, pattern: &str, key: &str) -> bool {
    let sep = protocol.separator();
    let single = protocol.single_wildcard();
    let mut pattern_parts = pattern.split(sep);
    let mut key_parts = key.split(sep);

    loop {
        match (pattern_parts.next(), key_parts.next()) {
            (Some("#"), _) => return true,
            (Some(p), Some(k)) if p == single || p == k => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
