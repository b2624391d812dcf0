//! # Agent Configuration
//!
//! Runtime parameters of one agent, read from the environment.
//!
//! ## Security Requirements
//!
//! - Inbound envelopes MUST be signed unless `FLEET_REQUIRE_SIGNATURES=false`
//! - All timeouts and limits have sane defaults with override capability

use agent_transport::{Exchanges, TransportProtocol};
use agent_types::{AgentId, YardUid, DEFAULT_MAX_ENVELOPE_BYTES};
use sdk_01_envelope_codec::{CodecConfig, UnknownTypePolicy};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Registration token sent when none is configured.
pub const DEFAULT_REGISTRATION_TOKEN: &str = "0000-0000-0000-0000-0000";

/// Characters with a meaning in routing keys; they cannot appear in an id.
const RESERVED_ID_CHARS: [char; 5] = ['.', '/', '*', '+', '#'];

/// Complete agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Identity of this agent.
    pub agent_id: AgentId,
    /// Yard to check in to.
    pub yard_uid: Option<YardUid>,
    /// Broker protocol; decides the routing key scheme.
    pub protocol: TransportProtocol,
    /// Exchange names on the broker.
    pub exchanges: Exchanges,
    /// Token presented at checkin.
    pub registration_token: String,
    /// Upper bound for one publish call.
    pub publish_timeout: Duration,
    /// Upper bound for a checkin or checkout handshake.
    pub checkin_timeout: Duration,
    /// Largest envelope produced or accepted.
    pub max_payload_bytes: usize,
    /// Handling of unrecognized inbound message types.
    pub unknown_types: UnknownTypePolicy,
    /// Sign every outbound envelope.
    pub sign_outbound: bool,
    /// Refuse inbound envelopes without a signature.
    pub require_signatures: bool,
    /// Encrypt outbound bodies by default.
    pub encrypt_outbound: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: AgentId::generate(),
            yard_uid: None,
            protocol: TransportProtocol::Amqp,
            exchanges: Exchanges::default(),
            registration_token: DEFAULT_REGISTRATION_TOKEN.to_string(),
            publish_timeout: Duration::from_millis(5_000),
            checkin_timeout: Duration::from_millis(10_000),
            max_payload_bytes: DEFAULT_MAX_ENVELOPE_BYTES,
            unknown_types: UnknownTypePolicy::Reject,
            sign_outbound: true,
            require_signatures: true,
            encrypt_outbound: false,
        }
    }
}

impl AgentConfig {
    /// Configuration for a given agent id, everything else default.
    pub fn for_agent(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FLEET_AGENT_ID`: Agent id (default: random UUID)
    /// - `FLEET_YARD_UID`: Yard to check in to
    /// - `FLEET_TRANSPORT`: `amqp` or `mqtt` (default: amqp)
    /// - `AGENTS_UL_EXCHANGE`, `AGENTS_DL_EXCHANGE`,
    ///   `AGENT_ANONYMOUS_EXCHANGE`, `AGENTS_MQTT_EXCHANGE`: exchange names
    /// - `REGISTRATION_TOKEN`: Checkin token
    /// - `FLEET_PUBLISH_TIMEOUT_MS` (default: 5000)
    /// - `FLEET_CHECKIN_TIMEOUT_MS` (default: 10000)
    /// - `FLEET_MAX_PAYLOAD_BYTES` (default: 1 MiB)
    /// - `FLEET_UNKNOWN_TYPES`: `reject` or `pass_through`
    /// - `FLEET_SIGN_OUTBOUND`, `FLEET_REQUIRE_SIGNATURES` (default: true)
    /// - `FLEET_ENCRYPT_OUTBOUND` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let default_exchanges = Exchanges::default();

        let config = Self {
            agent_id: lookup("FLEET_AGENT_ID")
                .map(AgentId::new)
                .unwrap_or(defaults.agent_id),
            yard_uid: lookup("FLEET_YARD_UID").filter(|yard| !yard.is_empty()),
            protocol: parse_var(&lookup, "FLEET_TRANSPORT")?.unwrap_or(defaults.protocol),
            exchanges: Exchanges {
                uplink: lookup("AGENTS_UL_EXCHANGE").unwrap_or(default_exchanges.uplink),
                downlink: lookup("AGENTS_DL_EXCHANGE").unwrap_or(default_exchanges.downlink),
                anonymous: lookup("AGENT_ANONYMOUS_EXCHANGE")
                    .unwrap_or(default_exchanges.anonymous),
                mqtt: lookup("AGENTS_MQTT_EXCHANGE").unwrap_or(default_exchanges.mqtt),
            },
            registration_token: lookup("REGISTRATION_TOKEN")
                .unwrap_or(defaults.registration_token),
            publish_timeout: parse_var(&lookup, "FLEET_PUBLISH_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.publish_timeout),
            checkin_timeout: parse_var(&lookup, "FLEET_CHECKIN_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.checkin_timeout),
            max_payload_bytes: parse_var(&lookup, "FLEET_MAX_PAYLOAD_BYTES")?
                .unwrap_or(defaults.max_payload_bytes),
            unknown_types: parse_var(&lookup, "FLEET_UNKNOWN_TYPES")?
                .unwrap_or(defaults.unknown_types),
            sign_outbound: parse_flag(&lookup, "FLEET_SIGN_OUTBOUND")?
                .unwrap_or(defaults.sign_outbound),
            require_signatures: parse_flag(&lookup, "FLEET_REQUIRE_SIGNATURES")?
                .unwrap_or(defaults.require_signatures),
            encrypt_outbound: parse_flag(&lookup, "FLEET_ENCRYPT_OUTBOUND")?
                .unwrap_or(defaults.encrypt_outbound),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check limits and the agent id.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - a timeout is zero
    /// - the payload limit is zero
    /// - the agent id is empty or contains a routing key metacharacter
    pub fn validate(&self) -> Result<(), ConfigError> {
        let id = self.agent_id.as_str();
        if id.is_empty() || id.contains(RESERVED_ID_CHARS) {
            return Err(ConfigError::InvalidAgentId(id.to_string()));
        }
        if self.publish_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("publish"));
        }
        if self.checkin_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("checkin"));
        }
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::ZeroPayloadLimit);
        }
        Ok(())
    }

    /// Codec settings derived from this configuration.
    #[must_use]
    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            max_envelope_bytes: self.max_payload_bytes,
            unknown_types: self.unknown_types,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set to something that does not parse.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A timeout of zero would fail every call.
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),

    /// A payload limit of zero would reject every envelope.
    #[error("Maximum payload size must be greater than zero")]
    ZeroPayloadLimit,

    /// The agent id cannot be used in routing keys.
    #[error("Invalid agent id: '{0}'")]
    InvalidAgentId(String),

    /// The transport backend speaks another protocol than configured.
    #[error("Configured for {configured} but the transport speaks {backend}")]
    ProtocolMismatch {
        /// Protocol in the configuration.
        configured: TransportProtocol,
        /// Protocol of the backend.
        backend: TransportProtocol,
    },

    /// A setting needed by the requested operation is absent.
    #[error("Missing configuration: {0}")]
    Missing(&'static str),
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var, value })
        })
        .transpose()
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<bool>, ConfigError> {
    lookup(var)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value }),
        })
        .transpose()
}
