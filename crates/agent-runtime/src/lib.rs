//! # Agent Runtime
//!
//! The client an agent process embeds to talk to the fleet orchestrator.
//!
//! ## Layout
//!
//! - [`EnvelopePipeline`]: sign/encrypt outbound, verify/decrypt inbound
//! - [`AgentClient`]: checkin, checkout, send and receive over a
//!   [`Transport`](agent_transport::Transport)
//! - [`AgentConfig`]: environment-driven settings
//! - [`MetricsObserver`]: feeds session transitions to telemetry
//!
//! ## Example
//!
//! ```ignore
//! let broker = Arc::new(InMemoryBroker::new(TransportProtocol::Amqp));
//! let client = AgentClient::new(AgentConfig::from_env()?, broker, key_store)?;
//! client.checkin(AgentStatus::Free, Map::new()).await?;
//! client.send(&AgentMessage::AgentState(report)).await?;
//! ```

#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod observer;
mod pipeline;

pub use client::{AgentClient, CheckinGuard, Delivery, Inbox};
pub use config::{AgentConfig, ConfigError, DEFAULT_REGISTRATION_TOKEN};
pub use error::AgentError;
pub use observer::MetricsObserver;
pub use pipeline::{EnvelopePipeline, Opened};
