//! # Agent Transport - Broker Adapter Boundary
//!
//! The agent core talks to the broker only through the [`Transport`] trait:
//! `publish(route, bytes)` out, [`Subscription`]s in.
//!
//! ```text
//! ┌──────────────┐   publish()    ┌──────────────┐
//! │ AgentClient  │ ─────────────▶ │  Transport   │ ──▶ broker
//! │              │ ◀───────────── │  (backend)   │ ◀── broker
//! └──────────────┘  Subscription  └──────────────┘
//! ```
//!
//! Two naming schemes are supported (see [`topics`]): the broker-exchange
//! protocol (AMQP) and the lightweight pub/sub protocol (MQTT). An agent uses
//! exactly one of them, chosen by configuration.
//!
//! [`InMemoryBroker`] is the in-process backend used by tests and embedded
//! deployments.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod errors;
pub mod memory;
pub mod topics;
pub mod transport;

// Re-export main types
pub use errors::TransportError;
pub use memory::InMemoryBroker;
pub use topics::{key_matches, Exchanges, Route, Topics, TransportProtocol};
pub use transport::{InboundFrame, Subscription, Transport};

/// Maximum frames to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
