//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API the agent pipeline calls
//! - **Outbound (Driven)**: Where state transitions are reported

pub mod inbound;
pub mod outbound;
