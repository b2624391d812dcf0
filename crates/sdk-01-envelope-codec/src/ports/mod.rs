//! # Ports Layer
//!
//! - **Inbound (Driving)**: API that the agent pipeline calls
//!
//! The codec is a pure transform and drives nothing, so there is no
//! outbound port.

pub mod inbound;
