//! Cross-crate scenarios over the in-memory broker.

pub mod e2e_choreography;
pub mod flows;
pub mod harness;
