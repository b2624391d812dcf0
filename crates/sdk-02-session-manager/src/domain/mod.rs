//! # Domain Layer
//!
//! Session state, transitions and the acceptance rules for inbound
//! envelopes. No I/O.

pub mod entities;
pub mod errors;
