//! # Domain Layer
//!
//! Pure transforms between typed messages, body text and wire bytes.
//! No I/O, no clocks, no keys.

pub mod body;
pub mod entities;
pub mod frame;
