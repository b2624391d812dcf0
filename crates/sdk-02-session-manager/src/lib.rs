//! # Session Manager Subsystem (SDK-02)
//!
//! Tracks the checkin/checkout lifecycle of one agent and decides which
//! inbound envelopes belong to the live session.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Session record, states and errors
//! - **Ports Layer** (`ports/`): Inbound API and the transition observer
//! - **Service Layer** (`service.rs`): Lock-protected implementation
//!
//! ## Acceptance Rules
//!
//! | Check | Failure |
//! |-------|---------|
//! | Recipient is this agent | `Misrouted` |
//! | An ack matches the handshake in flight | `WrongSession` |
//! | State is ACTIVE (control types exempt) | `NotActive` |
//! | Session token matches while one is held | `WrongSession` |
//! | Sequence above last seen for the sender | `Replay` |
//!
//! A rejected envelope leaves the session untouched.

pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::entities::{
    AcceptedMessage, CheckinTicket, DisconnectReason, Session, SessionState,
};
pub use domain::errors::{RejectError, SessionError};
pub use ports::inbound::SessionManagerApi;
pub use ports::outbound::{NoopObserver, SessionObserver};
pub use service::SessionManager;
