//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits that define what this subsystem reports to.

use crate::domain::entities::SessionState;

/// Receives every state transition after it has been committed.
///
/// Called outside the session lock; implementations may read the session
/// back but must not block.
pub trait SessionObserver: Send + Sync {
    /// `from` -> `to` happened.
    fn on_transition(&self, from: SessionState, to: SessionState);
}

/// Observer that ignores transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_transition(&self, _from: SessionState, _to: SessionState) {}
}
