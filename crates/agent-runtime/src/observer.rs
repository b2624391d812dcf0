//! Session observer feeding the telemetry crate.

use agent_telemetry::{metric_inc, SESSION_ACTIVE, SESSION_TRANSITIONS};
use sdk_02_session_manager::{SessionObserver, SessionState};

/// Counts transitions and tracks whether a session is active.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl SessionObserver for MetricsObserver {
    fn on_transition(&self, from: SessionState, to: SessionState) {
        if from == to {
            return;
        }
        metric_inc!(SESSION_TRANSITIONS, &[to.as_str()]);
        SESSION_ACTIVE.set(i64::from(to == SessionState::Active));
    }
}
