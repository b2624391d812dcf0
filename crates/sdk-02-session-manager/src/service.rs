//! # Session Manager Service
//!
//! Application service layer that implements the `SessionManagerApi` trait.
//!
//! ## Architecture
//!
//! - Implements the inbound port (`SessionManagerApi`)
//! - Reports transitions through the outbound port (`SessionObserver`)
//! - The `Session` record sits behind one mutex; it is the only mutable
//!   state shared between inbound delivery and outbound production

use crate::domain::entities::{
    AcceptedMessage, CheckinTicket, DisconnectReason, Session, SessionState,
};
use crate::domain::errors::{RejectError, SessionError};
use crate::ports::inbound::SessionManagerApi;
use crate::ports::outbound::{NoopObserver, SessionObserver};
use agent_types::{AgentId, EnvelopeHeader, MessageType};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session Manager Service.
pub struct SessionManager<O: SessionObserver = NoopObserver> {
    agent_id: AgentId,
    session: Mutex<Session>,
    observer: O,
}

impl SessionManager<NoopObserver> {
    /// Create a disconnected session for `agent_id`.
    #[must_use]
    pub fn new(agent_id: AgentId) -> Self {
        Self::with_observer(agent_id, NoopObserver)
    }
}

impl<O: SessionObserver> SessionManager<O> {
    /// Create a disconnected session reporting to `observer`.
    pub fn with_observer(agent_id: AgentId, observer: O) -> Self {
        Self {
            agent_id,
            session: Mutex::new(Session::default()),
            observer,
        }
    }

    /// Copy of the current session record.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.session.lock().clone()
    }

    fn notify(&self, from: SessionState, to: SessionState) {
        if from != to {
            info!(agent_id = %self.agent_id, from = %from, to = %to, "session transition");
            self.observer.on_transition(from, to);
        }
    }
}

impl<O: SessionObserver> SessionManagerApi for SessionManager<O> {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn state(&self) -> SessionState {
        self.session.lock().state
    }

    fn session_token(&self) -> Option<String> {
        self.session.lock().session_token.clone()
    }

    fn begin_checkin(&self) -> Result<CheckinTicket, SessionError> {
        let checkin_id = Uuid::new_v4();
        {
            let mut session = self.session.lock();
            if session.state != SessionState::Disconnected {
                return Err(SessionError::InvalidTransition {
                    operation: "begin checkin",
                    state: session.state,
                });
            }
            session.reset();
            session.state = SessionState::CheckingIn;
            session.pending_checkin = Some(checkin_id);
        }
        self.notify(SessionState::Disconnected, SessionState::CheckingIn);
        Ok(CheckinTicket { checkin_id })
    }

    fn complete_checkin(
        &self,
        checkin_id: Uuid,
        session_token: Option<String>,
    ) -> Result<(), RejectError> {
        {
            let mut session = self.session.lock();
            if session.state != SessionState::CheckingIn
                || session.pending_checkin != Some(checkin_id)
            {
                warn!(
                    agent_id = %self.agent_id,
                    state = %session.state,
                    checkin_id = %checkin_id,
                    "discarding stale checkin ack"
                );
                return Err(RejectError::WrongSession);
            }
            session.state = SessionState::Active;
            session.pending_checkin = None;
            session.session_token = session_token;
        }
        self.notify(SessionState::CheckingIn, SessionState::Active);
        Ok(())
    }

    fn cancel_checkin(&self, checkin_id: Uuid) -> bool {
        {
            let mut session = self.session.lock();
            if session.state != SessionState::CheckingIn
                || session.pending_checkin != Some(checkin_id)
            {
                return false;
            }
            session.reset();
        }
        self.notify(SessionState::CheckingIn, SessionState::Disconnected);
        true
    }

    fn begin_checkout(&self) -> Result<(), SessionError> {
        {
            let mut session = self.session.lock();
            if session.state != SessionState::Active {
                return Err(SessionError::InvalidTransition {
                    operation: "begin checkout",
                    state: session.state,
                });
            }
            session.state = SessionState::CheckingOut;
        }
        self.notify(SessionState::Active, SessionState::CheckingOut);
        Ok(())
    }

    fn complete_checkout(&self) -> Result<(), SessionError> {
        {
            let mut session = self.session.lock();
            if session.state != SessionState::CheckingOut {
                return Err(SessionError::InvalidTransition {
                    operation: "complete checkout",
                    state: session.state,
                });
            }
            session.reset();
        }
        self.notify(SessionState::CheckingOut, SessionState::Disconnected);
        Ok(())
    }

    fn force_disconnect(&self, reason: DisconnectReason) {
        let from = {
            let mut session = self.session.lock();
            let from = session.state;
            session.reset();
            from
        };
        if from != SessionState::Disconnected {
            warn!(agent_id = %self.agent_id, reason = %reason, from = %from, "session forced down");
        }
        self.notify(from, SessionState::Disconnected);
    }

    fn next_sequence(&self) -> u64 {
        let mut session = self.session.lock();
        session.last_sequence_sent += 1;
        session.last_sequence_sent
    }

    fn accept(&self, header: &EnvelopeHeader) -> Result<AcceptedMessage, RejectError> {
        if header.recipient_id != self.agent_id {
            return Err(RejectError::Misrouted {
                recipient: header.recipient_id.clone(),
            });
        }

        let message_type = MessageType::from_name(&header.message_type);
        let mut session = self.session.lock();

        // Acks only belong to the handshake that is in flight.
        let handshake = match message_type {
            Some(MessageType::CheckinAck) => Some(SessionState::CheckingIn),
            Some(MessageType::CheckoutAck) => Some(SessionState::CheckingOut),
            _ => None,
        };
        match handshake {
            Some(expected) if session.state != expected => return Err(RejectError::WrongSession),
            Some(_) => {}
            None if message_type.is_some_and(|t| t.is_control()) => {}
            None if session.state != SessionState::Active => {
                return Err(RejectError::NotActive {
                    state: session.state,
                });
            }
            None => {}
        }

        let holds_token = matches!(
            session.state,
            SessionState::Active | SessionState::CheckingOut
        );
        if holds_token && header.session_token != session.session_token {
            return Err(RejectError::WrongSession);
        }

        let last_seen = session
            .last_sequence_seen
            .get(&header.sender_id)
            .copied()
            .unwrap_or(0);
        if header.sequence_number <= last_seen {
            return Err(RejectError::Replay {
                sender: header.sender_id.clone(),
                sequence: header.sequence_number,
                last_seen,
            });
        }
        session
            .last_sequence_seen
            .insert(header.sender_id.clone(), header.sequence_number);

        debug!(
            sender = %header.sender_id,
            message_type = %header.message_type,
            sequence = header.sequence_number,
            "envelope accepted"
        );

        Ok(AcceptedMessage {
            sender_id: header.sender_id.clone(),
            message_type: header.message_type.clone(),
            sequence_number: header.sequence_number,
            correlation_id: header.correlation_id,
        })
    }
}

impl<O: SessionObserver> std::fmt::Debug for SessionManager<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("agent_id", &self.agent_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
