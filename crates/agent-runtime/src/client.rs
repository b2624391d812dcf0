//! # Agent Client
//!
//! One agent's side of the protocol: the session lifecycle, outbound
//! messages and inbound delivery, over any [`Transport`] backend.
//!
//! ## Inbound Order
//!
//! 1. Envelope decode (size, JSON, version)
//! 2. Signature verification; failure forces the session down
//! 3. Decryption of sealed bodies
//! 4. Body decode
//! 5. Session acceptance (recipient, state, token, sequence)
//!
//! Nothing reaches the caller unless every step passed.
//!
//! ## Timeouts and Cancellation
//!
//! Every publish is bounded by `publish_timeout`, every handshake by
//! `checkin_timeout`. Dropping a `checkin`/`checkout` future or calling
//! [`AgentClient::cancel`] reverts the session to `DISCONNECTED`; a late ack
//! is then stale and discarded.

use crate::config::{AgentConfig, ConfigError};
use crate::observer::MetricsObserver;
use crate::pipeline::{type_label, EnvelopePipeline, Opened};
use crate::AgentError;
use agent_crypto::{CryptoProvider, KeyStore};
use agent_telemetry::{metric_inc, ENVELOPES_OPENED, ENVELOPES_REJECTED, TRANSPORT_TIMEOUTS};
use agent_transport::{InboundFrame, Route, Subscription, Topics, Transport, TransportError};
use agent_types::{
    current_timestamp_millis, AgentId, AgentMessage, AgentStatus, CheckinAck, CheckinRequest,
    CheckoutAck, CheckoutRequest, EnvelopeHeader, YardUid, PUBLIC_KEY_FORMAT, RESPONSE_CODE_OK,
};
use parking_lot::RwLock;
use sdk_01_envelope_codec::EnvelopeCodecService;
use sdk_02_session_manager::{
    AcceptedMessage, DisconnectReason, SessionError, SessionManager, SessionManagerApi,
    SessionState,
};
use serde_json::{Map, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Caller veto over a successful checkin ack. Returning `false` refuses it.
pub type CheckinGuard = Box<dyn Fn(&CheckinAck) -> bool + Send + Sync>;

/// An inbound message that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Session view of the envelope.
    pub accepted: AcceptedMessage,
    /// Typed body.
    pub message: AgentMessage,
    /// Where the sender expects a response, if anywhere.
    pub reply_to: Option<String>,
}

/// Agent runtime over a transport backend.
pub struct AgentClient<T: Transport + ?Sized> {
    config: AgentConfig,
    transport: Arc<T>,
    pipeline: EnvelopePipeline,
    session: SessionManager<MetricsObserver>,
    topics: RwLock<Topics>,
    checkin_guard: Option<CheckinGuard>,
    cancel: Notify,
}

impl<T: Transport + ?Sized> AgentClient<T> {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// - `Config` if the configuration is invalid or names another protocol
    ///   than the backend speaks
    /// - `Crypto(NoKey)` if the key store holds no keys for the agent
    pub fn new(
        config: AgentConfig,
        transport: Arc<T>,
        key_store: Arc<dyn KeyStore>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        if transport.protocol() != config.protocol {
            return Err(ConfigError::ProtocolMismatch {
                configured: config.protocol,
                backend: transport.protocol(),
            }
            .into());
        }

        let crypto = CryptoProvider::new(config.agent_id.clone(), key_store);
        crypto.public_keys()?;

        let codec = EnvelopeCodecService::new(config.codec_config());
        let pipeline = EnvelopePipeline::new(codec, crypto)
            .sign_outbound(config.sign_outbound)
            .require_signatures(config.require_signatures);
        let topics = Topics::new(
            config.protocol,
            config.agent_id.clone(),
            config.exchanges.clone(),
        );

        info!(
            agent_id = %config.agent_id,
            protocol = %config.protocol,
            "agent client created"
        );
        Ok(Self {
            session: SessionManager::with_observer(config.agent_id.clone(), MetricsObserver),
            topics: RwLock::new(topics),
            pipeline,
            transport,
            config,
            checkin_guard: None,
            cancel: Notify::new(),
        })
    }

    /// Install a checkin guard consulted for every accepted ack.
    #[must_use]
    pub fn with_checkin_guard(
        mut self,
        guard: impl Fn(&CheckinAck) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.checkin_guard = Some(Box::new(guard));
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// This agent's id.
    pub fn agent_id(&self) -> &AgentId {
        &self.config.agent_id
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The session manager.
    pub fn session(&self) -> &SessionManager<MetricsObserver> {
        &self.session
    }

    /// Seal/open pipeline of this agent.
    pub fn pipeline(&self) -> &EnvelopePipeline {
        &self.pipeline
    }

    /// Current routes. Yard routes appear after a successful checkin.
    pub fn topics(&self) -> Topics {
        self.topics.read().clone()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Check in to the configured yard.
    ///
    /// # Errors
    ///
    /// `Config(Missing)` when no yard is configured; otherwise see
    /// [`checkin_to`](Self::checkin_to).
    pub async fn checkin(
        &self,
        status: AgentStatus,
        agent_data: Map<String, Value>,
    ) -> Result<CheckinAck, AgentError> {
        let yard_uid = self
            .config
            .yard_uid
            .clone()
            .ok_or(ConfigError::Missing("FLEET_YARD_UID"))?;
        self.checkin_to(yard_uid, status, agent_data).await
    }

    /// Run the checkin handshake with `yard_uid`.
    ///
    /// On success the session is ACTIVE, the orchestrator's announced keys
    /// are installed if none were provisioned, and yard routes are set.
    ///
    /// # Errors
    ///
    /// - `Session` unless DISCONNECTED
    /// - `TransportTimeout` if no matching ack arrives within
    ///   `checkin_timeout`
    /// - `CheckinRefused` for a non-success ack or a guard veto
    /// - `Cancelled` if [`cancel`](Self::cancel) was called
    /// - a verification error if the ack fails authentication
    ///
    /// Every error leaves the session DISCONNECTED.
    pub async fn checkin_to(
        &self,
        yard_uid: impl Into<YardUid>,
        status: AgentStatus,
        agent_data: Map<String, Value>,
    ) -> Result<CheckinAck, AgentError> {
        let yard_uid = yard_uid.into();
        let ticket = self.session.begin_checkin()?;
        let mut handshake = Handshake::checkin(&self.session, ticket.checkin_id);

        let (request_route, response_route) = {
            let topics = self.topics.read();
            (topics.checkin(), topics.checkin_response())
        };
        let mut responses = self.transport.subscribe(&response_route).await?;

        let request = AgentMessage::Checkin(CheckinRequest {
            yard_uid: yard_uid.clone(),
            status,
            public_keys: self.pipeline.crypto().public_keys()?,
            public_key_format: PUBLIC_KEY_FORMAT.to_string(),
            registration_token: self.config.registration_token.clone(),
            checkin_id: ticket.checkin_id,
            agent_data,
        });
        let header = self.header(ticket.checkin_id, Some(response_route.key.clone()), false);
        let bytes = self.pipeline.seal(header, &request)?;
        self.publish(&request_route, bytes).await?;
        info!(agent_id = %self.config.agent_id, yard = %yard_uid, "checkin requested");

        let deadline = Instant::now() + self.config.checkin_timeout;
        let (ack, announced_keys) = self
            .await_response(&handshake, &mut responses, deadline, "checkin", |opened| {
                match &opened.message {
                    AgentMessage::CheckinAck(ack)
                        if opened.header.sender_id == AgentId::orchestrator()
                            && ack.checkin_id == ticket.checkin_id =>
                    {
                        Some((ack.clone(), opened.announced_keys))
                    }
                    _ => None,
                }
            })
            .await?;

        if !ack.is_accepted() {
            warn!(code = %ack.response_code, "checkin refused by orchestrator");
            return Err(AgentError::CheckinRefused {
                code: ack.response_code,
                message: ack.message.unwrap_or_default(),
            });
        }
        if let Some(guard) = &self.checkin_guard {
            if !guard(&ack) {
                warn!("checkin ack vetoed by guard");
                return Err(AgentError::CheckinRefused {
                    code: ack.response_code,
                    message: "rejected by checkin guard".to_string(),
                });
            }
        }

        self.session
            .complete_checkin(ack.checkin_id, ack.session_token.clone())?;
        handshake.disarm();

        if let Some(keys) = announced_keys {
            self.pipeline
                .crypto()
                .install_peer_keys(&AgentId::orchestrator(), keys);
        }
        self.topics.write().set_yard(yard_uid.clone());
        info!(agent_id = %self.config.agent_id, yard = %yard_uid, "checkin complete");
        Ok(ack)
    }

    /// Run the checkout handshake.
    ///
    /// The session ends DISCONNECTED whatever the outcome; errors only tell
    /// whether the orchestrator confirmed.
    pub async fn checkout(&self, reason: Option<String>) -> Result<CheckoutAck, AgentError> {
        self.session.begin_checkout()?;
        let mut handshake = Handshake::checkout(&self.session);

        let (request_route, response_route) = {
            let topics = self.topics.read();
            (topics.checkin(), topics.checkin_response())
        };
        let mut responses = self.transport.subscribe(&response_route).await?;

        let correlation_id = Uuid::new_v4();
        let header = self.header(correlation_id, Some(response_route.key.clone()), false);
        let bytes = self
            .pipeline
            .seal(header, &AgentMessage::Checkout(CheckoutRequest { reason }))?;
        self.publish(&request_route, bytes).await?;
        info!(agent_id = %self.config.agent_id, "checkout requested");

        let deadline = Instant::now() + self.config.checkin_timeout;
        let ack = self
            .await_response(&handshake, &mut responses, deadline, "checkout", |opened| {
                match &opened.message {
                    AgentMessage::CheckoutAck(ack)
                        if opened.header.correlation_id == correlation_id =>
                    {
                        Some(ack.clone())
                    }
                    _ => None,
                }
            })
            .await?;
        if ack.response_code != RESPONSE_CODE_OK {
            warn!(code = %ack.response_code, "checkout not confirmed");
        }

        self.session.complete_checkout()?;
        handshake.disarm();
        info!(agent_id = %self.config.agent_id, "checkout complete");
        Ok(ack)
    }

    /// Abort an in-flight checkin or checkout.
    ///
    /// Returns `true` if a handshake was pending.
    pub fn cancel(&self) -> bool {
        let snapshot = self.session.snapshot();
        let cancelled = match snapshot.state {
            SessionState::CheckingIn => snapshot
                .pending_checkin
                .is_some_and(|id| self.session.cancel_checkin(id)),
            SessionState::CheckingOut => {
                self.session.force_disconnect(DisconnectReason::Cancelled);
                true
            }
            SessionState::Disconnected | SessionState::Active => false,
        };
        self.cancel.notify_waiters();
        cancelled
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Send a message to the orchestrator, encrypted if configured so.
    ///
    /// Returns the sequence number used.
    ///
    /// # Errors
    ///
    /// - `Session` unless ACTIVE
    /// - `NoRoute` for handshake and downlink-only types
    pub async fn send(&self, message: &AgentMessage) -> Result<u64, AgentError> {
        self.send_with(message, self.config.encrypt_outbound).await
    }

    /// Send a message with its body sealed for the orchestrator.
    pub async fn send_encrypted(&self, message: &AgentMessage) -> Result<u64, AgentError> {
        self.send_with(message, true).await
    }

    /// Publish `message` on an explicit route, such as a yard route.
    ///
    /// Returns the sequence number used.
    ///
    /// # Errors
    ///
    /// - `Session` unless ACTIVE
    /// - `NoRoute` for checkin and checkout messages, which only travel
    ///   through their handshakes
    pub async fn publish_to(
        &self,
        route: &Route,
        message: &AgentMessage,
        reply_to: Option<String>,
        correlation_id: Option<Uuid>,
    ) -> Result<u64, AgentError> {
        self.ensure_active("publish")?;
        if message.is_control() {
            return Err(AgentError::NoRoute(message.type_name().to_string()));
        }

        let header = self.header(
            correlation_id.unwrap_or_else(Uuid::new_v4),
            reply_to,
            self.config.encrypt_outbound,
        );
        self.publish_message(route, header, message).await
    }

    /// Answer `delivery` on the route its sender named, under the same
    /// correlation id.
    ///
    /// # Errors
    ///
    /// `NoReplyRoute` if the delivery named none; otherwise as
    /// [`publish_to`](Self::publish_to).
    pub async fn reply(
        &self,
        delivery: &Delivery,
        message: &AgentMessage,
    ) -> Result<u64, AgentError> {
        self.ensure_active("reply")?;
        let sender = &delivery.accepted.sender_id;
        let key = delivery
            .reply_to
            .as_deref()
            .ok_or_else(|| AgentError::NoReplyRoute(sender.clone()))?;
        if message.is_control() {
            return Err(AgentError::NoRoute(message.type_name().to_string()));
        }

        let route = self.topics.read().reply(key);
        let mut header = self.header(
            delivery.accepted.correlation_id,
            None,
            self.config.encrypt_outbound,
        );
        header.recipient_id = sender.clone();
        self.publish_message(&route, header, message).await
    }

    async fn send_with(&self, message: &AgentMessage, encrypt: bool) -> Result<u64, AgentError> {
        self.ensure_active("send")?;
        let route = message
            .message_type()
            .filter(|t| !t.is_control())
            .and_then(|t| self.topics.read().outbound(t))
            .ok_or_else(|| AgentError::NoRoute(message.type_name().to_string()))?;

        let header = self.header(Uuid::new_v4(), None, encrypt);
        self.publish_message(&route, header, message).await
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), AgentError> {
        let state = self.session.state();
        if state != SessionState::Active {
            return Err(SessionError::InvalidTransition { operation, state }.into());
        }
        Ok(())
    }

    async fn publish_message(
        &self,
        route: &Route,
        header: EnvelopeHeader,
        message: &AgentMessage,
    ) -> Result<u64, AgentError> {
        let sequence = header.sequence_number;
        let bytes = self.pipeline.seal(header, message)?;
        self.publish(route, bytes).await?;
        debug!(route = %route, sequence, "message published");
        Ok(sequence)
    }

    fn header(
        &self,
        correlation_id: Uuid,
        reply_to: Option<String>,
        encrypted: bool,
    ) -> EnvelopeHeader {
        EnvelopeHeader {
            sender_id: self.config.agent_id.clone(),
            recipient_id: AgentId::orchestrator(),
            message_type: String::new(),
            sequence_number: self.session.next_sequence(),
            timestamp: current_timestamp_millis(),
            session_token: self.session.session_token(),
            correlation_id,
            reply_to,
            encrypted,
        }
    }

    async fn publish(&self, route: &Route, bytes: Vec<u8>) -> Result<(), AgentError> {
        let limit = self.config.publish_timeout;
        match timeout(limit, self.transport.publish(route, bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(TransportError::Closed)) => {
                self.session
                    .force_disconnect(DisconnectReason::TransportLost);
                Err(TransportError::Closed.into())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                metric_inc!(TRANSPORT_TIMEOUTS, &["publish"]);
                warn!(route = %route, timeout = ?limit, "publish timed out");
                Err(AgentError::TransportTimeout {
                    operation: "publish",
                    timeout: limit,
                })
            }
        }
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Run inbound bytes through verification, decryption, decoding and the
    /// session checks.
    ///
    /// # Errors
    ///
    /// Any failure means the envelope MUST be discarded. A verification
    /// failure also forces the session to DISCONNECTED.
    pub fn receive(&self, payload: &[u8]) -> Result<Delivery, AgentError> {
        let opened = self.pipeline.open(payload).inspect_err(|e| self.record_rejection(e))?;
        let accepted = self
            .session
            .accept(&opened.header)
            .map_err(AgentError::from)
            .inspect_err(|e| self.record_rejection(e))?;

        metric_inc!(ENVELOPES_OPENED, &[type_label(&accepted.message_type)]);
        Ok(Delivery {
            accepted,
            message: opened.message,
            reply_to: opened.header.reply_to,
        })
    }

    /// Subscribe to assignments and instant actions.
    pub async fn inbox(&self) -> Result<Inbox<'_, T>, AgentError> {
        let (assignment, instant_actions) = {
            let topics = self.topics.read();
            (topics.assignment(), topics.instant_actions())
        };
        let assignments = self.transport.subscribe(&assignment).await?;
        let actions = self.transport.subscribe(&instant_actions).await?;

        Ok(Inbox {
            client: self,
            frames: Box::pin(assignments.into_stream().merge(actions.into_stream())),
        })
    }

    /// Next response of `handshake` that passed the pipeline, was picked by
    /// `select` and then accepted by the session.
    ///
    /// Responses `select` does not claim are discarded before the session
    /// records their sequence numbers.
    async fn await_response<R>(
        &self,
        handshake: &Handshake<'_>,
        responses: &mut Subscription,
        deadline: Instant,
        operation: &'static str,
        select: impl Fn(&Opened) -> Option<R>,
    ) -> Result<R, AgentError> {
        loop {
            let frame = self.next_frame(handshake, responses, deadline, operation).await?;
            let opened = match self.pipeline.open(&frame.payload) {
                Ok(opened) => opened,
                Err(e) => {
                    self.record_rejection(&e);
                    if e.is_verification_failure() {
                        return Err(e);
                    }
                    continue;
                }
            };
            let Some(response) = select(&opened) else {
                metric_inc!(ENVELOPES_REJECTED, &["wrong_session"]);
                warn!(
                    operation,
                    sender = %opened.header.sender_id,
                    message_type = %opened.header.message_type,
                    "discarding response for another handshake"
                );
                continue;
            };
            if let Err(e) = self.session.accept(&opened.header) {
                self.record_rejection(&AgentError::from(e));
                continue;
            }
            return Ok(response);
        }
    }

    async fn next_frame(
        &self,
        handshake: &Handshake<'_>,
        responses: &mut Subscription,
        deadline: Instant,
        operation: &'static str,
    ) -> Result<InboundFrame, AgentError> {
        // Armed before the state check, so a cancel in between still wakes us.
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();
        if !handshake.is_pending() {
            return Err(AgentError::Cancelled);
        }

        tokio::select! {
            () = cancelled.as_mut() => Err(AgentError::Cancelled),
            received = timeout_at(deadline, responses.recv()) => match received {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => {
                    self.session.force_disconnect(DisconnectReason::TransportLost);
                    Err(TransportError::Closed.into())
                }
                Err(_) => {
                    metric_inc!(TRANSPORT_TIMEOUTS, &[operation]);
                    warn!(operation, timeout = ?self.config.checkin_timeout, "no response in time");
                    Err(AgentError::TransportTimeout {
                        operation,
                        timeout: self.config.checkin_timeout,
                    })
                }
            },
        }
    }

    fn record_rejection(&self, err: &AgentError) {
        metric_inc!(ENVELOPES_REJECTED, &[err.reason()]);
        warn!(
            agent_id = %self.config.agent_id,
            reason = err.reason(),
            error = %err,
            "inbound envelope rejected"
        );
        if err.is_verification_failure() {
            self.session
                .force_disconnect(DisconnectReason::VerificationFailed);
        }
    }
}

impl<T: Transport + ?Sized> std::fmt::Debug for AgentClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("agent_id", &self.config.agent_id)
            .field("protocol", &self.config.protocol)
            .field("state", &self.session.state())
            .finish_non_exhaustive()
    }
}

/// Stream of inbound messages for one client.
pub struct Inbox<'a, T: Transport + ?Sized> {
    client: &'a AgentClient<T>,
    frames: Pin<Box<dyn Stream<Item = InboundFrame> + Send + 'a>>,
}

impl<T: Transport + ?Sized> Inbox<'_, T> {
    /// Wait up to `wait` for the next inbound envelope.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(delivery))` - An envelope passed every check
    /// - `Ok(None)` - The transport closed; the session was forced down
    /// - `Err(TransportTimeout)` - Nothing arrived in time
    /// - `Err(_)` - An envelope arrived and was rejected
    pub async fn recv(&mut self, wait: Duration) -> Result<Option<Delivery>, AgentError> {
        match timeout(wait, self.frames.next()).await {
            Ok(Some(frame)) => self.client.receive(&frame.payload).map(Some),
            Ok(None) => {
                self.client
                    .session
                    .force_disconnect(DisconnectReason::TransportLost);
                Ok(None)
            }
            Err(_) => Err(AgentError::TransportTimeout {
                operation: "receive",
                timeout: wait,
            }),
        }
    }
}

/// Reverts the session if a handshake is abandoned before completing.
struct Handshake<'a> {
    session: &'a SessionManager<MetricsObserver>,
    checkin_id: Option<Uuid>,
    armed: bool,
}

impl<'a> Handshake<'a> {
    fn checkin(session: &'a SessionManager<MetricsObserver>, checkin_id: Uuid) -> Self {
        Self {
            session,
            checkin_id: Some(checkin_id),
            armed: true,
        }
    }

    fn checkout(session: &'a SessionManager<MetricsObserver>) -> Self {
        Self {
            session,
            checkin_id: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Whether the session is still waiting on this handshake.
    fn is_pending(&self) -> bool {
        match self.checkin_id {
            Some(id) => self.session.snapshot().pending_checkin == Some(id),
            None => self.session.state() == SessionState::CheckingOut,
        }
    }
}

impl Drop for Handshake<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.checkin_id {
            Some(id) => {
                if self.session.cancel_checkin(id) {
                    info!(checkin_id = %id, "checkin abandoned");
                }
            }
            None => {
                if self.session.state() == SessionState::CheckingOut {
                    self.session.force_disconnect(DisconnectReason::Requested);
                }
            }
        }
    }
}
