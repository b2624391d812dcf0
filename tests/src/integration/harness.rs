//! # Test Harness
//!
//! A scripted orchestrator and agent factory sharing one in-memory broker.
//!
//! The orchestrator is deliberately thin: it opens what it receives with its
//! own [`EnvelopePipeline`], learns agent keys from their checkin, and only
//! answers when a test tells it to. Everything protocol-relevant on the agent
//! side runs through the real [`AgentClient`].

use agent_crypto::{AgentKeys, InMemoryKeyStore};
use agent_runtime::{AgentClient, AgentConfig, AgentError, EnvelopePipeline, Opened};
use agent_transport::{InMemoryBroker, Route, Subscription, Topics, Transport, TransportProtocol};
use agent_types::{
    current_timestamp_millis, AgentId, AgentMessage, CheckinAck, CheckinRequest, CheckoutAck,
    EnvelopeHeader, PublicKeyBundle, RESPONSE_CODE_OK,
};
use sdk_01_envelope_codec::{EnvelopeCodecApi, EnvelopeCodecService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

/// How long the orchestrator waits for an agent request.
pub const REQUEST_WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// AGENT FACTORY
// =============================================================================

/// Configuration with short timeouts for tests.
pub fn agent_config(agent_id: &str, protocol: TransportProtocol) -> AgentConfig {
    AgentConfig {
        yard_uid: Some("yard_A".to_string()),
        protocol,
        publish_timeout: Duration::from_millis(500),
        checkin_timeout: Duration::from_millis(500),
        ..AgentConfig::for_agent(agent_id)
    }
}

/// Key store holding a fresh identity for `agent_id`.
pub fn agent_store(agent_id: &str) -> Arc<InMemoryKeyStore> {
    let store = Arc::new(InMemoryKeyStore::new());
    store.insert_private(AgentId::new(agent_id), AgentKeys::generate());
    store
}

/// Agent client on `broker` with the default test configuration.
pub fn spawn_agent(broker: &InMemoryBroker, agent_id: &str) -> AgentClient<InMemoryBroker> {
    spawn_agent_with(broker, agent_config(agent_id, broker.protocol()))
}

/// Agent client on `broker` with a custom configuration.
pub fn spawn_agent_with(broker: &InMemoryBroker, config: AgentConfig) -> AgentClient<InMemoryBroker> {
    let store = agent_store(config.agent_id.as_str());
    AgentClient::new(config, Arc::new(broker.clone()), store)
        .expect("test agent configuration is valid")
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Scripted orchestrator.
pub struct Orchestrator {
    broker: InMemoryBroker,
    store: Arc<InMemoryKeyStore>,
    pipeline: EnvelopePipeline,
    public_keys: PublicKeyBundle,
    sequence: AtomicU64,
}

impl Orchestrator {
    /// Orchestrator with a fresh identity on `broker`.
    pub fn new(broker: InMemoryBroker) -> Self {
        Self::with_identity(broker, AgentId::orchestrator())
    }

    /// An impostor claiming `identity` with its own keys.
    pub fn with_identity(broker: InMemoryBroker, identity: AgentId) -> Self {
        let keys = AgentKeys::generate();
        let public_keys = keys.public_bundle();
        let store = Arc::new(InMemoryKeyStore::new());
        store.insert_private(identity.clone(), keys);
        let pipeline = EnvelopePipeline::new(
            EnvelopeCodecService::default(),
            agent_crypto::CryptoProvider::new(identity, store.clone()),
        );

        Self {
            broker,
            store,
            pipeline,
            public_keys,
            sequence: AtomicU64::new(0),
        }
    }

    /// Keys to provision on agents that should not rely on discovery.
    pub fn public_keys(&self) -> PublicKeyBundle {
        self.public_keys.clone()
    }

    /// Seal/open pipeline of the orchestrator.
    pub fn pipeline(&self) -> &EnvelopePipeline {
        &self.pipeline
    }

    /// Whether the orchestrator learned keys for `agent_id`.
    pub fn knows(&self, agent_id: &AgentId) -> bool {
        self.pipeline.crypto().peer_keys(agent_id).is_some()
    }

    /// Subscribe to an agent's checkin/checkout requests.
    pub async fn listen(&self, topics: &Topics) -> Subscription {
        self.subscribe(&topics.checkin()).await
    }

    /// Subscribe to any route.
    pub async fn subscribe(&self, route: &Route) -> Subscription {
        self.broker
            .subscribe(route)
            .await
            .expect("broker accepts subscriptions")
    }

    /// Next request on `requests`, opened and verified.
    ///
    /// Keys announced in a checkin are remembered for later traffic.
    pub async fn next_request(&self, requests: &mut Subscription) -> Result<Opened, AgentError> {
        let frame = timeout(REQUEST_WAIT, requests.recv())
            .await
            .map_err(|_| AgentError::TransportTimeout {
                operation: "receive",
                timeout: REQUEST_WAIT,
            })?
            .ok_or(agent_transport::TransportError::Closed)?;

        let opened = self.pipeline.open(&frame.payload)?;
        if let Some(keys) = opened.announced_keys.clone() {
            self.store
                .install_public(opened.header.sender_id.clone(), keys);
        }
        Ok(opened)
    }

    /// Header from the orchestrator to `recipient` with the next sequence
    /// number.
    pub fn header(&self, recipient: &AgentId, session_token: Option<String>) -> EnvelopeHeader {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.header_with_sequence(recipient, session_token, sequence)
    }

    /// Header with an explicit sequence number.
    pub fn header_with_sequence(
        &self,
        recipient: &AgentId,
        session_token: Option<String>,
        sequence_number: u64,
    ) -> EnvelopeHeader {
        EnvelopeHeader {
            sender_id: self.pipeline.crypto().agent_id().clone(),
            recipient_id: recipient.clone(),
            message_type: String::new(),
            sequence_number,
            timestamp: current_timestamp_millis(),
            session_token,
            correlation_id: Uuid::new_v4(),
            reply_to: None,
            encrypted: false,
        }
    }

    /// Seal and publish `message` to `route`.
    pub async fn deliver(
        &self,
        route: &Route,
        header: EnvelopeHeader,
        message: &AgentMessage,
    ) -> Result<(), AgentError> {
        let bytes = self.pipeline.seal(header, message)?;
        self.publish_raw(route, bytes).await
    }

    /// Publish raw bytes to `route`.
    pub async fn publish_raw(&self, route: &Route, bytes: Vec<u8>) -> Result<(), AgentError> {
        self.broker.publish(route, bytes).await?;
        Ok(())
    }

    /// Answer `request` on the agent's response route, echoing its
    /// correlation id and session token.
    pub async fn reply(
        &self,
        topics: &Topics,
        request: &Opened,
        message: &AgentMessage,
    ) -> Result<(), AgentError> {
        let mut header = self.header(
            &request.header.sender_id,
            request.header.session_token.clone(),
        );
        header.correlation_id = request.header.correlation_id;
        self.deliver(&topics.checkin_response(), header, message).await
    }

    /// Ack for `request` with the given code.
    pub fn checkin_ack(
        &self,
        request: &CheckinRequest,
        response_code: &str,
        session_token: Option<&str>,
    ) -> CheckinAck {
        CheckinAck {
            response_code: response_code.to_string(),
            message: (response_code != RESPONSE_CODE_OK).then(|| "checkin refused".to_string()),
            checkin_id: request.checkin_id,
            session_token: session_token.map(str::to_string),
            orchestrator_keys: Some(self.public_keys()),
            account: None,
            yard: None,
        }
    }

    /// Wait for a checkin and answer it with `response_code`.
    pub async fn serve_checkin(
        &self,
        requests: &mut Subscription,
        topics: &Topics,
        response_code: &str,
        session_token: Option<&str>,
    ) -> Result<CheckinRequest, AgentError> {
        let opened = self.next_request(requests).await?;
        let AgentMessage::Checkin(request) = &opened.message else {
            panic!("expected checkin, got {}", opened.header.message_type);
        };
        let ack = self.checkin_ack(request, response_code, session_token);
        self.reply(topics, &opened, &AgentMessage::CheckinAck(ack)).await?;
        Ok(request.clone())
    }

    /// Wait for a checkout and confirm it.
    pub async fn serve_checkout(
        &self,
        requests: &mut Subscription,
        topics: &Topics,
    ) -> Result<Opened, AgentError> {
        let opened = self.next_request(requests).await?;
        let ack = AgentMessage::CheckoutAck(CheckoutAck {
            response_code: RESPONSE_CODE_OK.to_string(),
            message: None,
        });
        self.reply(topics, &opened, &ack).await?;
        Ok(opened)
    }

    /// Re-encode `bytes` after `edit`, re-signing with the orchestrator key
    /// when `resign` is set.
    pub fn tamper(
        &self,
        bytes: &[u8],
        resign: bool,
        edit: impl FnOnce(&mut agent_types::Envelope),
    ) -> Vec<u8> {
        let codec = self.pipeline.codec();
        let mut envelope = codec.decode_envelope(bytes).expect("own envelope decodes");
        edit(&mut envelope);
        if resign {
            let signature = self
                .pipeline
                .crypto()
                .sign(&envelope.signing_bytes())
                .expect("orchestrator can sign");
            envelope.signature = Some(signature);
        }
        codec.encode_envelope(&envelope).expect("envelope re-encodes")
    }
}
