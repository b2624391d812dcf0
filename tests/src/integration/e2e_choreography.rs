//! # End-to-End Choreography Tests
//!
//! A complete agent session as the orchestrator sees it:
//!
//! ```text
//! [Agent]                                    [Orchestrator]
//!    │ ── checkin (keys, checkin_id) ──────────────→ │
//!    │ ←────────── checkin_ack (token, keys) ─────── │
//!    │ ── agent_state / visualization ─────────────→ │
//!    │ ←──────────────── assignment / instantActions │
//!    │ ── checkout ────────────────────────────────→ │
//!    │ ←─────────────────────────────── checkout_ack │
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: both protocols, plain and encrypted bodies, yard
//!    routes and replies
//! 2. **Ordering**: sequence numbers and replay suppression
//! 3. **Unknown Types**: reject or pass through per policy

#[cfg(test)]
mod tests {
    use crate::integration::harness::{agent_config, spawn_agent, spawn_agent_with, Orchestrator};
    use agent_runtime::{AgentClient, AgentError};
    use agent_transport::{InMemoryBroker, TransportProtocol};
    use agent_types::{
        AgentId, AgentMessage, AgentStateReport, AgentStatus, Assignment, DecodeError,
        InstantAction, InstantCommand, Pose, SensorReport, RESPONSE_CODE_OK,
    };
    use sdk_01_envelope_codec::UnknownTypePolicy;
    use sdk_02_session_manager::{RejectError, SessionState};
    use serde_json::{json, Map};
    use std::time::Duration;

    const AGENT: &str = "tug-12";
    const TOKEN: &str = "sess-42";
    const WAIT: Duration = Duration::from_millis(500);

    async fn checked_in(orchestrator: &Orchestrator, client: &AgentClient<InMemoryBroker>) {
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;
        let (ack, served) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some(TOKEN)),
        );
        ack.unwrap();
        served.unwrap();
        assert_eq!(client.state(), SessionState::Active);
    }

    fn assignment(id: &str) -> AgentMessage {
        AgentMessage::Assignment(Assignment {
            id: id.to_string(),
            work_process_id: Some("wp-1".into()),
            data: json!({"destination": {"x": 10.0, "y": -3.5}}),
        })
    }

    fn state_report() -> AgentMessage {
        AgentMessage::AgentState(AgentStateReport {
            status: AgentStatus::Busy,
            assignment: None,
        })
    }

    async fn full_session(protocol: TransportProtocol) {
        let broker = InMemoryBroker::new(protocol);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;
        let topics = client.topics();
        let agent_id = AgentId::new(AGENT);

        // Uplink
        let mut states = orchestrator.subscribe(&topics.state()).await;
        let sequence = client.send(&state_report()).await.unwrap();
        let opened = orchestrator.next_request(&mut states).await.unwrap();
        assert_eq!(opened.message, state_report());
        assert_eq!(opened.header.sequence_number, sequence);
        assert_eq!(opened.header.session_token.as_deref(), Some(TOKEN));

        // Downlink
        let mut inbox = client.inbox().await.unwrap();
        let header = orchestrator.header(&agent_id, Some(TOKEN.into()));
        orchestrator
            .deliver(&topics.assignment(), header, &assignment("as-1"))
            .await
            .unwrap();
        let delivery = inbox.recv(WAIT).await.unwrap().unwrap();
        assert_eq!(delivery.message, assignment("as-1"));
        assert_eq!(delivery.accepted.sender_id, AgentId::orchestrator());

        let action = AgentMessage::InstantActions(InstantAction {
            command: InstantCommand::AssignmentCancel,
            work_process_id: Some("wp-1".into()),
            data: None,
        });
        let header = orchestrator.header(&agent_id, Some(TOKEN.into()));
        orchestrator
            .deliver(&topics.instant_actions(), header, &action)
            .await
            .unwrap();
        assert_eq!(inbox.recv(WAIT).await.unwrap().unwrap().message, action);
        drop(inbox);

        // Checkout
        let mut requests = orchestrator.listen(&topics).await;
        let (ack, served) = tokio::join!(
            client.checkout(None),
            orchestrator.serve_checkout(&mut requests, &topics),
        );
        ack.unwrap();
        served.unwrap();
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    #[tokio::test]
    async fn test_full_session_amqp() {
        full_session(TransportProtocol::Amqp).await;
    }

    #[tokio::test]
    async fn test_full_session_mqtt() {
        full_session(TransportProtocol::Mqtt).await;
    }

    #[tokio::test]
    async fn test_encrypted_uplink() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let report = AgentMessage::AgentSensor(SensorReport {
            pose: Pose {
                x: 1.0,
                y: 2.0,
                z: 0.0,
                orientations: vec![0.5],
            },
            sensors: Map::new(),
        });
        let mut sensors = orchestrator.subscribe(&client.topics().visualization()).await;
        client.send_encrypted(&report).await.unwrap();

        let opened = orchestrator.next_request(&mut sensors).await.unwrap();
        assert!(opened.header.encrypted);
        assert_eq!(opened.message, report);
    }

    #[tokio::test]
    async fn test_encrypted_downlink() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let mut inbox = client.inbox().await.unwrap();
        let mut header = orchestrator.header(&AgentId::new(AGENT), Some(TOKEN.into()));
        header.encrypted = true;
        orchestrator
            .deliver(&client.topics().assignment(), header, &assignment("secret"))
            .await
            .unwrap();

        let delivery = inbox.recv(WAIT).await.unwrap().unwrap();
        assert_eq!(delivery.message, assignment("secret"));
    }

    #[tokio::test]
    async fn test_configured_encryption_applies_to_send() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let config = agent_runtime::AgentConfig {
            encrypt_outbound: true,
            ..agent_config(AGENT, TransportProtocol::Amqp)
        };
        let client = spawn_agent_with(&broker, config);
        checked_in(&orchestrator, &client).await;

        let mut states = orchestrator.subscribe(&client.topics().state()).await;
        client.send(&state_report()).await.unwrap();
        let opened = orchestrator.next_request(&mut states).await.unwrap();
        assert!(opened.header.encrypted);
    }

    #[tokio::test]
    async fn test_yard_visualization_publish() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let route = client.topics().yard_visualization().unwrap();
        let mut yard = orchestrator.subscribe(&route).await;
        let report = AgentMessage::AgentSensor(SensorReport {
            pose: Pose {
                x: 4.0,
                y: 8.5,
                z: 0.0,
                orientations: vec![1.57],
            },
            sensors: Map::new(),
        });
        let sequence = client.publish_to(&route, &report, None, None).await.unwrap();

        let opened = orchestrator.next_request(&mut yard).await.unwrap();
        assert_eq!(opened.message, report);
        assert_eq!(opened.header.sequence_number, sequence);
        assert_eq!(opened.header.session_token.as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn test_reply_follows_reply_route() {
        let broker = InMemoryBroker::new(TransportProtocol::Mqtt);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let key = "orchestrator/replies/as-7";
        let mut replies = orchestrator.subscribe(&client.topics().reply(key)).await;
        let mut inbox = client.inbox().await.unwrap();
        let mut header = orchestrator.header(&AgentId::new(AGENT), Some(TOKEN.into()));
        header.reply_to = Some(key.to_string());
        orchestrator
            .deliver(&client.topics().assignment(), header, &assignment("as-7"))
            .await
            .unwrap();
        let delivery = inbox.recv(WAIT).await.unwrap().unwrap();
        assert_eq!(delivery.reply_to.as_deref(), Some(key));

        client.reply(&delivery, &state_report()).await.unwrap();

        let opened = orchestrator.next_request(&mut replies).await.unwrap();
        assert_eq!(opened.message, state_report());
        assert_eq!(opened.header.correlation_id, delivery.accepted.correlation_id);
        assert_eq!(opened.header.recipient_id, AgentId::orchestrator());
    }

    // =========================================================================
    // ORDERING
    // =========================================================================

    #[tokio::test]
    async fn test_duplicate_sequence_is_dropped() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        // The checkin ack consumed sequence 1.
        let agent_id = AgentId::new(AGENT);
        let route = client.topics().assignment();
        let mut inbox = client.inbox().await.unwrap();
        for (n, sequence) in [2u64, 3, 3, 4].into_iter().enumerate() {
            let header = orchestrator.header_with_sequence(&agent_id, Some(TOKEN.into()), sequence);
            orchestrator
                .deliver(&route, header, &assignment(&format!("as-{n}")))
                .await
                .unwrap();
        }

        assert_eq!(inbox.recv(WAIT).await.unwrap().unwrap().accepted.sequence_number, 2);
        assert_eq!(inbox.recv(WAIT).await.unwrap().unwrap().accepted.sequence_number, 3);
        assert_eq!(
            inbox.recv(WAIT).await,
            Err(AgentError::Rejected(RejectError::Replay {
                sender: AgentId::orchestrator(),
                sequence: 3,
                last_seen: 3,
            }))
        );
        assert_eq!(inbox.recv(WAIT).await.unwrap().unwrap().accepted.sequence_number, 4);
        assert_eq!(client.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_outbound_sequence_strictly_increases() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let mut states = orchestrator.subscribe(&client.topics().state()).await;
        let mut last = 0;
        for _ in 0..5 {
            client.send(&state_report()).await.unwrap();
            let opened = orchestrator.next_request(&mut states).await.unwrap();
            assert!(opened.header.sequence_number > last);
            last = opened.header.sequence_number;
        }
    }

    #[tokio::test]
    async fn test_wrong_session_token_is_dropped() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let mut inbox = client.inbox().await.unwrap();
        let header = orchestrator.header(&AgentId::new(AGENT), Some("previous-session".into()));
        orchestrator
            .deliver(&client.topics().assignment(), header, &assignment("old"))
            .await
            .unwrap();

        assert_eq!(
            inbox.recv(WAIT).await,
            Err(AgentError::Rejected(RejectError::WrongSession))
        );
        assert_eq!(client.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_message_for_other_agent_is_dropped() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let mut inbox = client.inbox().await.unwrap();
        let header = orchestrator.header(&AgentId::new("tug-13"), Some(TOKEN.into()));
        orchestrator
            .deliver(&client.topics().assignment(), header, &assignment("not-mine"))
            .await
            .unwrap();

        assert!(matches!(
            inbox.recv(WAIT).await,
            Err(AgentError::Rejected(RejectError::Misrouted { .. }))
        ));
    }

    // =========================================================================
    // UNKNOWN TYPES
    // =========================================================================

    fn unknown() -> AgentMessage {
        AgentMessage::Unknown {
            message_type: "yard_broadcast".into(),
            body: json!({"lights": "off"}),
        }
    }

    #[tokio::test]
    async fn test_unknown_type_rejected_by_default() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let client = spawn_agent(&broker, AGENT);
        checked_in(&orchestrator, &client).await;

        let mut inbox = client.inbox().await.unwrap();
        let header = orchestrator.header(&AgentId::new(AGENT), Some(TOKEN.into()));
        orchestrator
            .deliver(&client.topics().assignment(), header, &unknown())
            .await
            .unwrap();

        assert_eq!(
            inbox.recv(WAIT).await,
            Err(AgentError::Decode(DecodeError::UnknownType(
                "yard_broadcast".into()
            )))
        );
    }

    #[tokio::test]
    async fn test_unknown_type_passed_through() {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        let config = agent_runtime::AgentConfig {
            unknown_types: UnknownTypePolicy::PassThrough,
            ..agent_config(AGENT, TransportProtocol::Amqp)
        };
        let client = spawn_agent_with(&broker, config);
        checked_in(&orchestrator, &client).await;

        let mut inbox = client.inbox().await.unwrap();
        let header = orchestrator.header(&AgentId::new(AGENT), Some(TOKEN.into()));
        orchestrator
            .deliver(&client.topics().assignment(), header, &unknown())
            .await
            .unwrap();

        let delivery = inbox.recv(WAIT).await.unwrap().unwrap();
        assert_eq!(delivery.message, unknown());
        assert_eq!(delivery.accepted.known_type(), None);
    }
}
