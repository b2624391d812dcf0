//! # Session Lifecycle Flows
//!
//! Drives a real [`AgentClient`](agent_runtime::AgentClient) through checkin
//! and checkout against the scripted orchestrator.
//!
//! ## Flows Tested:
//!
//! 1. **Checkin**: key discovery, session token, yard routes
//! 2. **Refusal**: non-success ack and caller veto
//! 3. **Stale acks**: an ack for another attempt is ignored and leaves no trace
//! 4. **Checkout**: confirmed, unanswered, cancelled and abandoned
//! 5. **Transport loss**: a closed broker ends the session

#[cfg(test)]
mod tests {
    use crate::integration::harness::{agent_config, spawn_agent, spawn_agent_with, Orchestrator};
    use agent_runtime::{AgentClient, AgentError, Opened};
    use agent_transport::{InMemoryBroker, Subscription, TransportProtocol};
    use agent_types::{
        AgentId, AgentMessage, AgentStatus, CheckinAck, CheckoutAck, RESPONSE_CODE_OK,
    };
    use sdk_02_session_manager::{RejectError, SessionManagerApi, SessionState};
    use serde_json::{json, Map};
    use std::time::Duration;
    use uuid::Uuid;

    const AGENT: &str = "forklift-7";

    fn setup() -> (InMemoryBroker, Orchestrator) {
        let broker = InMemoryBroker::new(TransportProtocol::Amqp);
        let orchestrator = Orchestrator::new(broker.clone());
        (broker, orchestrator)
    }

    // =========================================================================
    // CHECKIN
    // =========================================================================

    #[tokio::test]
    async fn test_checkin_activates_session() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let mut agent_data = Map::new();
        agent_data.insert("model".into(), json!("AGV-300"));

        let (ack, request) = tokio::join!(
            client.checkin(AgentStatus::Free, agent_data.clone()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        let ack = ack.unwrap();
        let request = request.unwrap();

        assert!(ack.is_accepted());
        assert_eq!(request.checkin_id, ack.checkin_id);
        assert_eq!(request.yard_uid, "yard_A");
        assert_eq!(request.agent_data, agent_data);
        assert_eq!(request.public_keys, client.pipeline().crypto().public_keys().unwrap());

        assert_eq!(client.state(), SessionState::Active);
        assert_eq!(client.session().session_token(), Some("sess-1".to_string()));
        assert_eq!(client.topics().yard_uid(), Some("yard_A"));
        assert!(client.topics().yard_update().is_some());
    }

    #[tokio::test]
    async fn test_checkin_exchanges_keys_both_ways() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        assert!(client
            .pipeline()
            .crypto()
            .peer_keys(&AgentId::orchestrator())
            .is_none());

        let (ack, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        ack.unwrap();

        assert_eq!(
            client.pipeline().crypto().peer_keys(&AgentId::orchestrator()),
            Some(orchestrator.public_keys())
        );
        assert!(orchestrator.knows(&AgentId::new(AGENT)));
    }

    #[tokio::test]
    async fn test_refused_checkin_stays_disconnected() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let (result, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, "403", None),
        );

        assert_eq!(
            result,
            Err(AgentError::CheckinRefused {
                code: "403".into(),
                message: "checkin refused".into(),
            })
        );
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.topics().yard_uid(), None);
    }

    #[tokio::test]
    async fn test_checkin_guard_veto() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT)
            .with_checkin_guard(|ack: &CheckinAck| ack.session_token.is_some());
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let (result, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, None),
        );

        assert!(matches!(result, Err(AgentError::CheckinRefused { .. })));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stale_ack_is_ignored() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let script = async {
            let opened = orchestrator.next_request(&mut requests).await?;
            let AgentMessage::Checkin(request) = &opened.message else {
                panic!("expected checkin");
            };

            let mut stale = orchestrator.checkin_ack(request, RESPONSE_CODE_OK, Some("old"));
            stale.checkin_id = Uuid::new_v4();
            orchestrator
                .reply(&topics, &opened, &AgentMessage::CheckinAck(stale))
                .await?;

            let fresh = orchestrator.checkin_ack(request, RESPONSE_CODE_OK, Some("new"));
            orchestrator
                .reply(&topics, &opened, &AgentMessage::CheckinAck(fresh))
                .await
        };

        let (ack, scripted) = tokio::join!(client.checkin(AgentStatus::Free, Map::new()), script);
        scripted.unwrap();

        assert_eq!(ack.unwrap().session_token.as_deref(), Some("new"));
        assert_eq!(client.session().session_token(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_discarded_ack_does_not_consume_sequence() {
        let (broker, orchestrator) = setup();
        let impostor = Orchestrator::with_identity(broker.clone(), AgentId::orchestrator());
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let script = async {
            let opened = orchestrator.next_request(&mut requests).await?;
            let AgentMessage::Checkin(request) = &opened.message else {
                panic!("expected checkin");
            };

            // Self-signed ack for some other attempt, numbered far ahead.
            let mut stale = impostor.checkin_ack(request, RESPONSE_CODE_OK, Some("forged"));
            stale.checkin_id = Uuid::new_v4();
            let mut header = impostor.header_with_sequence(
                &AgentId::new(AGENT),
                opened.header.session_token.clone(),
                1_000_000,
            );
            header.correlation_id = opened.header.correlation_id;
            impostor
                .deliver(&topics.checkin_response(), header, &AgentMessage::CheckinAck(stale))
                .await?;

            let fresh = orchestrator.checkin_ack(request, RESPONSE_CODE_OK, Some("sess-1"));
            orchestrator
                .reply(&topics, &opened, &AgentMessage::CheckinAck(fresh))
                .await
        };

        let (ack, scripted) = tokio::join!(client.checkin(AgentStatus::Free, Map::new()), script);
        scripted.unwrap();

        assert_eq!(ack.unwrap().session_token.as_deref(), Some("sess-1"));
        assert_eq!(client.state(), SessionState::Active);
        assert_eq!(
            client.pipeline().crypto().peer_keys(&AgentId::orchestrator()),
            Some(orchestrator.public_keys())
        );
    }

    #[tokio::test]
    async fn test_unanswered_checkin_times_out() {
        let (broker, orchestrator) = setup();
        let config = agent_config(AGENT, TransportProtocol::Amqp);
        let config = agent_runtime::AgentConfig {
            checkin_timeout: Duration::from_millis(50),
            ..config
        };
        let client = spawn_agent_with(&broker, config);
        let mut requests = orchestrator.listen(&client.topics()).await;

        let (result, request) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.next_request(&mut requests),
        );

        assert!(request.is_ok());
        assert!(matches!(
            result,
            Err(AgentError::TransportTimeout {
                operation: "checkin",
                ..
            })
        ));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_checkin_twice_is_refused() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let (ack, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        ack.unwrap();

        assert!(matches!(
            client.checkin(AgentStatus::Free, Map::new()).await,
            Err(AgentError::Session(_))
        ));
        assert_eq!(client.state(), SessionState::Active);
    }

    // =========================================================================
    // CHECKOUT
    // =========================================================================

    #[tokio::test]
    async fn test_checkout_after_checkin() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let (ack, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        ack.unwrap();

        let (ack, request) = tokio::join!(
            client.checkout(Some("end of shift".into())),
            orchestrator.serve_checkout(&mut requests, &topics),
        );

        assert_eq!(ack.unwrap().response_code, RESPONSE_CODE_OK);
        let request = request.unwrap();
        assert_eq!(request.header.session_token, Some("sess-1".to_string()));
        assert!(matches!(request.message, AgentMessage::Checkout(ref c) if c.reason.as_deref() == Some("end of shift")));
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.session().session_token(), None);
    }

    #[tokio::test]
    async fn test_unanswered_checkout_still_disconnects() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let (ack, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        ack.unwrap();

        let result = client.checkout(None).await;
        assert!(matches!(
            result,
            Err(AgentError::TransportTimeout {
                operation: "checkout",
                ..
            })
        ));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    async fn checked_in(
        orchestrator: &Orchestrator,
        client: &AgentClient<InMemoryBroker>,
    ) -> Subscription {
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;
        let (ack, served) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        ack.unwrap();
        served.unwrap();
        requests
    }

    /// Confirmation for `request` as it would arrive after the agent gave up.
    fn late_checkout_ack(orchestrator: &Orchestrator, request: &Opened) -> Vec<u8> {
        let mut header = orchestrator.header(
            &request.header.sender_id,
            request.header.session_token.clone(),
        );
        header.correlation_id = request.header.correlation_id;
        let ack = AgentMessage::CheckoutAck(CheckoutAck {
            response_code: RESPONSE_CODE_OK.to_string(),
            message: None,
        });
        orchestrator.pipeline().seal(header, &ack).unwrap()
    }

    #[tokio::test]
    async fn test_cancel_during_checkout() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let mut requests = checked_in(&orchestrator, &client).await;

        let script = async {
            let opened = orchestrator.next_request(&mut requests).await.unwrap();
            assert_eq!(client.state(), SessionState::CheckingOut);
            assert!(client.cancel());
            opened
        };
        let (result, request) = tokio::join!(client.checkout(None), script);

        assert_eq!(result, Err(AgentError::Cancelled));
        assert_eq!(client.state(), SessionState::Disconnected);

        let late = late_checkout_ack(&orchestrator, &request);
        assert_eq!(
            client.receive(&late),
            Err(AgentError::Rejected(RejectError::WrongSession))
        );
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_abandoned_checkout_disconnects() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let mut requests = checked_in(&orchestrator, &client).await;

        {
            let checkout = client.checkout(Some("power loss".into()));
            let _ = tokio::time::timeout(Duration::from_millis(10), checkout).await;
        }
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.session().session_token(), None);

        let request = orchestrator.next_request(&mut requests).await.unwrap();
        assert!(matches!(request.message, AgentMessage::Checkout(_)));
        let late = late_checkout_ack(&orchestrator, &request);
        assert_eq!(
            client.receive(&late),
            Err(AgentError::Rejected(RejectError::WrongSession))
        );
    }

    #[tokio::test]
    async fn test_checkout_without_session_is_refused() {
        let (broker, _) = setup();
        let client = spawn_agent(&broker, AGENT);
        assert!(matches!(
            client.checkout(None).await,
            Err(AgentError::Session(_))
        ));
    }

    // =========================================================================
    // TRANSPORT LOSS
    // =========================================================================

    #[tokio::test]
    async fn test_broker_close_ends_session() {
        let (broker, orchestrator) = setup();
        let client = spawn_agent(&broker, AGENT);
        let topics = client.topics();
        let mut requests = orchestrator.listen(&topics).await;

        let (ack, _) = tokio::join!(
            client.checkin(AgentStatus::Free, Map::new()),
            orchestrator.serve_checkin(&mut requests, &topics, RESPONSE_CODE_OK, Some("sess-1")),
        );
        ack.unwrap();

        let mut inbox = client.inbox().await.unwrap();
        broker.close();

        assert_eq!(inbox.recv(Duration::from_millis(200)).await, Ok(None));
        assert_eq!(client.state(), SessionState::Disconnected);
    }
}
