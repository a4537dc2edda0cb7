// tests/integration/lifecycle_tests.rs
use std::time::Duration;

use ssi_gate::agent::types::ConnectionState;
use ssi_gate::core::{services::VerificationRequest, session::SessionStatus};

use crate::common::{advance, finished_proof, pending_proof, unavailable, TestContext};

const TIMEOUT: Duration = Duration::from_secs(600);

fn session_id(request: VerificationRequest) -> String {
    match request {
        VerificationRequest::Started { session_id, .. } => session_id,
        other => panic!("expected a new session, got {:?}", other),
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_verified_subject_is_announced_and_cleaned_up() {
    let ctx = TestContext::new(TIMEOUT);
    ctx.agent.script_connection(
        "Alice",
        vec![Ok(ConnectionState::Pending("request".into())), Ok(ConnectionState::Active)],
    );
    ctx.agent
        .script_proof("Alice", vec![Ok(pending_proof()), Ok(finished_proof(true, "Engineering"))]);

    let request = ctx.service.request_verification("Alice").await.unwrap();
    let id = session_id(request);
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::AwaitingConnection));
    assert_eq!(
        ctx.service.invitation_payload(&id).as_deref(),
        Some("https://agent.example/?oob=conn-Minecraft-Player-Alice")
    );

    advance(Duration::from_millis(6_500)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::ProofRequested));

    advance(Duration::from_secs(6)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::Verified));
    assert!(ctx.registry.contains("Alice"));

    let notices = ctx.sink.notices_for("Alice");
    assert!(notices[0].contains(&format!("http://localhost:8080/invitation/{}", id)));
    assert_eq!(
        notices.iter().filter(|m| m.contains("Department: Engineering")).count(),
        1
    );
    assert!(notices.iter().any(|m| m.contains("verified player benefits")));
    let broadcasts = ctx.sink.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert!(broadcasts[0].contains("Alice"));

    // finished sessions linger for the grace period, then disappear
    advance(Duration::from_secs(29)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::Verified));
    advance(Duration::from_secs(1)).await;
    assert_eq!(ctx.status_of("Alice"), None);
    assert_eq!(ctx.scheduler.active_timers(), 0);
    assert!(ctx.service.invitation_payload(&id).is_none());

    assert_eq!(
        ctx.service.request_verification("Alice").await.unwrap(),
        VerificationRequest::AlreadyVerified
    );
    assert_eq!(ctx.sink.broadcasts().len(), 1);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_rejected_presentation_fails_session() {
    let ctx = TestContext::new(TIMEOUT);
    ctx.agent
        .script_connection("Alice", vec![Ok(ConnectionState::Active)]);
    ctx.agent
        .script_proof("Alice", vec![Ok(finished_proof(false, "Engineering"))]);

    ctx.service.request_verification("Alice").await.unwrap();
    advance(Duration::from_millis(6_500)).await;

    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::Failed));
    assert!(!ctx.registry.contains("Alice"));
    assert!(ctx.sink.broadcasts().is_empty());
    let notices = ctx.sink.notices_for("Alice");
    assert!(notices.last().unwrap().contains("verification failed"));
    assert!(!notices.iter().any(|m| m.contains("Engineering")));

    advance(Duration::from_secs(30)).await;
    assert_eq!(ctx.status_of("Alice"), None);

    // a failed subject may try again
    let retry = ctx.service.request_verification("Alice").await.unwrap();
    assert!(matches!(retry, VerificationRequest::Started { .. }));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_agent_outage_is_retried_silently() {
    let ctx = TestContext::new(TIMEOUT);
    ctx.agent.script_connection(
        "Alice",
        vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok(ConnectionState::Active),
        ],
    );

    ctx.service.request_verification("Alice").await.unwrap();

    advance(Duration::from_millis(10_500)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::AwaitingConnection));
    assert_eq!(ctx.sink.notices_for("Alice").len(), 1);

    advance(Duration::from_secs(2)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::ProofRequested));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_failed_proof_request_is_retried_while_connected() {
    let ctx = TestContext::new(TIMEOUT);
    ctx.agent
        .script_connection("Alice", vec![Ok(ConnectionState::Active)]);
    ctx.agent.script_proof_request(
        "Alice",
        vec![Err(unavailable()), Err(unavailable())],
    );

    ctx.service.request_verification("Alice").await.unwrap();

    advance(Duration::from_millis(6_500)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::Connected));

    advance(Duration::from_secs(3)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::ProofRequested));

    let failures = ctx
        .sink
        .notices_for("Alice")
        .iter()
        .filter(|m| m.contains("Failed to send proof request"))
        .count();
    assert_eq!(failures, 1);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_timeout_notifies_once_and_stops_polling() {
    let ctx = TestContext::new(TIMEOUT);

    let first = session_id(ctx.service.request_verification("Alice").await.unwrap());

    advance(Duration::from_secs(1)).await;
    match ctx.service.request_verification("Alice").await.unwrap() {
        VerificationRequest::InProgress { session_id, invitation_url } => {
            assert_eq!(session_id, first);
            assert!(invitation_url.unwrap().ends_with(&first));
        }
        other => panic!("expected the running session, got {:?}", other),
    }

    advance(Duration::from_secs(598)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::AwaitingConnection));

    advance(Duration::from_secs(2)).await;
    assert_eq!(ctx.status_of("Alice"), None);
    assert!(!ctx.service.status("Alice").verified);
    let timeouts = ctx
        .sink
        .notices_for("Alice")
        .iter()
        .filter(|m| m.contains("timeout"))
        .count();
    assert_eq!(timeouts, 1);

    let calls = ctx.agent.calls_for("Alice");
    advance(Duration::from_secs(60)).await;
    assert_eq!(ctx.agent.calls_for("Alice"), calls);
    assert_eq!(ctx.scheduler.active_timers(), 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_proof_arriving_at_deadline_leaves_nothing_behind() {
    let ctx = TestContext::new(Duration::from_secs(12));
    ctx.agent
        .script_connection("Alice", vec![Ok(ConnectionState::Active)]);
    ctx.agent
        .script_proof("Alice", vec![Ok(finished_proof(true, "Engineering"))]);

    ctx.service.request_verification("Alice").await.unwrap();
    advance(Duration::from_millis(3_500)).await;
    assert_eq!(ctx.status_of("Alice"), Some(SessionStatus::ProofRequested));

    // the proof fetched at 6s answers exactly at the 12s deadline
    ctx.agent.stall("Alice", Duration::from_secs(6));
    advance(Duration::from_secs(40)).await;

    assert_eq!(ctx.store.len(), 0);
    assert_eq!(ctx.scheduler.active_timers(), 0);

    let timeouts = ctx
        .sink
        .notices_for("Alice")
        .iter()
        .filter(|m| m.contains("timeout"))
        .count();
    if ctx.registry.contains("Alice") {
        assert_eq!(timeouts, 0);
        assert_eq!(ctx.sink.broadcasts().len(), 1);
    } else {
        assert_eq!(timeouts, 1);
        assert!(ctx.sink.broadcasts().is_empty());
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_status_only_moves_forward() {
    let ctx = TestContext::new(TIMEOUT);
    ctx.agent.script_connection(
        "Alice",
        vec![Err(unavailable()), Ok(ConnectionState::Active)],
    );
    ctx.agent.script_proof_request("Alice", vec![Err(unavailable())]);
    ctx.agent.script_proof(
        "Alice",
        vec![Err(unavailable()), Ok(pending_proof()), Ok(finished_proof(true, "Sales"))],
    );

    ctx.service.request_verification("Alice").await.unwrap();

    let order = [
        SessionStatus::Initiated,
        SessionStatus::AwaitingConnection,
        SessionStatus::Connected,
        SessionStatus::ProofRequested,
        SessionStatus::Verified,
    ];
    let mut seen = Vec::new();
    for _ in 0..30 {
        if let Some(status) = ctx.status_of("Alice") {
            seen.push(order.iter().position(|s| *s == status).unwrap());
        }
        advance(Duration::from_secs(1)).await;
    }

    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(seen.last().copied(), Some(4));
}

#[tokio::test]
async fn test_invalid_subject_is_rejected() {
    let ctx = TestContext::new(TIMEOUT);
    tokio_test::assert_err!(ctx.service.request_verification("").await);
    tokio_test::assert_err!(ctx.service.request_verification("Alice\nsay hi").await);
    assert!(ctx.store.is_empty());
}
