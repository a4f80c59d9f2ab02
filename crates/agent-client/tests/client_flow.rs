use chrono::Utc;
use greeter_agent_client::{
    AgentClient, ChannelTransport, ClientConfig, ClientError, NotificationSurfaces, ServerEndpoint,
};
use greeter_infra_common::protocol::{
    names, ActiveCall, AgentMarkedAwayPayload, AgentStatus, AwayReason, CallCancelledPayload,
    CallEndReason, CallEndedPayload, CallIncomingPayload, CallRequest, CallStartedPayload,
    RequestId, ServerEvent, StatusAck, VisitorInfo,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

fn client() -> (Arc<AgentClient>, ServerEndpoint) {
    let (transport, server) = ChannelTransport::pair();
    let client = AgentClient::new(
        "agent-1",
        Arc::new(transport),
        NotificationSurfaces::headless(),
        ClientConfig::default(),
    )
    .unwrap();
    (Arc::new(client), server)
}

fn incoming(request_id: &str) -> ServerEvent {
    ServerEvent::CallIncoming(CallIncomingPayload {
        request: CallRequest {
            request_id: request_id.into(),
            visitor_id: "visitor-1".into(),
            agent_id: "agent-1".into(),
            org_id: None,
            page_url: "https://shop.example/pricing".into(),
            requested_at: Utc::now(),
        },
        visitor: VisitorInfo::new("visitor-1", "https://shop.example/pricing"),
    })
}

#[tokio::test(start_paused = true)]
async fn accept_stops_ringing_and_emits_accept() {
    let (client, mut server) = client();

    client.handle_event(incoming("call_1")).await;
    assert!(client.notifier().is_ringing());

    let request_id = client.accept_call().await.unwrap();
    assert_eq!(request_id, RequestId::from("call_1"));
    assert!(!client.notifier().is_ringing());

    let cmd = server.recv().await.unwrap();
    assert_eq!(cmd.event, names::CALL_ACCEPT);
    assert_eq!(cmd.payload["requestId"], "call_1");
    assert!(!cmd.expects_ack());

    let err = client.accept_call().await.unwrap_err();
    assert!(matches!(err, ClientError::NoIncomingCall { .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_and_forced_away_stop_ringing() {
    let (client, _server) = client();

    client.handle_event(incoming("call_1")).await;
    client
        .handle_event(ServerEvent::CallCancelled(CallCancelledPayload {
            request_id: "call_1".into(),
            reason: None,
        }))
        .await;
    assert!(!client.notifier().is_ringing());

    client.handle_event(incoming("call_2")).await;
    client
        .handle_event(ServerEvent::AgentMarkedAway(AgentMarkedAwayPayload {
            reason: AwayReason::RingNoAnswer,
            message: "You've been marked as Away because you didn't answer an incoming call."
                .into(),
        }))
        .await;

    let presence = client.presence();
    assert!(!client.notifier().is_ringing());
    assert_eq!(presence.incoming_call, None);
    assert!(presence.is_marked_away);
    assert!(!client.idle_timer().is_enabled());
}

#[tokio::test(start_paused = true)]
async fn call_lifecycle_updates_presence() {
    let (client, _server) = client();

    client.handle_event(incoming("call_1")).await;
    client
        .handle_event(ServerEvent::CallStarted(CallStartedPayload {
            call: ActiveCall {
                call_id: "active_1".into(),
                request_id: "call_1".into(),
                visitor_id: "visitor-1".into(),
                agent_id: "agent-1".into(),
                started_at: Utc::now(),
                ended_at: None,
                recording_id: None,
            },
        }))
        .await;
    assert_eq!(client.presence().status, AgentStatus::InCall);
    assert!(!client.notifier().is_ringing());

    client
        .handle_event(ServerEvent::CallEnded(CallEndedPayload {
            call_id: "active_1".into(),
            reason: CallEndReason::VisitorEnded,
            message: None,
        }))
        .await;
    let presence = client.presence();
    assert_eq!(presence.status, AgentStatus::Idle);
    assert_eq!(presence.active_call, None);
    assert!(client.idle_timer().is_enabled());
}

#[tokio::test(start_paused = true)]
async fn inactivity_marks_agent_away() {
    let (client, mut server) = client();
    tokio::spawn(async move {
        while let Some(cmd) = server.recv().await {
            assert_eq!(cmd.event, names::AGENT_AWAY);
            assert_eq!(cmd.payload["reason"], "idle");
            cmd.acknowledge(StatusAck::ok(AgentStatus::Away));
        }
    });

    let (_tx, rx) = mpsc::channel(8);
    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run(rx).await })
    };

    tokio::time::sleep(Duration::from_secs(301)).await;

    let presence = client.presence();
    assert!(presence.is_marked_away);
    assert_eq!(
        presence.away_reason.as_deref(),
        Some("You were marked away due to inactivity")
    );
    assert!(!presence.sync_pending);
    runner.abort();
}

#[tokio::test(start_paused = true)]
async fn events_flow_while_an_idle_away_retries() {
    let (transport, mut server) = ChannelTransport::pair();
    let config = ClientConfig {
        idle_timeout_ms: 1000,
        ..ClientConfig::default()
    };
    let client = Arc::new(
        AgentClient::new("agent-1", Arc::new(transport), NotificationSurfaces::headless(), config)
            .unwrap(),
    );
    // The server never acknowledges anything.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Some(cmd) = server.recv().await {
            held.push(cmd);
        }
    });

    let (tx, rx) = mpsc::channel(8);
    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run(rx).await })
    };

    tx.send(incoming("call_1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.notifier().is_ringing());

    // Idle fires at 1s and the away starts waiting on its ack.
    tokio::time::sleep(Duration::from_millis(1400)).await;
    assert!(!client.presence().is_marked_away);

    tx.send(ServerEvent::CallCancelled(CallCancelledPayload {
        request_id: "call_1".into(),
        reason: Some("cancelled".into()),
    }))
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!client.notifier().is_ringing());
    assert_eq!(client.presence().incoming_call, None);

    // The away lands once retries run out.
    tokio::time::sleep(Duration::from_secs(30)).await;
    let presence = client.presence();
    assert!(presence.is_marked_away);
    assert!(presence.sync_pending);
    runner.abort();
}

#[tokio::test(start_paused = true)]
async fn removal_mid_call_takes_the_client_offline() {
    let (client, _server) = client();
    client
        .handle_event(ServerEvent::CallStarted(CallStartedPayload {
            call: ActiveCall {
                call_id: "active_1".into(),
                request_id: "call_1".into(),
                visitor_id: "visitor-1".into(),
                agent_id: "agent-1".into(),
                started_at: Utc::now(),
                ended_at: None,
                recording_id: None,
            },
        }))
        .await;

    client
        .handle_event(ServerEvent::CallEnded(CallEndedPayload {
            call_id: "active_1".into(),
            reason: CallEndReason::AgentDeactivated,
            message: Some("The agent is no longer available".into()),
        }))
        .await;

    let presence = client.presence();
    assert_eq!(presence.status, AgentStatus::Offline);
    assert_eq!(presence.active_call, None);
    assert!(!client.idle_timer().is_enabled());
}

#[tokio::test(start_paused = true)]
async fn presence_updates_stream_snapshots() {
    let (client, _server) = client();
    let mut updates = client.presence_updates();
    assert_eq!(updates.next().await.unwrap().status, AgentStatus::Idle);

    client
        .handle_event(ServerEvent::AgentMarkedAway(AgentMarkedAwayPayload {
            reason: AwayReason::RingNoAnswer,
            message: "You've been marked as Away".into(),
        }))
        .await;

    let snapshot = updates.next().await.unwrap();
    assert_eq!(snapshot.status, AgentStatus::Away);
    assert!(snapshot.is_marked_away);
    assert_eq!(snapshot.away_reason.as_deref(), Some("You've been marked as Away"));
}
