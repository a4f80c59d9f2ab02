//! Call lifecycle tests for the coordinator
//!
//! Every test runs on a paused clock, so offer timeouts are driven by
//! `tokio::time::sleep` without waiting in real time.

use async_trait::async_trait;
use greeter_call_engine::prelude::*;
use greeter_infra_common::protocol::{
    ActiveCall, AgentId, AgentStatus, AwayReason, CallEndReason, CallRequestPayload,
    ReassignReason, ServerEvent, VisitorEvent, VisitorId, VisitorJoinPayload,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

const PRICING: &str = "https://shop.example/pricing";

struct Harness {
    gateway: Arc<ChannelGateway>,
    coordinator: Arc<CallCoordinator>,
    handler: CommandHandler,
}

fn harness() -> Harness {
    let gateway = Arc::new(ChannelGateway::new(32));
    let coordinator = CallCoordinator::new(CallCenterConfig::default(), gateway.clone()).unwrap();

    let pools = coordinator.pools();
    pools.add_pool(Pool::new("sales", "Sales").with_org("org-1")).unwrap();
    pools.add_pool(Pool::catch_all("everyone", "Everyone").with_org("org-1")).unwrap();
    coordinator.resolver().upsert_site(
        SiteConfig::new("site-1")
            .with_org("org-1")
            .with_rule(PathRule::new("/pricing/**", "sales", 10)),
    );

    let handler = CommandHandler::new(coordinator.clone());
    Harness {
        gateway,
        coordinator,
        handler,
    }
}

impl Harness {
    fn agent(&self, id: &str, pool: &str, rank: u32) -> Receiver<ServerEvent> {
        let agent_id = AgentId::from(id);
        self.coordinator
            .register_agent(Agent::new(id, id).with_org("org-1"))
            .unwrap();
        self.coordinator
            .pools()
            .add_member(&pool.into(), &agent_id, rank)
            .unwrap();
        let rx = self.gateway.connect_agent(id);
        self.coordinator.registry().login(&agent_id).unwrap();
        rx
    }

    async fn request(&self, visitor: &str) -> RequestTicket {
        self.coordinator
            .request_call(CallRequestPayload {
                visitor_id: visitor.into(),
                site_id: "site-1".into(),
                page_url: PRICING.to_string(),
                org_id: None,
                location: None,
            })
            .await
            .unwrap()
    }

    async fn join(&self, visitor: &str) -> Option<AgentId> {
        self.coordinator
            .assign_visitor(VisitorJoinPayload {
                visitor_id: visitor.into(),
                site_id: "site-1".into(),
                page_url: PRICING.to_string(),
            })
            .await
            .unwrap()
    }

    fn status(&self, id: &str) -> AgentStatus {
        self.coordinator.registry().status(&id.into()).unwrap()
    }
}

fn drain<T>(rx: &mut Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn names(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}

fn offered(agent: &str) -> CallRequestState {
    CallRequestState::Offered {
        agent_id: agent.into(),
    }
}

#[tokio::test(start_paused = true)]
async fn offer_timeout_moves_to_the_next_tier() {
    let h = harness();
    let mut primary = h.agent("primary", "sales", 1);
    let mut standard = h.agent("standard", "sales", 2);
    let mut visitor = h.gateway.connect_visitor("visitor-1");

    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, offered("primary"));
    assert_eq!(names(&drain(&mut primary)), vec!["call:incoming"]);
    assert!(drain(&mut standard).is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;

    let events = drain(&mut primary);
    assert_eq!(names(&events), vec!["call:cancelled", "agent:marked_away"]);
    match &events[1] {
        ServerEvent::AgentMarkedAway(payload) => {
            assert_eq!(payload.reason, AwayReason::RingNoAnswer);
            assert_eq!(
                payload.message,
                "You've been marked as Away because you didn't answer an incoming call."
            );
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(h.status("primary"), AgentStatus::Away);

    assert_eq!(names(&drain(&mut standard)), vec!["call:incoming"]);
    let snapshot = h.coordinator.request(&ticket.request_id).unwrap();
    assert_eq!(snapshot.state, offered("standard"));
    assert_eq!(snapshot.attempts[0].outcome, Some(OfferOutcome::TimedOut));

    let call = h
        .coordinator
        .accept(&"standard".into(), &ticket.request_id)
        .await
        .unwrap();
    assert_eq!(h.status("standard"), AgentStatus::InCall);
    assert_eq!(names(&drain(&mut standard)), vec!["call:started"]);
    match drain(&mut visitor).as_slice() {
        [VisitorEvent::CallAccepted(accepted)] => {
            assert_eq!(accepted.call_id, call.call_id);
            assert_eq!(accepted.agent_id, AgentId::from("standard"));
        }
        other => panic!("unexpected visitor events {:?}", other),
    }

    // The accepted offer's timer must not fire later.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(drain(&mut standard).is_empty());
    assert_eq!(h.status("standard"), AgentStatus::InCall);

    let stats = h.coordinator.stats();
    assert_eq!(stats.offers, 2);
    assert_eq!(stats.offer_timeouts, 1);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.active_calls, 1);
    assert_eq!(stats.pending_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn reject_offers_the_next_candidate() {
    let h = harness();
    let mut first = h.agent("first", "sales", 1);
    let mut second = h.agent("second", "sales", 1);

    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, offered("first"));

    let state = h
        .coordinator
        .reject(&"first".into(), &ticket.request_id, Some("busy".into()))
        .await
        .unwrap();
    assert_eq!(state, offered("second"));

    assert_eq!(names(&drain(&mut first)), vec!["call:incoming", "call:cancelled"]);
    assert_eq!(names(&drain(&mut second)), vec!["call:incoming"]);
    // Rejecting is not a no-answer, so the agent stays available.
    assert_eq!(h.status("first"), AgentStatus::Idle);

    let err = h
        .coordinator
        .reject(&"first".into(), &ticket.request_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CallCenterError::Orchestration(_)));
    assert!(h
        .coordinator
        .accept(&"first".into(), &ticket.request_id)
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn nobody_available_reports_to_the_visitor() {
    let h = harness();
    let mut visitor = h.gateway.connect_visitor("visitor-1");

    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, CallRequestState::TimedOut);
    match drain(&mut visitor).as_slice() {
        [VisitorEvent::AgentUnavailable(payload)] => {
            assert_eq!(payload.request_id, Some(ticket.request_id.clone()));
            assert_eq!(payload.message, "No agents are available right now");
        }
        other => panic!("unexpected visitor events {:?}", other),
    }
    assert_eq!(h.coordinator.stats().unavailable, 1);
    assert!(h.coordinator.request(&ticket.request_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn every_candidate_timing_out_exhausts_the_request() {
    let h = harness();
    let _a = h.agent("a", "sales", 1);
    let _b = h.agent("b", "sales", 3);
    let mut visitor = h.gateway.connect_visitor("visitor-1");

    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, offered("a"));

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(h.status("a"), AgentStatus::Away);
    assert_eq!(h.status("b"), AgentStatus::Away);
    assert!(matches!(
        drain(&mut visitor).as_slice(),
        [VisitorEvent::AgentUnavailable(_)]
    ));
    assert_eq!(h.coordinator.stats().offer_timeouts, 2);
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_the_catch_all_pool() {
    let h = harness();
    let _sales = h.agent("sales-1", "sales", 1);
    let mut general = h.agent("general-1", "everyone", 1);
    h.coordinator
        .set_agent_away(&"sales-1".into(), AwayReason::Manual)
        .await;

    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, offered("general-1"));
    assert_eq!(names(&drain(&mut general)), vec!["call:incoming"]);
}

#[tokio::test(start_paused = true)]
async fn stale_candidates_are_skipped() {
    let h = harness();
    let mut a = h.agent("a", "sales", 1);
    let mut b = h.agent("b", "sales", 1);
    let _visitor1 = h.gateway.connect_visitor("visitor-1");
    let mut visitor2 = h.gateway.connect_visitor("visitor-2");

    // First request ranks [a, b] and rings a.
    let first = h.request("visitor-1").await;
    assert_eq!(first.state, offered("a"));
    // Second request only sees b.
    let second = h.request("visitor-2").await;
    assert_eq!(second.state, offered("b"));

    // a rejects the first request; b is next on its stale list but ringing.
    let state = h
        .coordinator
        .reject(&"a".into(), &first.request_id, None)
        .await
        .unwrap();
    assert_eq!(state, CallRequestState::TimedOut);
    assert_eq!(h.coordinator.stats().stale_skips, 1);

    // b still holds exactly one offer, for the second request.
    assert_eq!(
        h.coordinator.registry().pending_offer(&"b".into()),
        Some(second.request_id.clone())
    );
    assert_eq!(names(&drain(&mut b)), vec!["call:incoming"]);
    assert_eq!(names(&drain(&mut a)), vec!["call:incoming", "call:cancelled"]);
    assert!(drain(&mut visitor2).is_empty());
}

#[tokio::test(start_paused = true)]
async fn visitor_cancel_stops_the_offer() {
    let h = harness();
    let mut agent = h.agent("a", "sales", 1);

    let ticket = h.request("visitor-1").await;
    let err = h
        .coordinator
        .cancel(&"someone-else".into(), &ticket.request_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CallCenterError::Validation(_)));

    h.coordinator
        .cancel(&"visitor-1".into(), &ticket.request_id)
        .await
        .unwrap();

    let events = drain(&mut agent);
    assert_eq!(names(&events), vec!["call:incoming", "call:cancelled"]);
    assert_eq!(h.coordinator.registry().pending_offer(&"a".into()), None);
    assert!(h.coordinator.registry().is_eligible(&"a".into()));

    // The cancelled offer's timer is gone too.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.status("a"), AgentStatus::Idle);
    assert_eq!(h.coordinator.stats().cancelled, 1);

    let err = h
        .coordinator
        .cancel(&"visitor-1".into(), &ticket.request_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CallCenterError::NotFound(_)));
}

/// Holds `call:incoming` back for a moment so a cancel can land mid-send.
struct SlowOffers {
    inner: Arc<ChannelGateway>,
}

#[async_trait]
impl SignalingGateway for SlowOffers {
    async fn send_to_agent(&self, agent_id: &AgentId, event: ServerEvent) -> Result<()> {
        if matches!(event, ServerEvent::CallIncoming(_)) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.inner.send_to_agent(agent_id, event).await
    }

    async fn send_to_visitor(&self, visitor_id: &VisitorId, event: VisitorEvent) -> Result<()> {
        self.inner.send_to_visitor(visitor_id, event).await
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_during_offer_delivery_still_stops_the_agent() {
    let inner = Arc::new(ChannelGateway::new(32));
    let gateway = Arc::new(SlowOffers {
        inner: inner.clone(),
    });
    let coordinator = CallCoordinator::new(CallCenterConfig::default(), gateway).unwrap();
    coordinator.pools().add_pool(Pool::new("sales", "Sales")).unwrap();
    coordinator
        .resolver()
        .upsert_site(SiteConfig::new("site-1").with_default_pool("sales"));
    let a1 = AgentId::from("a1");
    coordinator.register_agent(Agent::new("a1", "Alice")).unwrap();
    coordinator.pools().add_member(&"sales".into(), &a1, 1).unwrap();
    let mut agent = inner.connect_agent("a1");
    coordinator.registry().login(&a1).unwrap();

    let requesting = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .request_call(CallRequestPayload {
                    visitor_id: "visitor-1".into(),
                    site_id: "site-1".into(),
                    page_url: PRICING.to_string(),
                    org_id: None,
                    location: None,
                })
                .await
                .unwrap()
        }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    let request_id = coordinator.registry().pending_offer(&a1).expect("offer reserved");
    coordinator
        .cancel(&"visitor-1".into(), &request_id)
        .await
        .unwrap();

    let ticket = requesting.await.unwrap();
    assert_eq!(ticket.request_id, request_id);
    assert_eq!(ticket.state, CallRequestState::Cancelled);

    // The offer overtook the first cancel, so the agent hears it twice.
    assert_eq!(
        names(&drain(&mut agent)),
        vec!["call:cancelled", "call:incoming", "call:cancelled"]
    );
    assert_eq!(coordinator.registry().pending_offer(&a1), None);
    assert!(coordinator.registry().is_eligible(&a1));
}

#[tokio::test(start_paused = true)]
async fn forced_away_mid_call_keeps_the_call() {
    let h = harness();
    let mut agent = h.agent("a", "sales", 1);
    let ticket = h.request("visitor-1").await;
    let call = h
        .coordinator
        .accept(&"a".into(), &ticket.request_id)
        .await
        .unwrap();
    drain(&mut agent);

    let ack = h
        .coordinator
        .set_agent_away(&"a".into(), AwayReason::Manual)
        .await;
    assert!(ack.success);
    assert_eq!(h.status("a"), AgentStatus::Away);
    assert!(h.coordinator.active_call(&call.call_id).is_some());

    let ack = h.coordinator.set_agent_back(&"a".into());
    assert_eq!(ack.status, Some(AgentStatus::InCall));
}

#[tokio::test(start_paused = true)]
async fn removing_an_agent_mid_call_ends_the_call() {
    let h = harness();
    let mut agent = h.agent("a", "sales", 1);
    let mut visitor = h.gateway.connect_visitor("visitor-1");

    let ticket = h.request("visitor-1").await;
    let call = h
        .coordinator
        .accept(&"a".into(), &ticket.request_id)
        .await
        .unwrap();
    drain(&mut agent);
    drain(&mut visitor);

    let before = h.coordinator.remove_agent(&"a".into()).await.unwrap();
    assert_eq!(before.active_call, Some(call.call_id.clone()));

    match drain(&mut visitor).as_slice() {
        [VisitorEvent::CallEnded(ended)] => {
            assert_eq!(ended.call_id, call.call_id);
            assert_eq!(ended.reason, CallEndReason::AgentDeactivated);
            assert!(ended.message.is_some());
        }
        other => panic!("unexpected visitor events {:?}", other),
    }
    assert_eq!(names(&drain(&mut agent)), vec!["call:ended"]);

    let record = h.coordinator.registry().get(&"a".into()).unwrap();
    assert!(!record.is_active);
    assert_eq!(record.status, AgentStatus::Offline);
    assert!(h.coordinator.pools().memberships_for(&"a".into()).is_empty());
    assert!(h.coordinator.active_call(&call.call_id).is_none());
    assert_eq!(h.coordinator.stats().forced_terminations, 1);
}

#[tokio::test(start_paused = true)]
async fn removing_a_ringing_agent_reroutes_the_offer() {
    let h = harness();
    let mut a = h.agent("a", "sales", 1);
    let mut b = h.agent("b", "sales", 2);

    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, offered("a"));

    h.coordinator.remove_agent(&"a".into()).await.unwrap();
    assert_eq!(names(&drain(&mut a)), vec!["call:incoming", "call:cancelled"]);
    assert_eq!(names(&drain(&mut b)), vec!["call:incoming"]);
    assert_eq!(
        h.coordinator.request(&ticket.request_id).unwrap().state,
        offered("b")
    );
}

#[tokio::test(start_paused = true)]
async fn agent_commands_through_the_handler() {
    let h = harness();
    let mut a = h.agent("a", "sales", 1);
    let mut b = h.agent("b", "sales", 2);
    let mut visitor = h.gateway.connect_visitor("visitor-1");

    let ack = h
        .handler
        .handle(&"a".into(), "agent:away", json!({ "reason": "sleeping" }))
        .await
        .unwrap();
    assert!(!ack.success);
    assert!(ack.error.is_some());

    let ticket = h
        .handler
        .handle_visitor(
            &"visitor-1".into(),
            "call:request",
            json!({ "visitorId": "visitor-1", "siteId": "site-1", "pageUrl": PRICING }),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.state, offered("a"));

    // Going away while ringing hands the offer to the next agent.
    let ack = h
        .handler
        .handle(&"a".into(), "agent:away", json!({ "reason": "manual" }))
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(ack.status, Some(AgentStatus::Away));
    assert_eq!(names(&drain(&mut a)), vec!["call:incoming", "call:cancelled"]);

    let none = h
        .handler
        .handle(
            &"b".into(),
            "call:accept",
            json!({ "requestId": ticket.request_id.as_str() }),
        )
        .await;
    assert!(none.is_none());
    let events = drain(&mut b);
    assert_eq!(names(&events), vec!["call:incoming", "call:started"]);
    let call_id = match &events[1] {
        ServerEvent::CallStarted(started) => started.call.call_id.clone(),
        other => panic!("unexpected event {:?}", other),
    };

    h.handler
        .handle_visitor(
            &"visitor-1".into(),
            "call:end",
            json!({ "callId": call_id.as_str() }),
        )
        .await
        .unwrap();
    assert_eq!(names(&drain(&mut b)), vec!["call:ended"]);
    assert_eq!(h.status("b"), AgentStatus::Idle);
    assert!(matches!(
        drain(&mut visitor).as_slice(),
        [VisitorEvent::CallAccepted(_), VisitorEvent::CallEnded(_)]
    ));

    let ack = h
        .handler
        .handle(&"a".into(), "agent:back", json!(null))
        .await
        .unwrap();
    assert_eq!(ack.status, Some(AgentStatus::Idle));
}

struct FixedRecording;

#[async_trait]
impl RecordingHook for FixedRecording {
    async fn start_recording(&self, call: &ActiveCall) -> Result<Option<String>> {
        Ok(Some(format!("rec-{}", call.agent_id)))
    }
}

#[tokio::test(start_paused = true)]
async fn accepted_calls_carry_the_recording_id() {
    let h = harness();
    h.coordinator.set_recording_hook(Arc::new(FixedRecording));
    let _agent = h.agent("a", "sales", 1);

    let ticket = h.request("visitor-1").await;
    let call = h
        .coordinator
        .accept(&"a".into(), &ticket.request_id)
        .await
        .unwrap();
    assert_eq!(call.recording_id.as_deref(), Some("rec-a"));
    assert_eq!(
        h.coordinator
            .active_call(&call.call_id)
            .unwrap()
            .recording_id
            .as_deref(),
        Some("rec-a")
    );
}

#[tokio::test(start_paused = true)]
async fn login_restores_server_side_away() {
    let h = harness();
    let mut agent = h.agent("a", "sales", 1);
    h.coordinator
        .set_agent_away(&"a".into(), AwayReason::Idle)
        .await;

    let login = h.coordinator.login(&"a".into()).await.unwrap();
    assert_eq!(login.status, AgentStatus::Away);
    assert_eq!(names(&drain(&mut agent)), vec!["login:success"]);
}

#[tokio::test(start_paused = true)]
async fn accepting_a_call_moves_the_other_visitors() {
    let h = harness();
    let _a = h.agent("a", "sales", 1);
    let _b = h.agent("b", "sales", 2);
    let mut caller = h.gateway.connect_visitor("caller");
    let mut watcher = h.gateway.connect_visitor("watcher");

    assert_eq!(h.join("caller").await, Some("a".into()));
    assert_eq!(h.join("watcher").await, Some("a".into()));
    assert_eq!(h.status("a"), AgentStatus::InSimulation);
    assert!(matches!(
        drain(&mut watcher).as_slice(),
        [VisitorEvent::AgentAssigned(p)] if p.agent_id == AgentId::from("a")
    ));
    drain(&mut caller);

    let ticket = h.request("caller").await;
    assert_eq!(ticket.state, offered("a"));
    h.coordinator
        .accept(&"a".into(), &ticket.request_id)
        .await
        .unwrap();

    match drain(&mut watcher).as_slice() {
        [VisitorEvent::AgentReassigned(moved)] => {
            assert_eq!(moved.previous_agent_id, AgentId::from("a"));
            assert_eq!(moved.new_agent_id, AgentId::from("b"));
            assert_eq!(moved.reason, ReassignReason::AgentBusy);
        }
        other => panic!("unexpected visitor events {:?}", other),
    }
    assert!(matches!(
        drain(&mut caller).as_slice(),
        [VisitorEvent::CallAccepted(_)]
    ));

    let a = h.coordinator.registry().get(&"a".into()).unwrap();
    assert_eq!(a.simulations, vec![VisitorId::from("caller")]);
    assert_eq!(h.status("b"), AgentStatus::InSimulation);
    assert_eq!(
        h.coordinator.visitor_assignment(&"watcher".into()).unwrap().agent_id,
        Some("b".into())
    );
    assert_eq!(h.coordinator.stats().visitors_reassigned, 1);
}

#[tokio::test(start_paused = true)]
async fn a_full_greeting_slate_skips_the_agent_for_calls() {
    let h = harness();
    h.coordinator
        .register_agent(Agent::new("solo", "Solo").with_org("org-1").with_max_simulations(1))
        .unwrap();
    h.coordinator
        .pools()
        .add_member(&"sales".into(), &"solo".into(), 1)
        .unwrap();
    let mut solo = h.gateway.connect_agent("solo");
    h.coordinator.registry().login(&"solo".into()).unwrap();
    let mut other = h.agent("other", "sales", 2);

    // The watcher takes solo's last slot, so the call goes to the next tier.
    assert_eq!(h.join("watcher").await, Some("solo".into()));
    let ticket = h.request("visitor-1").await;
    assert_eq!(ticket.state, offered("other"));
    assert!(drain(&mut solo).is_empty());
    assert_eq!(names(&drain(&mut other)), vec!["call:incoming"]);

    // Solo is full and the other agent is ringing, so a late visitor waits.
    assert_eq!(h.join("late").await, None);

    h.coordinator.release_visitor(&"watcher".into());
    assert!(h.coordinator.registry().is_eligible(&"solo".into()));
}

#[tokio::test(start_paused = true)]
async fn going_offline_leaves_visitors_waiting_when_nobody_is_free() {
    let h = harness();
    let _a = h.agent("a", "sales", 1);
    let mut watcher = h.gateway.connect_visitor("watcher");
    h.join("watcher").await;
    drain(&mut watcher);

    h.coordinator.logout(&"a".into()).await.unwrap();
    assert!(matches!(
        drain(&mut watcher).as_slice(),
        [VisitorEvent::AgentUnavailable(p)] if p.request_id.is_none()
    ));
    assert_eq!(
        h.coordinator.visitor_assignment(&"watcher".into()).unwrap().agent_id,
        None
    );
    assert!(h.coordinator.registry().get(&"a".into()).unwrap().simulations.is_empty());

    // The next agent to log in picks them up.
    h.coordinator.login(&"a".into()).await.unwrap();
    match drain(&mut watcher).as_slice() {
        [VisitorEvent::AgentAssigned(assigned)] => assert_eq!(assigned.agent_id, AgentId::from("a")),
        other => panic!("unexpected visitor events {:?}", other),
    }
    assert_eq!(h.status("a"), AgentStatus::InSimulation);
}

#[tokio::test(start_paused = true)]
async fn visitors_join_and_leave_through_the_handler() {
    let h = harness();
    let _a = h.agent("a", "sales", 1);
    let _visitor = h.gateway.connect_visitor("visitor-1");

    let joined = h
        .handler
        .handle_visitor(
            &"visitor-1".into(),
            "visitor:join",
            json!({ "visitorId": "visitor-1", "siteId": "site-1", "pageUrl": PRICING }),
        )
        .await
        .unwrap();
    assert!(joined.is_none());
    assert_eq!(h.status("a"), AgentStatus::InSimulation);

    let spoofed = h
        .handler
        .handle_visitor(
            &"visitor-1".into(),
            "visitor:join",
            json!({ "visitorId": "someone-else", "siteId": "site-1", "pageUrl": PRICING }),
        )
        .await;
    assert!(matches!(spoofed, Err(CallCenterError::Validation(_))));

    h.handler
        .handle_visitor(
            &"visitor-1".into(),
            "visitor:leave",
            json!({ "visitorId": "visitor-1" }),
        )
        .await
        .unwrap();
    assert_eq!(h.status("a"), AgentStatus::Idle);
    assert!(h.coordinator.visitor_assignment(&"visitor-1".into()).is_none());
}
