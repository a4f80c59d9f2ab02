//! # Agent Presence State Machine
//!
//! Client-side view of the agent's availability. Local state changes are
//! applied after the [`ReliableCommandChannel`] returns, using whatever
//! outcome it reached:
//!
//! | command      | acknowledged            | assumed delivered / not connected      |
//! |--------------|-------------------------|----------------------------------------|
//! | `set_away`   | away, plain reason      | away, reason + " (sync pending)"       |
//! | `set_back`   | available               | available, `sync_pending` set          |
//!
//! A server-forced away (`agent:marked_away`) is applied without any
//! round-trip and also drops the ringing call, since the server has already
//! withdrawn that offer.
//!
//! Every change is published on a `watch` channel so UIs can render the
//! latest [`PresenceSnapshot`].

use crate::channel::{ReliableCommandChannel, SendOutcome};
use crate::error::{ClientError, ClientResult};
use greeter_infra_common::protocol::{
    names, ActiveCall, AgentAwayPayload, AgentMarkedAwayPayload, AgentStatus, AwayReason,
    CallEndReason, CallEndedPayload, CallIncomingPayload, LoginSuccessPayload, RequestId,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

pub const IDLE_AWAY_MESSAGE: &str = "You were marked away due to inactivity";
pub const MANUAL_AWAY_MESSAGE: &str = "You set yourself as away";
pub const SYNC_PENDING_SUFFIX: &str = " (sync pending)";

/// Point-in-time view of the agent's presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub status: AgentStatus,
    pub is_marked_away: bool,
    /// Human readable reason shown while away
    pub away_reason: Option<String>,
    /// The last presence command was applied without a server acknowledgement
    pub sync_pending: bool,
    /// Call currently ringing on this client
    pub incoming_call: Option<CallIncomingPayload>,
    pub active_call: Option<ActiveCall>,
}

impl Default for PresenceSnapshot {
    fn default() -> Self {
        Self {
            status: AgentStatus::Idle,
            is_marked_away: false,
            away_reason: None,
            sync_pending: false,
            incoming_call: None,
            active_call: None,
        }
    }
}

impl PresenceSnapshot {
    fn mark_away(&mut self, reason: String, sync_pending: bool) {
        self.status = AgentStatus::Away;
        self.is_marked_away = true;
        self.away_reason = Some(reason);
        self.sync_pending = sync_pending;
    }

    fn clear_away(&mut self, sync_pending: bool) {
        if self.status == AgentStatus::Away {
            self.status = AgentStatus::Idle;
        }
        self.is_marked_away = false;
        self.away_reason = None;
        self.sync_pending = sync_pending;
    }
}

fn away_message(reason: AwayReason) -> &'static str {
    match reason {
        AwayReason::Idle => IDLE_AWAY_MESSAGE,
        AwayReason::Manual | AwayReason::RingNoAnswer => MANUAL_AWAY_MESSAGE,
    }
}

pub struct PresenceStateMachine {
    channel: Arc<ReliableCommandChannel>,
    state: watch::Sender<PresenceSnapshot>,
    // Serializes acknowledged presence commands.
    command_lock: Mutex<()>,
}

impl PresenceStateMachine {
    pub fn new(channel: Arc<ReliableCommandChannel>) -> Self {
        let (state, _) = watch::channel(PresenceSnapshot::default());
        Self {
            channel,
            state,
            command_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenceSnapshot> {
        self.state.subscribe()
    }

    pub fn status(&self) -> AgentStatus {
        self.state.borrow().status
    }

    /// Tell the server the agent is away and apply it locally.
    ///
    /// Local state becomes away whatever the delivery outcome. Without a
    /// positive acknowledgement the reason carries the sync pending suffix.
    pub async fn set_away(&self, reason: AwayReason) -> ClientResult<SendOutcome> {
        let _guard = self.command_lock.lock().await;

        let status = self.status();
        if status == AgentStatus::InCall {
            return Err(ClientError::InvalidState {
                operation: "set_away",
                status,
            });
        }

        let payload = serde_json::to_value(AgentAwayPayload { reason })?;
        let outcome = self.channel.send(names::AGENT_AWAY, payload).await;

        let base = away_message(reason);
        let (message, pending) = if outcome.is_confirmed() {
            (base.to_string(), false)
        } else {
            warn!(?outcome, "Away not confirmed by server, applying locally");
            (format!("{}{}", base, SYNC_PENDING_SUFFIX), true)
        };

        info!(%reason, pending, "🟡 Agent set away");
        self.state.send_modify(|s| s.mark_away(message, pending));
        Ok(outcome)
    }

    /// Tell the server the agent is back. The away flag and reason are
    /// cleared regardless of the delivery outcome.
    pub async fn set_back(&self) -> ClientResult<SendOutcome> {
        let _guard = self.command_lock.lock().await;

        let outcome = self.channel.send(names::AGENT_BACK, Value::Null).await;
        let pending = !outcome.is_confirmed();
        if pending {
            warn!(?outcome, "Back not confirmed by server, applying locally");
        }

        info!(pending, "🟢 Agent back");
        self.state.send_modify(|s| s.clear_away(pending));
        Ok(outcome)
    }

    /// Apply `agent:marked_away`. Returns the call that was ringing, if any,
    /// so the caller can stop alerting.
    pub fn handle_server_forced_away(
        &self,
        payload: &AgentMarkedAwayPayload,
    ) -> Option<CallIncomingPayload> {
        info!(reason = %payload.reason, "🟡 Server marked agent away");
        let mut dropped = None;
        self.state.send_modify(|s| {
            dropped = s.incoming_call.take();
            s.mark_away(payload.message.clone(), false);
        });
        dropped
    }

    /// Reconcile with the server's view after (re)login.
    ///
    /// Returns `true` when a locally applied away never reached the server
    /// and should be sent again.
    pub fn handle_login_success(&self, payload: &LoginSuccessPayload) -> bool {
        let mut resend_away = false;
        self.state.send_modify(|s| match payload.status {
            AgentStatus::Away => {
                if !s.is_marked_away {
                    info!("Restoring away status from server");
                    s.mark_away(MANUAL_AWAY_MESSAGE.to_string(), false);
                } else {
                    s.sync_pending = false;
                }
            }
            server_status => {
                if s.is_marked_away && s.sync_pending {
                    resend_away = true;
                } else {
                    s.status = server_status;
                    s.is_marked_away = false;
                    s.away_reason = None;
                }
            }
        });
        resend_away
    }

    /// Record a ringing call. Returns `false` when the same request is
    /// already ringing.
    pub fn handle_incoming_call(&self, payload: CallIncomingPayload) -> bool {
        let mut fresh = false;
        self.state.send_modify(|s| {
            let same = s
                .incoming_call
                .as_ref()
                .is_some_and(|c| c.request.request_id == payload.request.request_id);
            if !same {
                s.incoming_call = Some(payload);
                fresh = true;
            }
        });
        fresh
    }

    /// Clear the ringing call if it matches `request_id`.
    pub fn handle_call_cancelled(&self, request_id: &RequestId) -> bool {
        let mut cleared = false;
        self.state.send_if_modified(|s| {
            if s
                .incoming_call
                .as_ref()
                .is_some_and(|c| &c.request.request_id == request_id)
            {
                s.incoming_call = None;
                cleared = true;
            }
            cleared
        });
        cleared
    }

    /// Take the ringing call, e.g. when the agent answers or declines it.
    pub fn take_incoming_call(&self) -> Option<CallIncomingPayload> {
        let mut taken = None;
        self.state.send_if_modified(|s| {
            taken = s.incoming_call.take();
            taken.is_some()
        });
        taken
    }

    pub fn handle_call_started(&self, call: ActiveCall) {
        info!(call_id = %call.call_id, "📞 Call started");
        self.state.send_modify(|s| {
            s.incoming_call = None;
            s.status = AgentStatus::InCall;
            s.is_marked_away = false;
            s.away_reason = None;
            s.active_call = Some(call);
        });
    }

    /// Returns `true` if the ended call was the active one.
    ///
    /// A call ended because the agent was removed leaves them `Offline`,
    /// matching the deactivated record on the server.
    pub fn handle_call_ended(&self, payload: &CallEndedPayload) -> bool {
        let mut ended = false;
        self.state.send_if_modified(|s| {
            if s
                .active_call
                .as_ref()
                .is_some_and(|c| c.call_id == payload.call_id)
            {
                s.active_call = None;
                if payload.reason == CallEndReason::AgentDeactivated {
                    s.status = AgentStatus::Offline;
                    s.is_marked_away = false;
                    s.away_reason = None;
                    s.sync_pending = false;
                } else if s.status == AgentStatus::InCall {
                    s.status = AgentStatus::Idle;
                }
                ended = true;
            }
            ended
        });
        if ended {
            info!(call_id = %payload.call_id, reason = ?payload.reason, "Call ended");
        }
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::transport::{ChannelTransport, ServerEndpoint};
    use chrono::Utc;
    use greeter_infra_common::protocol::{AgentId, CallRequest, StatusAck, VisitorInfo};
    use pretty_assertions::assert_eq;

    fn machine() -> (PresenceStateMachine, ServerEndpoint) {
        let (transport, server) = ChannelTransport::pair();
        let channel = ReliableCommandChannel::new(Arc::new(transport), RetryPolicy::default());
        (PresenceStateMachine::new(Arc::new(channel)), server)
    }

    fn ack_everything(mut server: ServerEndpoint, ack: StatusAck) {
        tokio::spawn(async move {
            while let Some(cmd) = server.recv().await {
                cmd.acknowledge(ack.clone());
            }
        });
    }

    fn incoming(request_id: &str) -> CallIncomingPayload {
        CallIncomingPayload {
            request: CallRequest {
                request_id: RequestId::from(request_id),
                visitor_id: "visitor-1".into(),
                agent_id: AgentId::from("agent-1"),
                org_id: None,
                page_url: "https://example.com/pricing".into(),
                requested_at: Utc::now(),
            },
            visitor: VisitorInfo::new("visitor-1", "https://example.com/pricing"),
        }
    }

    fn active_call() -> ActiveCall {
        ActiveCall {
            call_id: "active_1".into(),
            request_id: "call_1".into(),
            visitor_id: "visitor-1".into(),
            agent_id: "agent-1".into(),
            started_at: Utc::now(),
            ended_at: None,
            recording_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_away_uses_plain_reason() {
        let (presence, server) = machine();
        ack_everything(server, StatusAck::ok(AgentStatus::Away));

        let outcome = presence.set_away(AwayReason::Idle).await.unwrap();
        assert!(outcome.is_confirmed());

        let snap = presence.snapshot();
        assert_eq!(snap.status, AgentStatus::Away);
        assert!(snap.is_marked_away);
        assert_eq!(snap.away_reason.as_deref(), Some(IDLE_AWAY_MESSAGE));
        assert!(!snap.sync_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_away_is_applied_with_pending_suffix() {
        let (presence, mut server) = machine();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(cmd) = server.recv().await {
                held.push(cmd);
            }
        });

        let outcome = presence.set_away(AwayReason::Manual).await.unwrap();
        assert_eq!(outcome, SendOutcome::AssumedDelivered);

        let snap = presence.snapshot();
        assert!(snap.is_marked_away);
        assert_eq!(
            snap.away_reason.as_deref(),
            Some("You set yourself as away (sync pending)")
        );
        assert!(snap.sync_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn back_clears_away_even_when_not_connected() {
        let (presence, server) = machine();
        let link = server.link.clone();
        ack_everything(server, StatusAck::ok(AgentStatus::Away));
        presence.set_away(AwayReason::Manual).await.unwrap();

        link.set_connected(false);
        link.set_reconnectable(false);
        let outcome = presence.set_back().await.unwrap();
        assert_eq!(outcome, SendOutcome::NotConnected);

        let snap = presence.snapshot();
        assert_eq!(snap.status, AgentStatus::Idle);
        assert!(!snap.is_marked_away);
        assert_eq!(snap.away_reason, None);
        assert!(snap.sync_pending);
    }

    #[tokio::test]
    async fn forced_away_drops_ringing_call() {
        let (presence, _server) = machine();
        assert!(presence.handle_incoming_call(incoming("call_1")));
        assert!(!presence.handle_incoming_call(incoming("call_1")));

        let dropped = presence.handle_server_forced_away(&AgentMarkedAwayPayload {
            reason: AwayReason::RingNoAnswer,
            message: "You've been marked as Away".into(),
        });
        assert_eq!(
            dropped.map(|c| c.request.request_id),
            Some(RequestId::from("call_1"))
        );

        let snap = presence.snapshot();
        assert_eq!(snap.incoming_call, None);
        assert_eq!(snap.status, AgentStatus::Away);
        assert_eq!(snap.away_reason.as_deref(), Some("You've been marked as Away"));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_away_replaces_a_pending_away() {
        let (presence, server) = machine();
        let link = server.link.clone();
        drop(server);
        link.set_connected(false);
        link.set_reconnectable(false);
        presence.set_away(AwayReason::Manual).await.unwrap();
        assert!(presence.snapshot().sync_pending);

        presence.handle_server_forced_away(&AgentMarkedAwayPayload {
            reason: AwayReason::RingNoAnswer,
            message: "You've been marked as Away".into(),
        });

        let snap = presence.snapshot();
        assert_eq!(snap.status, AgentStatus::Away);
        assert!(snap.is_marked_away);
        assert!(!snap.sync_pending);
        assert_eq!(snap.away_reason.as_deref(), Some("You've been marked as Away"));
    }

    #[tokio::test]
    async fn forced_away_applies_mid_call() {
        let (presence, _server) = machine();
        presence.handle_call_started(active_call());

        let dropped = presence.handle_server_forced_away(&AgentMarkedAwayPayload {
            reason: AwayReason::Idle,
            message: "Marked away by an administrator".into(),
        });
        assert_eq!(dropped, None);

        let snap = presence.snapshot();
        assert_eq!(snap.status, AgentStatus::Away);
        assert!(snap.is_marked_away);
        assert_eq!(
            snap.away_reason.as_deref(),
            Some("Marked away by an administrator")
        );
    }

    #[tokio::test]
    async fn removal_mid_call_leaves_the_agent_offline() {
        let (presence, _server) = machine();
        presence.handle_call_started(active_call());

        assert!(!presence.handle_call_ended(&CallEndedPayload {
            call_id: "active_other".into(),
            reason: CallEndReason::AgentDeactivated,
            message: None,
        }));
        assert_eq!(presence.status(), AgentStatus::InCall);

        assert!(presence.handle_call_ended(&CallEndedPayload {
            call_id: "active_1".into(),
            reason: CallEndReason::AgentDeactivated,
            message: Some("The agent is no longer available".into()),
        }));
        let snap = presence.snapshot();
        assert_eq!(snap.status, AgentStatus::Offline);
        assert_eq!(snap.active_call, None);
        assert!(!snap.is_marked_away);
    }

    #[tokio::test]
    async fn ordinary_call_end_returns_to_idle() {
        let (presence, _server) = machine();
        presence.handle_call_started(active_call());
        assert!(presence.handle_call_ended(&CallEndedPayload {
            call_id: "active_1".into(),
            reason: CallEndReason::VisitorEnded,
            message: None,
        }));
        assert_eq!(presence.status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn cancellation_only_clears_matching_request() {
        let (presence, _server) = machine();
        presence.handle_incoming_call(incoming("call_1"));

        assert!(!presence.handle_call_cancelled(&RequestId::from("call_2")));
        assert!(presence.snapshot().incoming_call.is_some());
        assert!(presence.handle_call_cancelled(&RequestId::from("call_1")));
        assert!(presence.snapshot().incoming_call.is_none());
    }

    #[tokio::test]
    async fn login_restores_server_away() {
        let (presence, _server) = machine();
        let resend = presence.handle_login_success(&LoginSuccessPayload {
            agent_id: AgentId::from("agent-1"),
            status: AgentStatus::Away,
        });
        assert!(!resend);
        let snap = presence.snapshot();
        assert!(snap.is_marked_away);
        assert_eq!(snap.away_reason.as_deref(), Some(MANUAL_AWAY_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn login_requests_resend_of_unsynced_away() {
        let (presence, server) = machine();
        let link = server.link.clone();
        drop(server);
        link.set_connected(false);
        link.set_reconnectable(false);
        presence.set_away(AwayReason::Manual).await.unwrap();

        let resend = presence.handle_login_success(&LoginSuccessPayload {
            agent_id: AgentId::from("agent-1"),
            status: AgentStatus::Idle,
        });
        assert!(resend);
        assert!(presence.snapshot().is_marked_away);
    }

    #[tokio::test]
    async fn cannot_go_away_mid_call() {
        let (presence, _server) = machine();
        presence.handle_call_started(active_call());
        let err = presence.set_away(AwayReason::Manual).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { .. }));
    }
}
