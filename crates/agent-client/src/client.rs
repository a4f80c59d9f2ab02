//! Agent client facade
//!
//! Wires the presence state machine, the notifier and the idle timer to one
//! transport and routes server events between them.

use crate::channel::{ReliableCommandChannel, SendOutcome};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::idle::IdleTimer;
use crate::notify::{IncomingCallNotifier, NotificationSurfaces};
use crate::presence::{PresenceSnapshot, PresenceStateMachine};
use crate::transport::CommandTransport;
use greeter_infra_common::protocol::{
    names, AgentId, AgentStatus, AwayReason, CallAcceptPayload, CallEndPayload, CallId,
    CallRejectPayload, RequestId, ServerEvent,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

pub struct AgentClient {
    agent_id: AgentId,
    channel: Arc<ReliableCommandChannel>,
    presence: PresenceStateMachine,
    notifier: IncomingCallNotifier,
    idle: IdleTimer,
    config: ClientConfig,
}

impl AgentClient {
    pub fn new(
        agent_id: impl Into<AgentId>,
        transport: Arc<dyn CommandTransport>,
        surfaces: NotificationSurfaces,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        config.validate()?;

        let channel = Arc::new(ReliableCommandChannel::new(transport, config.retry.clone()));
        let idle = IdleTimer::new(config.idle_timeout());
        idle.set_enabled(config.idle_detection_enabled);

        Ok(Self {
            agent_id: agent_id.into(),
            presence: PresenceStateMachine::new(channel.clone()),
            notifier: IncomingCallNotifier::new(surfaces, config.notification.clone()),
            channel,
            idle,
            config,
        })
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn presence(&self) -> PresenceSnapshot {
        self.presence.snapshot()
    }

    /// Stream of presence snapshots, starting with the current one.
    pub fn presence_updates(&self) -> WatchStream<PresenceSnapshot> {
        WatchStream::new(self.presence.subscribe())
    }

    pub fn notifier(&self) -> &IncomingCallNotifier {
        &self.notifier
    }

    pub fn idle_timer(&self) -> &IdleTimer {
        &self.idle
    }

    /// Forward user activity to the idle detector.
    pub fn record_activity(&self) {
        self.idle.record_activity();
    }

    pub async fn set_away(&self, reason: AwayReason) -> ClientResult<SendOutcome> {
        let outcome = self.presence.set_away(reason).await?;
        self.idle.set_enabled(false);
        Ok(outcome)
    }

    pub async fn set_back(&self) -> ClientResult<SendOutcome> {
        let outcome = self.presence.set_back().await?;
        self.idle.set_enabled(self.config.idle_detection_enabled);
        Ok(outcome)
    }

    /// Answer the ringing call.
    pub async fn accept_call(&self) -> ClientResult<RequestId> {
        let call = self
            .presence
            .take_incoming_call()
            .ok_or(ClientError::NoIncomingCall { action: "accept" })?;
        self.notifier.stop_ringing();

        let request_id = call.request.request_id;
        info!(agent_id = %self.agent_id, %request_id, "✅ Accepting call");
        let payload = serde_json::to_value(CallAcceptPayload {
            request_id: request_id.clone(),
        })?;
        self.channel.emit(names::CALL_ACCEPT, payload).await?;
        Ok(request_id)
    }

    /// Decline the ringing call.
    pub async fn reject_call(&self, reason: Option<String>) -> ClientResult<RequestId> {
        let call = self
            .presence
            .take_incoming_call()
            .ok_or(ClientError::NoIncomingCall { action: "reject" })?;
        self.notifier.stop_ringing();

        let request_id = call.request.request_id;
        info!(agent_id = %self.agent_id, %request_id, "❌ Rejecting call");
        let payload = serde_json::to_value(CallRejectPayload {
            request_id: request_id.clone(),
            reason,
        })?;
        self.channel.emit(names::CALL_REJECT, payload).await?;
        Ok(request_id)
    }

    /// Hang up the active call. Local state clears when `call:ended` arrives.
    pub async fn end_call(&self) -> ClientResult<CallId> {
        let call_id = self
            .presence
            .snapshot()
            .active_call
            .map(|c| c.call_id)
            .ok_or(ClientError::NoActiveCall)?;

        let payload = serde_json::to_value(CallEndPayload {
            call_id: call_id.clone(),
        })?;
        self.channel.emit(names::CALL_END, payload).await?;
        Ok(call_id)
    }

    /// Apply one server event, waiting for any presence command it
    /// triggers.
    pub async fn handle_event(&self, event: ServerEvent) {
        if let Some(reason) = self.apply_event(event) {
            self.send_away(reason).await;
        }
    }

    /// Apply one server event without talking to the server. Returns the
    /// away reason to re-send when a login reveals an unsynced away.
    fn apply_event(&self, event: ServerEvent) -> Option<AwayReason> {
        debug!(agent_id = %self.agent_id, event = event.name(), "Server event");

        match event {
            ServerEvent::CallIncoming(payload) => {
                if self.presence.handle_incoming_call(payload.clone()) {
                    self.notifier.start_ringing(&payload);
                }
            }
            ServerEvent::CallCancelled(payload) => {
                if self.presence.handle_call_cancelled(&payload.request_id) {
                    self.notifier.stop_ringing();
                }
            }
            ServerEvent::CallStarted(payload) => {
                self.notifier.stop_ringing();
                self.presence.handle_call_started(payload.call);
                self.idle.set_enabled(false);
            }
            ServerEvent::CallEnded(payload) => {
                if self.presence.handle_call_ended(&payload) {
                    self.idle.set_enabled(
                        self.config.idle_detection_enabled && self.presence.status().is_available(),
                    );
                }
            }
            ServerEvent::AgentMarkedAway(payload) => {
                if let Some(dropped) = self.presence.handle_server_forced_away(&payload) {
                    debug!(request_id = %dropped.request.request_id, "Dropping ringing call");
                }
                self.notifier.stop_ringing();
                self.idle.set_enabled(false);
            }
            ServerEvent::LoginSuccess(payload) => {
                let resend = self.presence.handle_login_success(&payload);
                if self.presence.status() == AgentStatus::Away {
                    self.idle.set_enabled(false);
                }
                if resend {
                    info!(agent_id = %self.agent_id, "Re-sending unsynced away status");
                    return Some(AwayReason::Manual);
                }
            }
        }
        None
    }

    async fn send_away(&self, reason: AwayReason) {
        if let Err(e) = self.set_away(reason).await {
            warn!(error = %e, %reason, "Failed to send away status");
        }
    }

    /// Consume server events until the sender closes, marking the agent
    /// away when the idle timer fires.
    ///
    /// An away sent from here runs alongside event handling, so a retry
    /// waiting on lost acks never holds back `call:cancelled` or
    /// `agent:marked_away`. At most one such command is in flight.
    pub async fn run(&self, mut events: mpsc::Receiver<ServerEvent>) {
        info!(agent_id = %self.agent_id, "👤 Agent client running");
        let mut in_flight: Option<Pin<Box<dyn Future<Output = ()> + Send + '_>>> = None;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if let Some(reason) = self.apply_event(event) {
                            if in_flight.is_none() {
                                in_flight = Some(Box::pin(self.send_away(reason)));
                            } else {
                                debug!(%reason, "Away already in flight");
                            }
                        }
                    }
                    None => break,
                },
                _ = async {
                    if let Some(command) = in_flight.as_mut() {
                        command.await;
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                }
                _ = self.idle.wait_for_idle(), if in_flight.is_none() => {
                    if self.presence.status().is_available() {
                        info!(agent_id = %self.agent_id, "💤 Inactive, going away");
                        in_flight = Some(Box::pin(self.send_away(AwayReason::Idle)));
                    } else {
                        self.idle.set_enabled(false);
                    }
                }
            }
        }
        self.notifier.stop_ringing();
        info!(agent_id = %self.agent_id, "Agent client stopped");
    }
}
