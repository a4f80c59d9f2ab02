//! # Call Coordinator
//!
//! Drives a visitor request from `call:request` to a connected call, walking
//! the ranked candidate list produced by the
//! [`RoutingResolver`](crate::routing::RoutingResolver).
//!
//! ## Offer loop
//!
//! ```text
//!            ┌──────────────── pop next candidate ◄───────────────┐
//!            ▼                                                    │
//!   try_reserve_offer ──stale──► skip ─────────────────────────────┤
//!            │                                                    │
//!         reserved                                                │
//!            ▼                                                    │
//!   call:incoming + offer timer ──reject / timeout / withdraw─────┘
//!            │
//!         accept ──► call:started (agent) + call:accepted (visitor)
//!
//!   list empty ──► re-resolve once without tried agents ──► still empty
//!                                                    ──► agent:unavailable
//! ```
//!
//! ## Locking
//!
//! Request state lives in a `DashMap`. Guards are always dropped before any
//! `.await`; every gateway send happens after the state change it reports.
//! Reserving an agent happens while the request entry is held, so a visitor
//! cancel cannot interleave between the reservation and the `Offered` state.
//!
//! ## Offer timers
//!
//! Each offer spawns a task holding a `Weak` reference to the coordinator.
//! Accept, reject, cancel and withdrawal abort it. A timer that fires anyway
//! re-checks that the request is still offered to the same agent before
//! doing anything.

use super::gateway::{RecordingHook, SignalingGateway};
use super::types::{
    CallCenterStats, CallRequestState, OfferAttempt, OfferOutcome, PendingRequest, RequestSnapshot,
    RequestTicket, StatCounters, VisitorAssignment,
};
use crate::agent::{Agent, AgentRegistry};
use crate::config::CallCenterConfig;
use crate::error::{CallCenterError, Result};
use crate::pool::PoolDirectory;
use crate::routing::{Candidate, RoutingOutcome, RoutingResolver};
use chrono::Utc;
use dashmap::DashMap;
use greeter_infra_common::protocol::{
    ActiveCall, AgentId, AgentMarkedAwayPayload, AgentStatus, AgentUnavailablePayload, AwayReason,
    CallAcceptedPayload, CallCancelledPayload, CallEndReason, CallEndedPayload, CallId,
    CallIncomingPayload, CallRequest, CallRequestPayload, CallStartedPayload, LoginSuccessPayload,
    ReassignReason, RequestId, ServerEvent, SiteId, StatusAck, VisitorEvent, VisitorId, VisitorInfo,
};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const AGENT_REMOVED_MESSAGE: &str = "The agent is no longer available";

enum OfferStep {
    Skip,
    Dispatch {
        agent_id: AgentId,
        payload: CallIncomingPayload,
    },
    Reresolve {
        site_id: SiteId,
        page_url: String,
        exclude: HashSet<AgentId>,
    },
    Exhausted,
    Settled(CallRequestState),
}

pub struct CallCoordinator {
    pub(super) config: CallCenterConfig,
    pub(super) registry: Arc<AgentRegistry>,
    pools: Arc<PoolDirectory>,
    pub(super) resolver: RoutingResolver,
    gateway: Arc<dyn SignalingGateway>,
    recording: RwLock<Option<Arc<dyn RecordingHook>>>,
    requests: DashMap<RequestId, PendingRequest>,
    calls: DashMap<CallId, ActiveCall>,
    /// Which agent's simulation each connected visitor watches
    pub(super) visitors: DashMap<VisitorId, VisitorAssignment>,
    pub(super) counters: StatCounters,
    self_ref: Weak<CallCoordinator>,
}

impl CallCoordinator {
    /// Create a coordinator with an empty registry and pool directory.
    pub fn new(config: CallCenterConfig, gateway: Arc<dyn SignalingGateway>) -> Result<Arc<Self>> {
        Self::with_state(
            config,
            Arc::new(AgentRegistry::new()),
            Arc::new(PoolDirectory::new()),
            gateway,
        )
    }

    /// Create a coordinator over an existing registry and pool directory.
    pub fn with_state(
        config: CallCenterConfig,
        registry: Arc<AgentRegistry>,
        pools: Arc<PoolDirectory>,
        gateway: Arc<dyn SignalingGateway>,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(CallCenterError::configuration)?;
        info!(
            "🚀 Starting call coordinator (offer timeout {}ms, tie-break {:?})",
            config.offers.offer_timeout_ms, config.routing.tie_break
        );

        let resolver = RoutingResolver::new(registry.clone(), pools.clone(), config.routing.clone());
        Ok(Arc::new_cyclic(|self_ref| Self {
            config,
            registry,
            pools,
            resolver,
            gateway,
            recording: RwLock::new(None),
            requests: DashMap::new(),
            calls: DashMap::new(),
            visitors: DashMap::new(),
            counters: StatCounters::default(),
            self_ref: self_ref.clone(),
        }))
    }

    pub fn set_recording_hook(&self, hook: Arc<dyn RecordingHook>) {
        *self.recording.write() = Some(hook);
    }

    pub fn config(&self) -> &CallCenterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn pools(&self) -> &Arc<PoolDirectory> {
        &self.pools
    }

    pub fn resolver(&self) -> &RoutingResolver {
        &self.resolver
    }

    // Agent management

    /// Register an agent. Agents without an explicit simulation limit get
    /// the configured default.
    pub fn register_agent(&self, mut agent: Agent) -> Result<AgentId> {
        if agent.max_simultaneous_simulations.is_none() {
            agent.max_simultaneous_simulations = self.config.routing.default_max_simultaneous_simulations;
        }
        self.registry.register(agent)
    }

    /// Bring an agent online and tell their client which status the server
    /// holds, so an away set before a reconnect survives it. Visitors
    /// waiting for a greeting are placed again once the agent is in.
    pub async fn login(&self, agent_id: &AgentId) -> Result<LoginSuccessPayload> {
        let status = self.registry.login(agent_id)?;
        let payload = LoginSuccessPayload {
            agent_id: agent_id.clone(),
            status,
        };
        if let Err(e) = self
            .gateway
            .send_to_agent(agent_id, ServerEvent::LoginSuccess(payload.clone()))
            .await
        {
            debug!(agent_id = %agent_id, error = %e, "Login confirmation not delivered");
        }
        if status.is_available() {
            self.place_waiting_visitors().await;
        }
        Ok(payload)
    }

    /// Take an agent offline. A ringing offer moves to the next candidate
    /// and their visitors move to other agents.
    pub async fn logout(&self, agent_id: &AgentId) -> Result<()> {
        let pending = self.registry.pending_offer(agent_id);
        self.registry.logout(agent_id)?;
        if let Some(request_id) = pending {
            self.reroute_withdrawn(&request_id, agent_id, "agent offline").await;
        }
        self.reassign_visitors(agent_id, None, ReassignReason::AgentOffline)
            .await;
        Ok(())
    }

    /// Handle `agent:away`. A ringing offer is pulled back and re-routed.
    pub async fn set_agent_away(&self, agent_id: &AgentId, reason: AwayReason) -> StatusAck {
        match self.registry.mark_away(agent_id, reason) {
            Ok(pending) => {
                if let Some(request_id) = pending {
                    self.reroute_withdrawn(&request_id, agent_id, "agent away").await;
                }
                StatusAck::ok(AgentStatus::Away)
            }
            Err(e) => {
                warn!("⚠️ Agent {} could not go away: {}", agent_id, e);
                StatusAck::failed(e.to_string())
            }
        }
    }

    /// Handle `agent:back`.
    pub fn set_agent_back(&self, agent_id: &AgentId) -> StatusAck {
        match self.registry.mark_back(agent_id) {
            Ok(status) => StatusAck::ok(status),
            Err(e) => {
                warn!("⚠️ Agent {} could not come back: {}", agent_id, e);
                StatusAck::failed(e.to_string())
            }
        }
    }

    /// Remove an agent: end their call, deactivate the record, drop every
    /// pool membership, re-route their ringing offer and move their
    /// visitors elsewhere.
    ///
    /// Returns the record as it was before deactivation.
    pub async fn remove_agent(&self, agent_id: &AgentId) -> Result<Agent> {
        let current = self
            .registry
            .get(agent_id)
            .ok_or_else(|| CallCenterError::not_found(format!("agent {}", agent_id)))?;

        // The call ends before the record is soft-deleted.
        if let Some(call_id) = &current.active_call {
            warn!("⚠️ Ending call {} because agent {} was removed", call_id, agent_id);
            StatCounters::bump(&self.counters.forced_terminations);
            if let Err(e) = self
                .finish_call(call_id, CallEndReason::AgentDeactivated, false)
                .await
            {
                warn!("⚠️ Could not end call {}: {}", call_id, e);
            }
        }

        let before = self.registry.deactivate(agent_id)?;
        let memberships = self.pools.remove_agent_everywhere(agent_id);
        info!(
            "🗑️ Removed agent {} ({} pool membership(s))",
            agent_id, memberships
        );

        if let Some(request_id) = &before.pending_offer {
            self.reroute_withdrawn(request_id, agent_id, "agent removed").await;
        }
        self.reassign_visitors(agent_id, None, ReassignReason::AgentOffline)
            .await;

        Ok(before)
    }

    // Request lifecycle

    /// Handle `call:request`: rank the candidates and make the first offer.
    ///
    /// Finding nobody is not an error. The visitor receives
    /// `agent:unavailable` and the ticket reports `TimedOut`.
    pub async fn request_call(&self, payload: CallRequestPayload) -> Result<RequestTicket> {
        let site = self
            .resolver
            .site(&payload.site_id)
            .ok_or_else(|| CallCenterError::not_found(format!("site {}", payload.site_id)))?;
        let outcome = self
            .resolver
            .resolve(&payload.site_id, &payload.page_url, &HashSet::new())?;

        let request_id = RequestId::generate();
        match &outcome {
            RoutingOutcome::Candidates {
                pool_id,
                used_catch_all,
                candidates,
            } => info!(
                "📥 Request {} from visitor {}: {} candidate(s) in pool {}{}",
                request_id,
                payload.visitor_id,
                candidates.len(),
                pool_id,
                if *used_catch_all { " (catch-all)" } else { "" }
            ),
            RoutingOutcome::Exhausted { reason } => info!(
                "📥 Request {} from visitor {}: {}",
                request_id, payload.visitor_id, reason
            ),
        }

        let now = Utc::now();
        let request = PendingRequest {
            request_id: request_id.clone(),
            site_id: payload.site_id,
            org_id: payload.org_id.or(site.org_id),
            visitor: VisitorInfo {
                visitor_id: payload.visitor_id,
                page_url: payload.page_url,
                connected_at: now,
                location: payload.location,
            },
            requested_at: now,
            state: CallRequestState::Requested,
            reresolved: outcome.is_exhausted(),
            candidates: outcome.candidates().iter().cloned().collect::<VecDeque<Candidate>>(),
            tried: HashSet::new(),
            attempts: Vec::new(),
            offer_timer: None,
        };
        self.requests.insert(request_id.clone(), request);
        StatCounters::bump(&self.counters.requests);

        let state = self.offer_next(&request_id).await;
        Ok(RequestTicket { request_id, state })
    }

    /// Handle `call:accept` from the agent the request is offered to.
    pub async fn accept(&self, agent_id: &AgentId, request_id: &RequestId) -> Result<ActiveCall> {
        let call = {
            let mut request = self
                .requests
                .get_mut(request_id)
                .ok_or_else(|| CallCenterError::not_found(format!("request {}", request_id)))?;
            if request.state.offered_to() != Some(agent_id) {
                return Err(CallCenterError::orchestration(format!(
                    "request {} is not offered to agent {}",
                    request_id, agent_id
                )));
            }

            let call_id = CallId::generate();
            self.registry.start_call(agent_id, request_id, &call_id)?;
            if let Some(timer) = request.offer_timer.take() {
                timer.abort();
            }
            request.state = CallRequestState::Accepted {
                call_id: call_id.clone(),
            };

            ActiveCall {
                call_id,
                request_id: request_id.clone(),
                visitor_id: request.visitor.visitor_id.clone(),
                agent_id: agent_id.clone(),
                started_at: Utc::now(),
                ended_at: None,
                recording_id: None,
            }
        };
        self.requests.remove(request_id);
        self.calls.insert(call.call_id.clone(), call.clone());
        StatCounters::bump(&self.counters.accepted);
        info!("✅ Agent {} accepted request {} as call {}", agent_id, request_id, call.call_id);

        let mut call = call;
        let hook = self.recording.read().clone();
        if let Some(hook) = hook {
            match hook.start_recording(&call).await {
                Ok(recording_id) => {
                    if let Some(mut stored) = self.calls.get_mut(&call.call_id) {
                        stored.recording_id = recording_id.clone();
                    }
                    call.recording_id = recording_id;
                }
                Err(e) => warn!("⚠️ Recording did not start for call {}: {}", call.call_id, e),
            }
        }

        self.send_agent(
            agent_id,
            ServerEvent::CallStarted(CallStartedPayload { call: call.clone() }),
        )
        .await;
        self.send_visitor(
            &call.visitor_id,
            VisitorEvent::CallAccepted(CallAcceptedPayload {
                call_id: call.call_id.clone(),
                agent_id: agent_id.clone(),
            }),
        )
        .await;
        self.reassign_visitors(agent_id, Some(&call.visitor_id), ReassignReason::AgentBusy)
            .await;

        Ok(call)
    }

    /// Handle `call:reject`. The offer moves to the next candidate.
    pub async fn reject(
        &self,
        agent_id: &AgentId,
        request_id: &RequestId,
        reason: Option<String>,
    ) -> Result<CallRequestState> {
        if !self.withdraw_offer(request_id, agent_id, OfferOutcome::Rejected, true) {
            return Err(CallCenterError::orchestration(format!(
                "request {} is not offered to agent {}",
                request_id, agent_id
            )));
        }
        StatCounters::bump(&self.counters.rejected);
        info!(
            "↩️ Agent {} rejected request {}{}",
            agent_id,
            request_id,
            reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
        );

        self.notify_withdrawn(agent_id, request_id, "rejected").await;
        Ok(self.offer_next(request_id).await)
    }

    /// Handle `call:cancel` from the visitor who made the request.
    pub async fn cancel(&self, visitor_id: &VisitorId, request_id: &RequestId) -> Result<()> {
        let Some((_, mut request)) = self
            .requests
            .remove_if(request_id, |_, r| &r.visitor.visitor_id == visitor_id)
        else {
            return Err(if self.requests.contains_key(request_id) {
                CallCenterError::validation(format!(
                    "request {} does not belong to visitor {}",
                    request_id, visitor_id
                ))
            } else {
                CallCenterError::not_found(format!("request {}", request_id))
            });
        };

        let offered = request.state.offered_to().cloned();
        if let Some(timer) = request.offer_timer.take() {
            timer.abort();
        }
        if let Some(agent_id) = &offered {
            request.record_outcome(agent_id, OfferOutcome::Withdrawn);
        }
        request.state = CallRequestState::Cancelled;
        drop(request);

        StatCounters::bump(&self.counters.cancelled);
        info!("🚫 Visitor {} cancelled request {}", visitor_id, request_id);

        if let Some(agent_id) = offered {
            self.registry.release_offer(&agent_id, request_id);
            self.notify_withdrawn(&agent_id, request_id, "cancelled").await;
        }
        Ok(())
    }

    /// End a connected call and notify both sides.
    pub async fn end_call(&self, call_id: &CallId, reason: CallEndReason) -> Result<ActiveCall> {
        self.finish_call(call_id, reason, true).await
    }

    // Queries

    pub fn request(&self, request_id: &RequestId) -> Option<RequestSnapshot> {
        self.requests.get(request_id).map(|r| RequestSnapshot::from(&*r))
    }

    pub fn active_call(&self, call_id: &CallId) -> Option<ActiveCall> {
        self.calls.get(call_id).map(|c| c.clone())
    }

    pub fn active_calls(&self) -> Vec<ActiveCall> {
        self.calls.iter().map(|c| c.value().clone()).collect()
    }

    pub fn stats(&self) -> CallCenterStats {
        CallCenterStats::from_counters(&self.counters, self.requests.len(), self.calls.len())
    }

    // Internals

    /// Offer the request to the next candidate that can still take it.
    async fn offer_next(&self, request_id: &RequestId) -> CallRequestState {
        loop {
            let step = {
                let Some(mut request) = self.requests.get_mut(request_id) else {
                    // Only a visitor cancel removes a request that is not offered.
                    return CallRequestState::Cancelled;
                };
                if request.state != CallRequestState::Requested {
                    OfferStep::Settled(request.state.clone())
                } else if let Some(candidate) = request.candidates.pop_front() {
                    request.tried.insert(candidate.agent_id.clone());
                    if self.registry.try_reserve_offer(&candidate.agent_id, request_id) {
                        let agent_id = candidate.agent_id.clone();
                        request.state = CallRequestState::Offered {
                            agent_id: agent_id.clone(),
                        };
                        request.attempts.push(OfferAttempt {
                            agent_id: agent_id.clone(),
                            offered_at: Utc::now(),
                            outcome: None,
                        });
                        request.offer_timer = Some(self.arm_offer_timer(request_id.clone(), agent_id.clone()));

                        info!(
                            "📞 Offering request {} to agent {} ({:?}, pool {})",
                            request_id, agent_id, candidate.tier, candidate.pool_id
                        );
                        let payload = CallIncomingPayload {
                            request: CallRequest {
                                request_id: request_id.clone(),
                                visitor_id: request.visitor.visitor_id.clone(),
                                agent_id: agent_id.clone(),
                                org_id: request.org_id.clone(),
                                page_url: request.visitor.page_url.clone(),
                                requested_at: request.requested_at,
                            },
                            visitor: request.visitor.clone(),
                        };
                        OfferStep::Dispatch { agent_id, payload }
                    } else {
                        StatCounters::bump(&self.counters.stale_skips);
                        OfferStep::Skip
                    }
                } else if !request.reresolved && self.config.routing.reresolve_when_stale {
                    request.reresolved = true;
                    OfferStep::Reresolve {
                        site_id: request.site_id.clone(),
                        page_url: request.visitor.page_url.clone(),
                        exclude: request.tried.clone(),
                    }
                } else {
                    OfferStep::Exhausted
                }
            };

            match step {
                OfferStep::Settled(state) => return state,
                OfferStep::Skip => continue,
                OfferStep::Reresolve {
                    site_id,
                    page_url,
                    exclude,
                } => {
                    let candidates: VecDeque<Candidate> =
                        match self.resolver.resolve(&site_id, &page_url, &exclude) {
                            Ok(outcome) => outcome.candidates().iter().cloned().collect(),
                            Err(e) => {
                                warn!("⚠️ Re-resolving request {} failed: {}", request_id, e);
                                VecDeque::new()
                            }
                        };
                    debug!(request_id = %request_id, count = candidates.len(), "Re-resolved candidates");
                    if let Some(mut request) = self.requests.get_mut(request_id) {
                        request.candidates = candidates;
                    }
                }
                OfferStep::Exhausted => return self.finish_unavailable(request_id).await,
                OfferStep::Dispatch { agent_id, payload } => {
                    StatCounters::bump(&self.counters.offers);
                    match self
                        .gateway
                        .send_to_agent(&agent_id, ServerEvent::CallIncoming(payload))
                        .await
                    {
                        Ok(()) => return self.confirm_dispatched(request_id, &agent_id).await,
                        Err(e) => {
                            warn!("⚠️ Offer to agent {} not delivered: {}", agent_id, e);
                            self.withdraw_offer(request_id, &agent_id, OfferOutcome::Withdrawn, true);
                        }
                    }
                }
            }
        }
    }

    /// Report the request state once `call:incoming` is out. A cancel that
    /// ran during the send already sent `call:cancelled`, which the offer
    /// may have overtaken, so the agent is told again.
    async fn confirm_dispatched(&self, request_id: &RequestId, agent_id: &AgentId) -> CallRequestState {
        if let Some(request) = self.requests.get(request_id) {
            return request.state.clone();
        }
        let accepted = self
            .calls
            .iter()
            .find(|c| &c.request_id == request_id)
            .map(|c| c.call_id.clone());
        if let Some(call_id) = accepted {
            return CallRequestState::Accepted { call_id };
        }

        debug!(request_id = %request_id, agent_id = %agent_id, "Request closed while the offer was in flight");
        self.notify_withdrawn(agent_id, request_id, "cancelled").await;
        CallRequestState::Cancelled
    }

    fn arm_offer_timer(&self, request_id: RequestId, agent_id: AgentId) -> JoinHandle<()> {
        let coordinator = self.self_ref.clone();
        let timeout = self.config.offers.offer_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.handle_offer_timeout(request_id, agent_id).await;
            }
        })
    }

    async fn handle_offer_timeout(&self, request_id: RequestId, agent_id: AgentId) {
        // Running inside the timer task, so the handle is dropped, not aborted.
        if !self.withdraw_offer(&request_id, &agent_id, OfferOutcome::TimedOut, false) {
            return;
        }
        StatCounters::bump(&self.counters.offer_timeouts);
        info!("⏰ Agent {} did not answer request {}", agent_id, request_id);

        self.notify_withdrawn(&agent_id, &request_id, "timeout").await;
        if self.config.offers.mark_away_on_no_answer {
            self.force_away(&agent_id, AwayReason::RingNoAnswer).await;
        }
        self.offer_next(&request_id).await;
    }

    /// Move a request offered to `agent_id` back to `Requested` and release
    /// the agent. Returns `false` if the request is not offered to them.
    fn withdraw_offer(
        &self,
        request_id: &RequestId,
        agent_id: &AgentId,
        outcome: OfferOutcome,
        abort_timer: bool,
    ) -> bool {
        {
            let Some(mut request) = self.requests.get_mut(request_id) else {
                return false;
            };
            if request.state.offered_to() != Some(agent_id) {
                return false;
            }
            if let Some(timer) = request.offer_timer.take() {
                if abort_timer {
                    timer.abort();
                }
            }
            request.state = CallRequestState::Requested;
            request.record_outcome(agent_id, outcome);
        }
        self.registry.release_offer(agent_id, request_id);
        true
    }

    async fn reroute_withdrawn(&self, request_id: &RequestId, agent_id: &AgentId, reason: &str) {
        if self.withdraw_offer(request_id, agent_id, OfferOutcome::Withdrawn, true) {
            info!("🔁 Re-routing request {} ({})", request_id, reason);
            self.notify_withdrawn(agent_id, request_id, reason).await;
            self.offer_next(request_id).await;
        }
    }

    async fn notify_withdrawn(&self, agent_id: &AgentId, request_id: &RequestId, reason: &str) {
        self.send_agent(
            agent_id,
            ServerEvent::CallCancelled(CallCancelledPayload {
                request_id: request_id.clone(),
                reason: Some(reason.to_string()),
            }),
        )
        .await;
    }

    /// Server-forced away. The client applies it without a round-trip.
    async fn force_away(&self, agent_id: &AgentId, reason: AwayReason) {
        if let Err(e) = self.registry.mark_away(agent_id, reason) {
            debug!(agent_id = %agent_id, error = %e, "Forced away skipped");
            return;
        }
        self.send_agent(
            agent_id,
            ServerEvent::AgentMarkedAway(AgentMarkedAwayPayload {
                reason,
                message: self.config.offers.no_answer_message.clone(),
            }),
        )
        .await;
    }

    async fn finish_unavailable(&self, request_id: &RequestId) -> CallRequestState {
        let Some((_, mut request)) = self.requests.remove(request_id) else {
            return CallRequestState::Cancelled;
        };
        request.state = CallRequestState::TimedOut;
        let visitor_id = request.visitor.visitor_id.clone();
        let tried = request.tried.len();
        drop(request);

        StatCounters::bump(&self.counters.unavailable);
        info!("🚫 No agent available for request {} after {} candidate(s)", request_id, tried);

        self.send_visitor(
            &visitor_id,
            VisitorEvent::AgentUnavailable(AgentUnavailablePayload {
                request_id: Some(request_id.clone()),
                message: self.config.offers.unavailable_message.clone(),
            }),
        )
        .await;
        CallRequestState::TimedOut
    }

    async fn finish_call(
        &self,
        call_id: &CallId,
        reason: CallEndReason,
        release_agent: bool,
    ) -> Result<ActiveCall> {
        let (_, mut call) = self
            .calls
            .remove(call_id)
            .ok_or_else(|| CallCenterError::not_found(format!("call {}", call_id)))?;
        call.ended_at = Some(Utc::now());

        if release_agent {
            if let Err(e) = self.registry.end_call(&call.agent_id, call_id) {
                warn!("⚠️ Agent {} not released from call {}: {}", call.agent_id, call_id, e);
            }
        }
        StatCounters::bump(&self.counters.calls_ended);
        info!("📴 Call {} ended ({:?})", call_id, reason);

        let ended = CallEndedPayload {
            call_id: call_id.clone(),
            reason,
            message: (reason == CallEndReason::AgentDeactivated)
                .then(|| AGENT_REMOVED_MESSAGE.to_string()),
        };
        self.send_agent(&call.agent_id, ServerEvent::CallEnded(ended.clone()))
            .await;
        self.send_visitor(&call.visitor_id, VisitorEvent::CallEnded(ended))
            .await;
        Ok(call)
    }

    async fn send_agent(&self, agent_id: &AgentId, event: ServerEvent) {
        let name = event.name();
        if let Err(e) = self.gateway.send_to_agent(agent_id, event).await {
            warn!("⚠️ {} not delivered to agent {}: {}", name, agent_id, e);
        }
    }

    pub(super) async fn send_visitor(&self, visitor_id: &VisitorId, event: VisitorEvent) {
        let name = event.name();
        if let Err(e) = self.gateway.send_to_visitor(visitor_id, event).await {
            warn!("⚠️ {} not delivered to visitor {}: {}", name, visitor_id, e);
        }
    }
}
