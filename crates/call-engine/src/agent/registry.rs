//! # Agent Registry
//!
//! Authoritative, concurrent store of [`Agent`] records.
//!
//! ## Offer reservation
//!
//! Routing works from a point-in-time snapshot, so by the time a call is
//! offered the chosen agent may have gone away, taken another call, or been
//! deactivated. [`AgentRegistry::try_reserve_offer`] re-checks eligibility and
//! records the pending offer under the agent's map entry lock, which makes
//! "is this agent still free?" and "mark them ringing" one atomic step. Two
//! concurrent requests can never both reserve the same agent.
//!
//! ## Status model
//!
//! ```text
//!  Offline ──login──► Idle ◄──────► Away
//!                      │  ▲
//!        simulations>0 ▼  │ simulations=0
//!                 InSimulation
//!                      │
//!          accept ─────┴────► InCall ──end──► Idle
//!                               ▲
//!                        forced ▼ away
//!                              Away
//! ```

use super::types::Agent;
use crate::error::{CallCenterError, Result};
use dashmap::DashMap;
use greeter_infra_common::protocol::{
    AgentId, AgentStatus, AwayReason, CallId, RequestId, VisitorId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub struct AgentRegistry {
    agents: DashMap<AgentId, Agent>,
    registration_seq: AtomicU64,
    assignment_seq: AtomicU64,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
            registration_seq: AtomicU64::new(0),
            assignment_seq: AtomicU64::new(0),
        }
    }

    /// Register a new agent. The record starts `Offline` until [`login`](Self::login).
    pub fn register(&self, mut agent: Agent) -> Result<AgentId> {
        let id = agent.id.clone();
        if self.agents.contains_key(&id) {
            return Err(CallCenterError::already_exists(format!("agent {}", id)));
        }

        agent.registration_seq = self.registration_seq.fetch_add(1, Ordering::SeqCst) + 1;
        agent.last_assignment_seq = 0;
        agent.pending_offer = None;
        agent.active_call = None;

        info!("👤 Registering agent: {} ({})", agent.display_name, id);
        self.agents.insert(id.clone(), agent);
        Ok(id)
    }

    /// Bring an agent online. An agent that was away stays away so the
    /// server-side status survives reconnects.
    pub fn login(&self, agent_id: &AgentId) -> Result<AgentStatus> {
        let mut agent = self.get_mut(agent_id)?;
        if !agent.is_active {
            return Err(CallCenterError::agent(format!(
                "agent {} is deactivated",
                agent_id
            )));
        }
        if agent.status == AgentStatus::Offline {
            agent.status = agent.resting_status();
        }
        info!("🟢 Agent {} logged in as {}", agent_id, agent.status);
        Ok(agent.status)
    }

    pub fn logout(&self, agent_id: &AgentId) -> Result<()> {
        let mut agent = self.get_mut(agent_id)?;
        agent.status = AgentStatus::Offline;
        agent.away_reason = None;
        info!("🔌 Agent {} logged out", agent_id);
        Ok(())
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Agent> {
        self.agents.get(agent_id).map(|a| a.clone())
    }

    pub fn status(&self, agent_id: &AgentId) -> Option<AgentStatus> {
        self.agents.get(agent_id).map(|a| a.status)
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.agents.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Snapshot of the given agents, skipping unknown ids.
    pub fn snapshot<'a>(&self, ids: impl IntoIterator<Item = &'a AgentId>) -> Vec<Agent> {
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.iter().map(|e| e.value().clone()).collect()
    }

    pub fn is_eligible(&self, agent_id: &AgentId) -> bool {
        self.agents
            .get(agent_id)
            .map(|a| a.is_eligible())
            .unwrap_or(false)
    }

    /// Mark the agent away. Any pending offer is left for the caller to
    /// withdraw; it is returned so the caller can re-route it.
    pub fn mark_away(&self, agent_id: &AgentId, reason: AwayReason) -> Result<Option<RequestId>> {
        let mut agent = self.get_mut(agent_id)?;
        self.check_transition(&agent, AgentStatus::Away)?;
        agent.status = AgentStatus::Away;
        agent.away_reason = Some(reason);
        info!("🟡 Agent {} marked away ({})", agent_id, reason);
        Ok(agent.pending_offer.clone())
    }

    /// Return an away agent to service. An agent forced away mid-call goes
    /// back to `InCall`.
    pub fn mark_back(&self, agent_id: &AgentId) -> Result<AgentStatus> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.status == AgentStatus::Away {
            agent.status = if agent.active_call.is_some() {
                AgentStatus::InCall
            } else {
                agent.resting_status()
            };
        } else {
            self.check_transition(&agent, AgentStatus::Idle)?;
        }
        agent.away_reason = None;
        info!("🟢 Agent {} back as {}", agent_id, agent.status);
        Ok(agent.status)
    }

    /// Start showing `visitor_id` the agent's simulated greeting.
    ///
    /// The capacity check and the insert happen under the agent's entry
    /// lock, so two visitors can never both take the last slot.
    pub fn assign_visitor(&self, agent_id: &AgentId, visitor_id: &VisitorId) -> Result<AgentStatus> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.simulations.contains(visitor_id) {
            return Ok(agent.status);
        }
        if !agent.is_active || !agent.status.is_available() {
            return Err(CallCenterError::agent(format!(
                "agent {} cannot host visitors while {}",
                agent_id, agent.status
            )));
        }
        if !agent.has_capacity() {
            return Err(CallCenterError::agent(format!(
                "agent {} is at simulation capacity",
                agent_id
            )));
        }

        agent.simulations.push(visitor_id.clone());
        if agent.status == AgentStatus::Idle {
            agent.status = AgentStatus::InSimulation;
        }
        debug!(
            agent_id = %agent_id,
            visitor_id = %visitor_id,
            count = agent.simulations.len(),
            "Visitor assigned"
        );
        Ok(agent.status)
    }

    /// Stop showing `visitor_id` the agent's simulation. Returns `false` if
    /// the visitor was not watching.
    pub fn release_visitor(&self, agent_id: &AgentId, visitor_id: &VisitorId) -> Result<bool> {
        let mut agent = self.get_mut(agent_id)?;
        let before = agent.simulations.len();
        agent.simulations.retain(|v| v != visitor_id);
        if agent.status == AgentStatus::InSimulation {
            agent.status = agent.resting_status();
        }
        Ok(agent.simulations.len() != before)
    }

    /// Detach every watching visitor except `keep` and return them.
    pub fn take_visitors(&self, agent_id: &AgentId, keep: Option<&VisitorId>) -> Vec<VisitorId> {
        let Some(mut agent) = self.agents.get_mut(agent_id) else {
            return Vec::new();
        };
        let (kept, taken): (Vec<_>, Vec<_>) = std::mem::take(&mut agent.simulations)
            .into_iter()
            .partition(|v| Some(v) == keep);
        agent.simulations = kept;
        if agent.status == AgentStatus::InSimulation {
            agent.status = agent.resting_status();
        }
        taken
    }

    /// Atomically re-check eligibility and reserve the agent for `request_id`.
    ///
    /// Returns `false` when the agent is unknown or no longer eligible.
    pub fn try_reserve_offer(&self, agent_id: &AgentId, request_id: &RequestId) -> bool {
        let Some(mut agent) = self.agents.get_mut(agent_id) else {
            return false;
        };
        if let Some(reason) = agent.ineligibility() {
            debug!(agent_id = %agent_id, reason, "Skipping stale routing candidate");
            return false;
        }
        agent.pending_offer = Some(request_id.clone());
        agent.last_assignment_seq = self.assignment_seq.fetch_add(1, Ordering::SeqCst) + 1;
        true
    }

    /// Clear a pending offer if it still belongs to `request_id`.
    pub fn release_offer(&self, agent_id: &AgentId, request_id: &RequestId) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(mut agent) if agent.pending_offer.as_ref() == Some(request_id) => {
                agent.pending_offer = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending_offer(&self, agent_id: &AgentId) -> Option<RequestId> {
        self.agents
            .get(agent_id)
            .and_then(|a| a.pending_offer.clone())
    }

    /// Move an agent holding the offer for `request_id` into a call.
    pub fn start_call(
        &self,
        agent_id: &AgentId,
        request_id: &RequestId,
        call_id: &CallId,
    ) -> Result<()> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.pending_offer.as_ref() != Some(request_id) {
            return Err(CallCenterError::agent(format!(
                "agent {} holds no offer for {}",
                agent_id, request_id
            )));
        }
        self.check_transition(&agent, AgentStatus::InCall)?;
        agent.pending_offer = None;
        agent.active_call = Some(call_id.clone());
        agent.status = AgentStatus::InCall;
        info!("📞 Agent {} now in call {}", agent_id, call_id);
        Ok(())
    }

    /// Release the agent from `call_id`. The agent returns to `Idle` unless
    /// it went offline in the meantime.
    pub fn end_call(&self, agent_id: &AgentId, call_id: &CallId) -> Result<AgentStatus> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.active_call.as_ref() != Some(call_id) {
            return Err(CallCenterError::agent(format!(
                "agent {} is not in call {}",
                agent_id, call_id
            )));
        }
        agent.active_call = None;
        if agent.status == AgentStatus::InCall {
            agent.status = agent.resting_status();
        }
        Ok(agent.status)
    }

    /// Soft-delete the agent. Returns the record as it was before, so the
    /// caller can clean up its offer or call.
    pub fn deactivate(&self, agent_id: &AgentId) -> Result<Agent> {
        let mut agent = self.get_mut(agent_id)?;
        let before = agent.clone();
        agent.is_active = false;
        agent.status = AgentStatus::Offline;
        agent.away_reason = None;
        agent.pending_offer = None;
        agent.active_call = None;
        info!("🗑️ Agent {} deactivated", agent_id);
        Ok(before)
    }

    fn get_mut(
        &self,
        agent_id: &AgentId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, AgentId, Agent>> {
        self.agents
            .get_mut(agent_id)
            .ok_or_else(|| CallCenterError::not_found(format!("agent {}", agent_id)))
    }

    fn check_transition(&self, agent: &Agent, to: AgentStatus) -> Result<()> {
        if agent.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(CallCenterError::InvalidStatus {
                agent_id: agent.id.to_string(),
                from: agent.status,
                to,
            })
        }
    }
}
