//! Core types for agent management

use chrono::{DateTime, Utc};
use greeter_infra_common::protocol::{
    AgentId, AgentStatus, AwayReason, CallId, OrgId, RequestId, VisitorId,
};
use serde::{Deserialize, Serialize};

/// Server-side agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub org_id: Option<OrgId>,
    pub status: AgentStatus,
    pub away_reason: Option<AwayReason>,
    /// `None` means no limit
    pub max_simultaneous_simulations: Option<u32>,
    /// Visitors currently watching this agent's simulated greeting
    pub simulations: Vec<VisitorId>,
    pub is_active: bool,
    /// Request currently offered to this agent
    pub pending_offer: Option<RequestId>,
    pub active_call: Option<CallId>,
    /// Order of registration, used by the registration-order tie-break
    pub registration_seq: u64,
    /// Monotonic stamp of the last offer, 0 when never offered
    pub last_assignment_seq: u64,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: impl Into<AgentId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            org_id: None,
            status: AgentStatus::Offline,
            away_reason: None,
            max_simultaneous_simulations: None,
            simulations: Vec::new(),
            is_active: true,
            pending_offer: None,
            active_call: None,
            registration_seq: 0,
            last_assignment_seq: 0,
            registered_at: Utc::now(),
        }
    }

    pub fn with_org(mut self, org_id: impl Into<OrgId>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_max_simulations(mut self, max: u32) -> Self {
        self.max_simultaneous_simulations = Some(max);
        self
    }

    pub fn current_simulations(&self) -> u32 {
        u32::try_from(self.simulations.len()).unwrap_or(u32::MAX)
    }

    pub fn has_capacity(&self) -> bool {
        match self.max_simultaneous_simulations {
            Some(max) => self.current_simulations() < max,
            None => true,
        }
    }

    /// Available status for an agent with no call: `InSimulation` while
    /// anyone watches, `Idle` otherwise.
    pub fn resting_status(&self) -> AgentStatus {
        if self.simulations.is_empty() {
            AgentStatus::Idle
        } else {
            AgentStatus::InSimulation
        }
    }

    /// Whether a call may be offered to this agent right now.
    pub fn is_eligible(&self) -> bool {
        self.is_active
            && self.status.is_available()
            && self.pending_offer.is_none()
            && self.active_call.is_none()
            && self.has_capacity()
    }

    /// Short reason used in logs when an agent is skipped.
    pub fn ineligibility(&self) -> Option<&'static str> {
        if !self.is_active {
            Some("deactivated")
        } else if !self.status.is_available() {
            Some(match self.status {
                AgentStatus::Away => "away",
                AgentStatus::InCall => "in call",
                _ => "offline",
            })
        } else if self.pending_offer.is_some() {
            Some("already ringing")
        } else if self.active_call.is_some() {
            Some("in call")
        } else if !self.has_capacity() {
            Some("at simulation capacity")
        } else {
            None
        }
    }
}
