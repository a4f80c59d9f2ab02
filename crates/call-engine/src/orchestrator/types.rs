//! # Orchestration Types
//!
//! State carried by the [`CallCoordinator`](super::CallCoordinator) for each
//! visitor request, plus the statistics it exposes.
//!
//! ## Request lifecycle
//!
//! ```text
//!  Requested ──offer──► Offered(agent) ──accept──► Accepted(call)
//!      ▲                    │
//!      └── reject/timeout ──┘        (candidates left)
//!
//!  Offered/Requested ──list exhausted──► TimedOut
//!  Offered/Requested ──visitor cancel──► Cancelled
//! ```
//!
//! A request leaves the coordinator's table as soon as it reaches a terminal
//! state. The terminal state is reported to the caller in a [`RequestTicket`].

use crate::routing::Candidate;
use chrono::{DateTime, Utc};
use greeter_infra_common::protocol::{AgentId, CallId, OrgId, RequestId, SiteId, VisitorId, VisitorInfo};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallRequestState {
    Requested,
    Offered { agent_id: AgentId },
    Accepted { call_id: CallId },
    /// Every candidate rejected, timed out or went stale
    TimedOut,
    Cancelled,
}

impl CallRequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallRequestState::Accepted { .. } | CallRequestState::TimedOut | CallRequestState::Cancelled
        )
    }

    pub fn offered_to(&self) -> Option<&AgentId> {
        match self {
            CallRequestState::Offered { agent_id } => Some(agent_id),
            _ => None,
        }
    }
}

/// How a single offer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferOutcome {
    Rejected,
    TimedOut,
    /// Pulled back because the agent went away, was removed or could not be
    /// reached
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAttempt {
    pub agent_id: AgentId,
    pub offered_at: DateTime<Utc>,
    pub outcome: Option<OfferOutcome>,
}

/// Result of [`request_call`](super::CallCoordinator::request_call).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub request_id: RequestId,
    pub state: CallRequestState,
}

/// A visitor request still being offered.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub request_id: RequestId,
    pub site_id: SiteId,
    pub org_id: Option<OrgId>,
    pub visitor: VisitorInfo,
    pub requested_at: DateTime<Utc>,
    pub state: CallRequestState,
    pub candidates: VecDeque<Candidate>,
    pub tried: HashSet<AgentId>,
    pub attempts: Vec<OfferAttempt>,
    pub reresolved: bool,
    pub offer_timer: Option<JoinHandle<()>>,
}

impl PendingRequest {
    pub fn record_outcome(&mut self, agent_id: &AgentId, outcome: OfferOutcome) {
        if let Some(attempt) = self
            .attempts
            .iter_mut()
            .rev()
            .find(|a| &a.agent_id == agent_id && a.outcome.is_none())
        {
            attempt.outcome = Some(outcome);
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if let Some(timer) = self.offer_timer.take() {
            timer.abort();
        }
    }
}

/// Where a visitor's simulated greeting comes from. `agent_id` is `None`
/// while the visitor waits for a free agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitorAssignment {
    pub visitor_id: VisitorId,
    pub agent_id: Option<AgentId>,
    pub site_id: SiteId,
    pub page_url: String,
}

/// Result of moving an agent's visitors elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reassignment {
    /// Visitor and the agent they now watch
    pub reassigned: Vec<(VisitorId, AgentId)>,
    /// Visitors left waiting for a free agent
    pub unassigned: Vec<VisitorId>,
}

impl Reassignment {
    pub fn is_empty(&self) -> bool {
        self.reassigned.is_empty() && self.unassigned.is_empty()
    }
}

/// Point-in-time view of a request, for dashboards and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    pub request_id: RequestId,
    pub visitor_id: VisitorId,
    pub state: CallRequestState,
    pub attempts: Vec<OfferAttempt>,
    pub remaining_candidates: usize,
}

impl From<&PendingRequest> for RequestSnapshot {
    fn from(request: &PendingRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            visitor_id: request.visitor.visitor_id.clone(),
            state: request.state.clone(),
            attempts: request.attempts.clone(),
            remaining_candidates: request.candidates.len(),
        }
    }
}

#[derive(Default)]
pub(crate) struct StatCounters {
    pub requests: AtomicU64,
    pub offers: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub offer_timeouts: AtomicU64,
    pub cancelled: AtomicU64,
    pub unavailable: AtomicU64,
    pub stale_skips: AtomicU64,
    pub forced_terminations: AtomicU64,
    pub calls_ended: AtomicU64,
    pub visitors_reassigned: AtomicU64,
}

impl StatCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Coordinator statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallCenterStats {
    pub requests: u64,
    pub offers: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub offer_timeouts: u64,
    pub cancelled: u64,
    /// Requests that found nobody, reported to the visitor as unavailable
    pub unavailable: u64,
    /// Candidates skipped because their snapshot went stale
    pub stale_skips: u64,
    /// Calls ended because the agent was removed
    pub forced_terminations: u64,
    pub calls_ended: u64,
    /// Visitors moved to another agent's simulation
    pub visitors_reassigned: u64,
    pub pending_requests: usize,
    pub active_calls: usize,
}

impl CallCenterStats {
    pub(crate) fn from_counters(counters: &StatCounters, pending_requests: usize, active_calls: usize) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Self {
            requests: load(&counters.requests),
            offers: load(&counters.offers),
            accepted: load(&counters.accepted),
            rejected: load(&counters.rejected),
            offer_timeouts: load(&counters.offer_timeouts),
            cancelled: load(&counters.cancelled),
            unavailable: load(&counters.unavailable),
            stale_skips: load(&counters.stale_skips),
            forced_terminations: load(&counters.forced_terminations),
            calls_ended: load(&counters.calls_ended),
            visitors_reassigned: load(&counters.visitors_reassigned),
            pending_requests,
            active_calls,
        }
    }

    /// Share of requests that ended with a connected call.
    pub fn answer_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.accepted as f64 / self.requests as f64
        }
    }
}
