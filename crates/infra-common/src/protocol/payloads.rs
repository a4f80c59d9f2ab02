//! Event payloads
//!
//! Field names follow the JSON wire format (camelCase). Optional fields are
//! omitted when empty.

use super::ids::{AgentId, CallId, OrgId, RequestId, SiteId, VisitorId};
use super::status::{AgentStatus, AwayReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `agent:away` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAwayPayload {
    pub reason: AwayReason,
}

/// Acknowledgement for `agent:away` and `agent:back`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusAck {
    pub fn ok(status: AgentStatus) -> Self {
        Self {
            success: true,
            status: Some(status),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            error: Some(error.into()),
        }
    }
}

/// `agent:marked_away`: the server forced the agent away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMarkedAwayPayload {
    pub reason: AwayReason,
    pub message: String,
}

/// A visitor's request to talk to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub request_id: RequestId,
    pub visitor_id: VisitorId,
    /// Agent the request is currently offered to
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<OrgId>,
    pub page_url: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInfo {
    pub visitor_id: VisitorId,
    pub page_url: String,
    pub connected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<VisitorLocation>,
}

impl VisitorInfo {
    pub fn new(visitor_id: impl Into<VisitorId>, page_url: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            page_url: page_url.into(),
            connected_at: Utc::now(),
            location: None,
        }
    }
}

/// `call:request` from the visitor widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequestPayload {
    pub visitor_id: VisitorId,
    pub site_id: SiteId,
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<OrgId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<VisitorLocation>,
}

/// `call:incoming`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallIncomingPayload {
    pub request: CallRequest,
    pub visitor: VisitorInfo,
}

/// `call:accept`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptPayload {
    pub request_id: RequestId,
}

/// `call:reject`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRejectPayload {
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `call:cancel` from the visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallCancelPayload {
    pub request_id: RequestId,
}

/// `call:cancelled`: stop ringing for this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallCancelledPayload {
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCall {
    pub call_id: CallId,
    pub request_id: RequestId,
    pub visitor_id: VisitorId,
    pub agent_id: AgentId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
}

/// `call:started` (to the agent)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStartedPayload {
    pub call: ActiveCall,
}

/// `call:accepted` (to the visitor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptedPayload {
    pub call_id: CallId,
    pub agent_id: AgentId,
}

/// `call:end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndPayload {
    pub call_id: CallId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEndReason {
    AgentEnded,
    VisitorEnded,
    Timeout,
    Error,
    ReconnectFailed,
    MaxDuration,
    /// The agent was removed while connected
    AgentDeactivated,
}

/// `call:ended`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndedPayload {
    pub call_id: CallId,
    pub reason: CallEndReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `agent:unavailable`: nobody could take the visitor's call, or nobody
/// is free to host their simulation (no `requestId` then).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUnavailablePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    pub message: String,
}

/// `visitor:join`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorJoinPayload {
    pub visitor_id: VisitorId,
    pub site_id: SiteId,
    pub page_url: String,
}

/// `visitor:leave`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLeavePayload {
    pub visitor_id: VisitorId,
}

/// `agent:assigned`: the agent whose simulation the visitor now watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAssignedPayload {
    pub visitor_id: VisitorId,
    pub agent_id: AgentId,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignReason {
    /// The agent took a call
    AgentBusy,
    AgentOffline,
}

/// `agent:reassigned`: the visitor's simulation moved to another agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReassignedPayload {
    pub previous_agent_id: AgentId,
    pub new_agent_id: AgentId,
    pub display_name: String,
    pub reason: ReassignReason,
}

/// `login:success`: current server-side status after (re)connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccessPayload {
    pub agent_id: AgentId,
    pub status: AgentStatus,
}
