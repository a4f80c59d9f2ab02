//! Event names and typed envelopes

use super::payloads::*;
use crate::errors::types::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names as they appear on the wire.
pub mod names {
    pub const AGENT_AWAY: &str = "agent:away";
    pub const AGENT_BACK: &str = "agent:back";
    pub const AGENT_MARKED_AWAY: &str = "agent:marked_away";
    pub const AGENT_UNAVAILABLE: &str = "agent:unavailable";
    pub const AGENT_ASSIGNED: &str = "agent:assigned";
    pub const AGENT_REASSIGNED: &str = "agent:reassigned";
    pub const VISITOR_JOIN: &str = "visitor:join";
    pub const VISITOR_LEAVE: &str = "visitor:leave";
    pub const LOGIN_SUCCESS: &str = "login:success";

    pub const CALL_REQUEST: &str = "call:request";
    pub const CALL_INCOMING: &str = "call:incoming";
    pub const CALL_ACCEPT: &str = "call:accept";
    pub const CALL_REJECT: &str = "call:reject";
    pub const CALL_CANCEL: &str = "call:cancel";
    pub const CALL_CANCELLED: &str = "call:cancelled";
    pub const CALL_ACCEPTED: &str = "call:accepted";
    pub const CALL_STARTED: &str = "call:started";
    pub const CALL_END: &str = "call:end";
    pub const CALL_ENDED: &str = "call:ended";
}

/// Server to agent messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "call:incoming")]
    CallIncoming(CallIncomingPayload),
    #[serde(rename = "call:cancelled")]
    CallCancelled(CallCancelledPayload),
    #[serde(rename = "call:started")]
    CallStarted(CallStartedPayload),
    #[serde(rename = "call:ended")]
    CallEnded(CallEndedPayload),
    #[serde(rename = "agent:marked_away")]
    AgentMarkedAway(AgentMarkedAwayPayload),
    #[serde(rename = "login:success")]
    LoginSuccess(LoginSuccessPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CallIncoming(_) => names::CALL_INCOMING,
            ServerEvent::CallCancelled(_) => names::CALL_CANCELLED,
            ServerEvent::CallStarted(_) => names::CALL_STARTED,
            ServerEvent::CallEnded(_) => names::CALL_ENDED,
            ServerEvent::AgentMarkedAway(_) => names::AGENT_MARKED_AWAY,
            ServerEvent::LoginSuccess(_) => names::LOGIN_SUCCESS,
        }
    }

    /// Rebuild an event from a name and a raw payload, as delivered by
    /// transports that carry the two separately.
    pub fn from_parts(name: &str, data: Value) -> Result<Self> {
        Ok(match name {
            names::CALL_INCOMING => ServerEvent::CallIncoming(decode(data)?),
            names::CALL_CANCELLED => ServerEvent::CallCancelled(decode(data)?),
            names::CALL_STARTED => ServerEvent::CallStarted(decode(data)?),
            names::CALL_ENDED => ServerEvent::CallEnded(decode(data)?),
            names::AGENT_MARKED_AWAY => ServerEvent::AgentMarkedAway(decode(data)?),
            names::LOGIN_SUCCESS => ServerEvent::LoginSuccess(decode(data)?),
            other => return Err(Error::UnknownEvent(other.to_string())),
        })
    }
}

/// Server to visitor messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum VisitorEvent {
    #[serde(rename = "call:accepted")]
    CallAccepted(CallAcceptedPayload),
    #[serde(rename = "agent:unavailable")]
    AgentUnavailable(AgentUnavailablePayload),
    #[serde(rename = "call:ended")]
    CallEnded(CallEndedPayload),
    #[serde(rename = "agent:assigned")]
    AgentAssigned(AgentAssignedPayload),
    #[serde(rename = "agent:reassigned")]
    AgentReassigned(AgentReassignedPayload),
}

impl VisitorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VisitorEvent::CallAccepted(_) => names::CALL_ACCEPTED,
            VisitorEvent::AgentUnavailable(_) => names::AGENT_UNAVAILABLE,
            VisitorEvent::CallEnded(_) => names::CALL_ENDED,
            VisitorEvent::AgentAssigned(_) => names::AGENT_ASSIGNED,
            VisitorEvent::AgentReassigned(_) => names::AGENT_REASSIGNED,
        }
    }
}

/// Commands an agent client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    Away(AgentAwayPayload),
    Back,
    Accept(CallAcceptPayload),
    Reject(CallRejectPayload),
    End(CallEndPayload),
}

impl AgentCommand {
    pub fn parse(name: &str, data: Value) -> Result<Self> {
        Ok(match name {
            names::AGENT_AWAY => AgentCommand::Away(decode(data)?),
            names::AGENT_BACK => AgentCommand::Back,
            names::CALL_ACCEPT => AgentCommand::Accept(decode(data)?),
            names::CALL_REJECT => AgentCommand::Reject(decode(data)?),
            names::CALL_END => AgentCommand::End(decode(data)?),
            other => return Err(Error::UnknownEvent(other.to_string())),
        })
    }

    /// Whether the sender expects a [`StatusAck`].
    pub fn expects_ack(&self) -> bool {
        matches!(self, AgentCommand::Away(_) | AgentCommand::Back)
    }
}

/// Commands a visitor widget sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitorCommand {
    Join(VisitorJoinPayload),
    Leave(VisitorLeavePayload),
    Request(CallRequestPayload),
    Cancel(CallCancelPayload),
    End(CallEndPayload),
}

impl VisitorCommand {
    pub fn parse(name: &str, data: Value) -> Result<Self> {
        Ok(match name {
            names::VISITOR_JOIN => VisitorCommand::Join(decode(data)?),
            names::VISITOR_LEAVE => VisitorCommand::Leave(decode(data)?),
            names::CALL_REQUEST => VisitorCommand::Request(decode(data)?),
            names::CALL_CANCEL => VisitorCommand::Cancel(decode(data)?),
            names::CALL_END => VisitorCommand::End(decode(data)?),
            other => return Err(Error::UnknownEvent(other.to_string())),
        })
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    Ok(serde_json::from_value(data)?)
}
