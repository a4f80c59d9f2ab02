//! Inbound command dispatch
//!
//! Transports hand raw `(event name, JSON payload)` pairs to a
//! [`CommandHandler`], which parses them and calls the coordinator. Only
//! `agent:away` and `agent:back` produce an acknowledgement; a malformed
//! payload for either yields a negative ack instead of an error.

use super::core::CallCoordinator;
use super::types::RequestTicket;
use crate::error::{CallCenterError, Result};
use greeter_infra_common::protocol::{
    names, AgentCommand, AgentId, CallEndReason, CallId, StatusAck, VisitorCommand, VisitorId,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CommandHandler {
    coordinator: Arc<CallCoordinator>,
}

impl CommandHandler {
    pub fn new(coordinator: Arc<CallCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<CallCoordinator> {
        &self.coordinator
    }

    /// Handle one command from an agent connection.
    ///
    /// Returns the acknowledgement to send back, if the command expects one.
    pub async fn handle(&self, agent_id: &AgentId, name: &str, payload: Value) -> Option<StatusAck> {
        let command = match AgentCommand::parse(name, payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("⚠️ Bad command {} from agent {}: {}", name, agent_id, e);
                return matches!(name, names::AGENT_AWAY | names::AGENT_BACK)
                    .then(|| StatusAck::failed(e.to_string()));
            }
        };
        debug!(agent_id = %agent_id, command = name, "Agent command");

        match command {
            AgentCommand::Away(away) => Some(self.coordinator.set_agent_away(agent_id, away.reason).await),
            AgentCommand::Back => Some(self.coordinator.set_agent_back(agent_id)),
            AgentCommand::Accept(accept) => {
                if let Err(e) = self.coordinator.accept(agent_id, &accept.request_id).await {
                    warn!("⚠️ Accept of {} by {} failed: {}", accept.request_id, agent_id, e);
                }
                None
            }
            AgentCommand::Reject(reject) => {
                if let Err(e) = self
                    .coordinator
                    .reject(agent_id, &reject.request_id, reject.reason)
                    .await
                {
                    warn!("⚠️ Reject of {} by {} failed: {}", reject.request_id, agent_id, e);
                }
                None
            }
            AgentCommand::End(end) => {
                if let Err(e) = self.end_as_agent(agent_id, &end.call_id).await {
                    warn!("⚠️ End of {} by {} failed: {}", end.call_id, agent_id, e);
                }
                None
            }
        }
    }

    /// Handle one command from a visitor connection.
    ///
    /// `call:request` returns the ticket for the new request. `visitor:leave`
    /// always acts on the connection's own visitor.
    pub async fn handle_visitor(
        &self,
        visitor_id: &VisitorId,
        name: &str,
        payload: Value,
    ) -> Result<Option<RequestTicket>> {
        match VisitorCommand::parse(name, payload)? {
            VisitorCommand::Join(join) => {
                if &join.visitor_id != visitor_id {
                    return Err(CallCenterError::validation(format!(
                        "visitor {} cannot join as {}",
                        visitor_id, join.visitor_id
                    )));
                }
                self.coordinator.assign_visitor(join).await?;
                Ok(None)
            }
            VisitorCommand::Leave(_) => {
                self.coordinator.release_visitor(visitor_id);
                Ok(None)
            }
            VisitorCommand::Request(request) => {
                if &request.visitor_id != visitor_id {
                    return Err(CallCenterError::validation(format!(
                        "visitor {} cannot request for {}",
                        visitor_id, request.visitor_id
                    )));
                }
                Ok(Some(self.coordinator.request_call(request).await?))
            }
            VisitorCommand::Cancel(cancel) => {
                self.coordinator.cancel(visitor_id, &cancel.request_id).await?;
                Ok(None)
            }
            VisitorCommand::End(end) => {
                let call = self
                    .coordinator
                    .active_call(&end.call_id)
                    .ok_or_else(|| CallCenterError::not_found(format!("call {}", end.call_id)))?;
                if &call.visitor_id != visitor_id {
                    return Err(CallCenterError::validation(format!(
                        "call {} does not belong to visitor {}",
                        end.call_id, visitor_id
                    )));
                }
                self.coordinator
                    .end_call(&end.call_id, CallEndReason::VisitorEnded)
                    .await?;
                Ok(None)
            }
        }
    }

    async fn end_as_agent(&self, agent_id: &AgentId, call_id: &CallId) -> Result<()> {
        let call = self
            .coordinator
            .active_call(call_id)
            .ok_or_else(|| CallCenterError::not_found(format!("call {}", call_id)))?;
        if &call.agent_id != agent_id {
            return Err(CallCenterError::validation(format!(
                "call {} does not belong to agent {}",
                call_id, agent_id
            )));
        }
        self.coordinator
            .end_call(call_id, CallEndReason::AgentEnded)
            .await?;
        Ok(())
    }
}
