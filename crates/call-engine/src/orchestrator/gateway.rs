//! Outbound seams of the coordinator
//!
//! [`SignalingGateway`] delivers server events to connected agents and
//! visitors. [`RecordingHook`] is the optional collaborator that starts a
//! recording session when a call is accepted. [`ChannelGateway`] is the
//! in-process gateway backed by `tokio::sync::mpsc`, one channel per
//! connected participant.

use crate::error::{CallCenterError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use greeter_infra_common::protocol::{ActiveCall, AgentId, ServerEvent, VisitorEvent, VisitorId};
use tokio::sync::mpsc;
use tracing::debug;

#[async_trait]
pub trait SignalingGateway: Send + Sync {
    /// Deliver an event to one agent's connection.
    async fn send_to_agent(&self, agent_id: &AgentId, event: ServerEvent) -> Result<()>;

    /// Deliver an event to one visitor's connection.
    async fn send_to_visitor(&self, visitor_id: &VisitorId, event: VisitorEvent) -> Result<()>;
}

#[async_trait]
pub trait RecordingHook: Send + Sync {
    /// Start recording `call`. Returns the opaque recording id, if any.
    async fn start_recording(&self, call: &ActiveCall) -> Result<Option<String>>;
}

/// In-process gateway. Each participant gets a bounded receiver on connect.
pub struct ChannelGateway {
    capacity: usize,
    agents: DashMap<AgentId, mpsc::Sender<ServerEvent>>,
    visitors: DashMap<VisitorId, mpsc::Sender<VisitorEvent>>,
}

impl Default for ChannelGateway {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChannelGateway {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            agents: DashMap::new(),
            visitors: DashMap::new(),
        }
    }

    /// Attach an agent connection. A previous connection for the same agent
    /// is replaced and its receiver closes.
    pub fn connect_agent(&self, agent_id: impl Into<AgentId>) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.agents.insert(agent_id.into(), tx);
        rx
    }

    pub fn connect_visitor(&self, visitor_id: impl Into<VisitorId>) -> mpsc::Receiver<VisitorEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.visitors.insert(visitor_id.into(), tx);
        rx
    }

    pub fn disconnect_agent(&self, agent_id: &AgentId) -> bool {
        self.agents.remove(agent_id).is_some()
    }

    pub fn disconnect_visitor(&self, visitor_id: &VisitorId) -> bool {
        self.visitors.remove(visitor_id).is_some()
    }

    pub fn is_agent_connected(&self, agent_id: &AgentId) -> bool {
        self.agents
            .get(agent_id)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

#[async_trait]
impl SignalingGateway for ChannelGateway {
    async fn send_to_agent(&self, agent_id: &AgentId, event: ServerEvent) -> Result<()> {
        // Clone the sender so no map guard lives across the await.
        let tx = self
            .agents
            .get(agent_id)
            .map(|tx| tx.clone())
            .ok_or_else(|| CallCenterError::signaling(format!("agent {} is not connected", agent_id)))?;

        debug!(agent_id = %agent_id, event = event.name(), "Sending to agent");
        tx.send(event)
            .await
            .map_err(|_| CallCenterError::signaling(format!("agent {} connection closed", agent_id)))
    }

    async fn send_to_visitor(&self, visitor_id: &VisitorId, event: VisitorEvent) -> Result<()> {
        let tx = self
            .visitors
            .get(visitor_id)
            .map(|tx| tx.clone())
            .ok_or_else(|| {
                CallCenterError::signaling(format!("visitor {} is not connected", visitor_id))
            })?;

        debug!(visitor_id = %visitor_id, event = event.name(), "Sending to visitor");
        tx.send(event).await.map_err(|_| {
            CallCenterError::signaling(format!("visitor {} connection closed", visitor_id))
        })
    }
}
