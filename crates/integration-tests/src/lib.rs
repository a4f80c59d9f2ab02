//! # Greeter Integration Test Bed
//!
//! Runs the call engine and any number of agent clients in one process.
//! Agent commands travel over a [`ChannelTransport`] into the engine's
//! [`CommandHandler`]; server events travel back through the
//! [`ChannelGateway`] into [`AgentClient::run`].
//!
//! ```text
//!  AgentClient ──ChannelTransport──► serve_agent ──► CommandHandler
//!       ▲                                                 │
//!       └──────────── ChannelGateway ◄── CallCoordinator ◄┘
//! ```

use anyhow::Result;
use greeter_agent_client::{AgentClient, ChannelTransport, ClientConfig, NotificationSurfaces, ServerEndpoint};
use greeter_call_engine::prelude::*;
use greeter_infra_common::protocol::{AgentId, VisitorEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub struct TestBed {
    pub gateway: Arc<ChannelGateway>,
    pub coordinator: Arc<CallCoordinator>,
    pub handler: CommandHandler,
}

impl TestBed {
    pub fn new(config: CallCenterConfig) -> Result<Self> {
        let gateway = Arc::new(ChannelGateway::new(64));
        let coordinator = CallCoordinator::new(config, gateway.clone())?;
        let handler = CommandHandler::new(coordinator.clone());
        Ok(Self {
            gateway,
            coordinator,
            handler,
        })
    }

    /// Register an agent in `pool` at `rank` and connect a running client
    /// for them. The agent is logged in before this returns.
    pub async fn agent(&self, id: &str, pool: &str, rank: u32) -> Result<Arc<AgentClient>> {
        let agent_id = AgentId::from(id);
        self.coordinator.register_agent(Agent::new(id, id))?;
        self.coordinator.pools().add_member(&pool.into(), &agent_id, rank)?;

        let (transport, server) = ChannelTransport::pair();
        let client = Arc::new(AgentClient::new(
            id,
            Arc::new(transport),
            NotificationSurfaces::headless(),
            ClientConfig::default(),
        )?);

        let events = self.gateway.connect_agent(id);
        tokio::spawn({
            let client = client.clone();
            async move { client.run(events).await }
        });
        tokio::spawn(serve_agent(self.handler.clone(), agent_id.clone(), server));

        self.coordinator.login(&agent_id).await?;
        settle().await;
        Ok(client)
    }

    pub fn visitor(&self, id: &str) -> mpsc::Receiver<VisitorEvent> {
        self.gateway.connect_visitor(id)
    }
}

/// Feed one agent's commands into the handler and answer acks.
pub async fn serve_agent(handler: CommandHandler, agent_id: AgentId, mut server: ServerEndpoint) {
    while let Some(command) = server.recv().await {
        let (event, payload, ack_tx) = command.into_parts();
        let ack = handler.handle(&agent_id, &event, payload).await;
        if let (Some(ack), Some(tx)) = (ack, ack_tx) {
            if tx.send(ack).is_err() {
                debug!(agent_id = %agent_id, event = %event, "Ack receiver gone");
            }
        }
    }
}

/// Let spawned client and server tasks drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Collect every queued visitor event.
pub fn drain_visitor(rx: &mut mpsc::Receiver<VisitorEvent>) -> Vec<VisitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
