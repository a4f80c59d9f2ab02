//! Command transport abstraction
//!
//! The client never owns a socket directly. Anything that can report
//! connectivity, reconnect, and carry named JSON events with an optional
//! acknowledgement implements [`CommandTransport`]. [`ChannelTransport`] is the
//! in-process implementation: its [`ServerEndpoint`] half receives every
//! emitted command and answers acknowledgements through a oneshot.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use greeter_infra_common::protocol::StatusAck;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Resolves with the server's acknowledgement. Dropped senders mean the
/// acknowledgement will never arrive.
pub type AckReceiver = oneshot::Receiver<StatusAck>;

#[async_trait]
pub trait CommandTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Attempt to (re)establish the connection.
    async fn connect(&self) -> ClientResult<()>;

    /// Emit an event that expects a [`StatusAck`].
    async fn emit_with_ack(&self, event: &str, payload: Value) -> ClientResult<AckReceiver>;

    /// Emit a fire-and-forget event.
    async fn emit(&self, event: &str, payload: Value) -> ClientResult<()>;
}

/// A command as seen by the server side of a [`ChannelTransport`].
#[derive(Debug)]
pub struct OutboundCommand {
    pub event: String,
    pub payload: Value,
    ack: Option<oneshot::Sender<StatusAck>>,
}

impl OutboundCommand {
    pub fn expects_ack(&self) -> bool {
        self.ack.is_some()
    }

    /// Deliver the acknowledgement. Returns `false` when no ack was expected
    /// or the sender already stopped waiting.
    pub fn acknowledge(self, ack: StatusAck) -> bool {
        match self.ack {
            Some(tx) => tx.send(ack).is_ok(),
            None => false,
        }
    }

    /// Split the command so the ack can be answered later or never.
    pub fn into_parts(self) -> (String, Value, Option<oneshot::Sender<StatusAck>>) {
        (self.event, self.payload, self.ack)
    }
}

#[derive(Debug)]
struct LinkState {
    connected: AtomicBool,
    reconnectable: AtomicBool,
    connect_attempts: AtomicU32,
}

/// Handle for flipping the simulated link state from the server side.
#[derive(Debug, Clone)]
pub struct LinkControl {
    state: Arc<LinkState>,
}

impl LinkControl {
    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::SeqCst);
    }

    /// Whether `connect()` succeeds while the link is down.
    pub fn set_reconnectable(&self, reconnectable: bool) {
        self.state.reconnectable.store(reconnectable, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }
}

/// In-process transport backed by an unbounded mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    link: LinkControl,
    outbound: mpsc::UnboundedSender<OutboundCommand>,
}

/// Receiving half of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ServerEndpoint {
    pub link: LinkControl,
    inbound: mpsc::UnboundedReceiver<OutboundCommand>,
}

impl ServerEndpoint {
    pub async fn recv(&mut self) -> Option<OutboundCommand> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<OutboundCommand> {
        self.inbound.try_recv().ok()
    }
}

impl ChannelTransport {
    /// Create a connected transport and its server endpoint.
    pub fn pair() -> (Self, ServerEndpoint) {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = LinkControl {
            state: Arc::new(LinkState {
                connected: AtomicBool::new(true),
                reconnectable: AtomicBool::new(true),
                connect_attempts: AtomicU32::new(0),
            }),
        };
        (
            Self {
                link: link.clone(),
                outbound: tx,
            },
            ServerEndpoint { link, inbound: rx },
        )
    }

    pub fn link(&self) -> &LinkControl {
        &self.link
    }

    fn push(&self, command: OutboundCommand) -> ClientResult<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.outbound
            .send(command)
            .map_err(|_| ClientError::TransportClosed)
    }
}

#[async_trait]
impl CommandTransport for ChannelTransport {
    fn is_connected(&self) -> bool {
        self.link.state.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> ClientResult<()> {
        let state = &self.link.state;
        let attempt = state.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if state.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        if state.reconnectable.load(Ordering::SeqCst) && !self.outbound.is_closed() {
            state.connected.store(true, Ordering::SeqCst);
            debug!(attempt, "Channel transport reconnected");
            Ok(())
        } else {
            Err(ClientError::connection_failed("server endpoint unreachable"))
        }
    }

    async fn emit_with_ack(&self, event: &str, payload: Value) -> ClientResult<AckReceiver> {
        let (tx, rx) = oneshot::channel();
        self.push(OutboundCommand {
            event: event.to_string(),
            payload,
            ack: Some(tx),
        })?;
        Ok(rx)
    }

    async fn emit(&self, event: &str, payload: Value) -> ClientResult<()> {
        self.push(OutboundCommand {
            event: event.to_string(),
            payload,
            ack: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ack_round_trip() {
        let (transport, mut server) = ChannelTransport::pair();
        let ack_rx = transport
            .emit_with_ack("agent:back", Value::Null)
            .await
            .unwrap();

        let command = server.recv().await.unwrap();
        assert_eq!(command.event, "agent:back");
        assert!(command.expects_ack());
        assert!(command.acknowledge(StatusAck::ok(
            greeter_infra_common::protocol::AgentStatus::Idle
        )));

        assert!(ack_rx.await.unwrap().success);
    }

    #[tokio::test]
    async fn disconnected_link_refuses_emit_until_reconnect() {
        let (transport, server) = ChannelTransport::pair();
        server.link.set_connected(false);
        server.link.set_reconnectable(false);

        let err = transport.emit("call:end", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert!(transport.connect().await.is_err());

        server.link.set_reconnectable(true);
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(server.link.connect_attempts(), 2);
    }
}
