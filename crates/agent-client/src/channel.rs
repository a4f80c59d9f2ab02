//! # Reliable Command Channel
//!
//! Delivers acknowledged commands (`agent:away`, `agent:back`) over a
//! [`CommandTransport`] that may drop, reconnect, or stall.
//!
//! ## Delivery rules
//!
//! ```text
//!            ┌──────────────────┐
//!            │ CheckConnection  │◄──────────────────────────┐
//!            └───┬──────────┬───┘                           │
//!   disconnected │          │ connected                     │
//!     ┌──────────▼───┐  ┌───▼──────────┐                    │
//!     │ Reconnecting │  │ AwaitingAck  │── ack ok ──► Acknowledged
//!     └──────┬───────┘  └───┬──────────┘                    │
//!            │              │ ack false / timeout           │
//!            │              │ (attempts left)               │
//!            └──────► BackingOff (base × 2^attempt) ────────┘
//! ```
//!
//! - Disconnected and out of reconnect attempts: [`SendOutcome::NotConnected`].
//! - Connected but never positively acknowledged: [`SendOutcome::AssumedDelivered`].
//!   The command most likely reached the server and only the ack got lost, so
//!   the caller proceeds optimistically and marks its local state as pending.
//!
//! With the default [`RetryPolicy`] a command is emitted at most three times
//! and each emit waits five seconds for its acknowledgement.

use crate::config::RetryPolicy;
use crate::transport::{AckReceiver, CommandTransport};
use greeter_infra_common::protocol::StatusAck;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Result of a reliable send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The server positively acknowledged the command
    Acknowledged(StatusAck),
    /// Connected, but no positive acknowledgement after all attempts
    AssumedDelivered,
    /// Could not (re)connect within the allowed attempts
    NotConnected,
}

impl SendOutcome {
    /// Whether the caller should treat the command as delivered.
    pub fn is_success(&self) -> bool {
        !matches!(self, SendOutcome::NotConnected)
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SendOutcome::Acknowledged(_))
    }
}

enum RetryState {
    CheckConnection { attempt: u32 },
    Reconnecting { attempt: u32 },
    AwaitingAck { attempt: u32, ack: AckReceiver },
    BackingOff { attempt: u32 },
    Finished(SendOutcome),
}

pub struct ReliableCommandChannel {
    transport: Arc<dyn CommandTransport>,
    policy: RetryPolicy,
}

impl ReliableCommandChannel {
    pub fn new(transport: Arc<dyn CommandTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &Arc<dyn CommandTransport> {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `event` and wait for a positive acknowledgement, retrying per
    /// the channel's [`RetryPolicy`].
    pub async fn send(&self, event: &str, payload: Value) -> SendOutcome {
        let mut state = RetryState::CheckConnection { attempt: 0 };

        loop {
            state = match state {
                RetryState::CheckConnection { attempt } => {
                    if self.transport.is_connected() {
                        match self.transport.emit_with_ack(event, payload.clone()).await {
                            Ok(ack) => RetryState::AwaitingAck { attempt, ack },
                            Err(e) => {
                                warn!(event, attempt, error = %e, "Emit failed");
                                self.after_failed_attempt(event, attempt)
                            }
                        }
                    } else if attempt >= self.policy.max_retries {
                        warn!(event, attempts = attempt, "❌ Giving up, not connected");
                        RetryState::Finished(SendOutcome::NotConnected)
                    } else {
                        RetryState::Reconnecting { attempt }
                    }
                }

                RetryState::Reconnecting { attempt } => {
                    debug!(event, attempt, "Not connected, attempting reconnect");
                    if let Err(e) = self.transport.connect().await {
                        debug!(event, attempt, error = %e, "Reconnect failed");
                    }
                    RetryState::BackingOff { attempt }
                }

                RetryState::AwaitingAck { attempt, ack } => {
                    match timeout(self.policy.ack_timeout(), ack).await {
                        Ok(Ok(ack)) if ack.success => {
                            debug!(event, attempt, "Command acknowledged");
                            RetryState::Finished(SendOutcome::Acknowledged(ack))
                        }
                        Ok(Ok(ack)) => {
                            warn!(event, attempt, error = ?ack.error, "Command rejected by server");
                            self.after_failed_attempt(event, attempt)
                        }
                        Ok(Err(_)) => {
                            warn!(event, attempt, "Acknowledgement dropped");
                            self.after_failed_attempt(event, attempt)
                        }
                        Err(_) => {
                            warn!(
                                event,
                                attempt,
                                timeout_ms = self.policy.ack_timeout_ms,
                                "⏰ Acknowledgement timed out"
                            );
                            self.after_failed_attempt(event, attempt)
                        }
                    }
                }

                RetryState::BackingOff { attempt } => {
                    sleep(self.policy.backoff_delay(attempt)).await;
                    RetryState::CheckConnection {
                        attempt: attempt + 1,
                    }
                }

                RetryState::Finished(outcome) => return outcome,
            };
        }
    }

    /// Fire-and-forget emit, no retries.
    pub async fn emit(&self, event: &str, payload: Value) -> crate::ClientResult<()> {
        self.transport.emit(event, payload).await
    }

    fn after_failed_attempt(&self, event: &str, attempt: u32) -> RetryState {
        if attempt + 1 < self.policy.max_retries {
            RetryState::BackingOff { attempt }
        } else {
            info!(event, "Assuming delivery after unacknowledged attempts");
            RetryState::Finished(SendOutcome::AssumedDelivered)
        }
    }
}
