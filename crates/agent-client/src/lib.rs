//! # Greeter Agent Client
//!
//! Agent-side half of the live greeter signaling protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       AgentClient                         │
//! │  ┌─────────────────────┐  ┌───────────────────────────┐   │
//! │  │ PresenceStateMachine│  │  IncomingCallNotifier     │   │
//! │  │  away / back        │  │  ringtone · desktop ·     │   │
//! │  │  forced away        │  │  title flash · banner     │   │
//! │  └──────────┬──────────┘  └───────────────────────────┘   │
//! │  ┌──────────▼──────────┐  ┌───────────────────────────┐   │
//! │  │ReliableCommandChannel│ │  IdleTimer                │   │
//! │  └──────────┬──────────┘  └───────────────────────────┘   │
//! └─────────────┼─────────────────────────────────────────────┘
//!               │ CommandTransport
//!               ▼
//!          signaling server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use greeter_agent_client::{AgentClient, ChannelTransport, ClientConfig, NotificationSurfaces};
//! use greeter_infra_common::protocol::AwayReason;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _server) = ChannelTransport::pair();
//! let client = AgentClient::new(
//!     "agent-001",
//!     Arc::new(transport),
//!     NotificationSurfaces::headless(),
//!     ClientConfig::default(),
//! )?;
//!
//! let outcome = client.set_away(AwayReason::Manual).await?;
//! println!("away delivered: {}", outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod idle;
pub mod notify;
pub mod presence;
pub mod transport;

pub use channel::{ReliableCommandChannel, SendOutcome};
pub use client::AgentClient;
pub use config::{ClientConfig, NotificationConfig, RetryPolicy};
pub use error::{ClientError, ClientResult};
pub use idle::IdleTimer;
pub use notify::{IncomingCallNotifier, NotificationPermission, NotificationSurfaces};
pub use presence::{PresenceSnapshot, PresenceStateMachine};
pub use transport::{ChannelTransport, CommandTransport, OutboundCommand, ServerEndpoint};
