//! # Greeter Call Engine
//!
//! Server side of the live greeter stack: who may take a visitor's call, in
//! which order, and what happens to the call until it connects or gives up.
//!
//! ## Features
//!
//! - **Agent registry**: status, simulation capacity and soft deletion
//! - **Pools and tiers**: priority ranks mapped onto Primary, Standard and Backup
//! - **Path rules**: page URL to pool selection per embedded site
//! - **Routing resolver**: tiered candidate ordering with catch-all fallback
//! - **Call coordinator**: offers, timeouts, accept/reject/cancel and
//!   forced termination when an agent is removed
//! - **Visitor greetings**: simulation slots per agent, moved when the agent
//!   takes a call or goes offline
//!
//! ## Architecture
//!
//! - [`agent`]: agent records and the concurrent registry
//! - [`pool`]: pools, memberships and priority tiers
//! - [`routing`]: path rules and the routing resolver
//! - [`orchestrator`]: call coordinator, command handler and signaling seams
//! - [`config`]: TOML-backed configuration
//! - [`error`]: [`CallCenterError`] and the crate [`Result`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use greeter_call_engine::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     greeter_infra_common::setup_logging(LoggingConfig::default())?;
//!     greeter_infra_common::logging::setup::log_welcome("call-engine", env!("CARGO_PKG_VERSION"));
//!
//!     let config = CallCenterConfig::from_toml_file("call-center.toml")?;
//!     let gateway = Arc::new(ChannelGateway::default());
//!     let coordinator = CallCoordinator::new(config, gateway)?;
//!
//!     println!("{:?}", coordinator.stats());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod routing;

pub use config::CallCenterConfig;
pub use error::{CallCenterError, Result};
pub use orchestrator::{CallCoordinator, CommandHandler};

/// Commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentRegistry};
    pub use crate::config::{CallCenterConfig, OfferConfig, RoutingConfig, TieBreakPolicy};
    pub use crate::error::{CallCenterError, Result};
    pub use crate::orchestrator::{
        CallCenterStats, CallCoordinator, CallRequestState, ChannelGateway, CommandHandler,
        OfferOutcome, Reassignment, RecordingHook, RequestSnapshot, RequestTicket,
        SignalingGateway, VisitorAssignment,
    };
    pub use crate::pool::{Pool, PoolDirectory, PoolMembership, PriorityTier};
    pub use crate::routing::{PathRule, RoutingOutcome, RoutingResolver, SiteConfig};
    pub use greeter_infra_common::LoggingConfig;
}
