//! # Call Lifecycle Orchestration
//!
//! The orchestrator turns visitor requests into connected calls. It owns the
//! request table and the active calls, asks the routing resolver for ranked
//! candidates, and pushes offers to agents one at a time.
//!
//! ## Module Organization
//!
//! - **[`core`]**: [`CallCoordinator`], the offer loop, timers and agent removal
//! - **[`simulations`]**: which agent's simulated greeting each visitor watches,
//!   and moving visitors when their agent takes a call or goes offline
//! - **[`handler`]**: [`CommandHandler`], parsing inbound agent and visitor commands
//! - **[`gateway`]**: the [`SignalingGateway`] and [`RecordingHook`] seams, plus the
//!   in-process [`ChannelGateway`]
//! - **[`types`]**: request states, tickets and statistics
//!
//! ## Architecture
//!
//! ```text
//!   transport ──(name, json)──► CommandHandler ──► CallCoordinator
//!                                                    │     │
//!                                   RoutingResolver ◄┘     └► SignalingGateway
//!                                   AgentRegistry                 │
//!                                   PoolDirectory        agents ◄─┴─► visitors
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use greeter_call_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let gateway = Arc::new(ChannelGateway::default());
//! let coordinator = CallCoordinator::new(CallCenterConfig::default(), gateway.clone())?;
//!
//! coordinator.pools().add_pool(Pool::catch_all("everyone", "Everyone"))?;
//! coordinator.register_agent(Agent::new("alice", "Alice"))?;
//! coordinator.pools().add_member(&"everyone".into(), &"alice".into(), 1)?;
//! coordinator.resolver().upsert_site(SiteConfig::new("site-1"));
//!
//! let mut alice = gateway.connect_agent("alice");
//! coordinator.login(&"alice".into()).await?;
//!
//! let handler = CommandHandler::new(coordinator.clone());
//! let payload = serde_json::json!({
//!     "visitorId": "visitor-1",
//!     "siteId": "site-1",
//!     "pageUrl": "https://shop.example/pricing"
//! });
//! handler.handle_visitor(&"visitor-1".into(), "call:request", payload).await?;
//! # let _ = alice.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod gateway;
pub mod handler;
pub mod simulations;
pub mod types;

pub use self::core::CallCoordinator;
pub use gateway::{ChannelGateway, RecordingHook, SignalingGateway};
pub use handler::CommandHandler;
pub use types::{
    CallCenterStats, CallRequestState, OfferAttempt, OfferOutcome, Reassignment, RequestSnapshot,
    RequestTicket, VisitorAssignment,
};
