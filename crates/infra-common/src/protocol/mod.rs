//! # Signaling Protocol
//!
//! Wire contract between agent clients, visitor widgets and the routing
//! server. Every payload is JSON with camelCase keys; events are addressed by
//! the string names in [`names`].
//!
//! ## Message flow
//!
//! ```text
//!  Agent client                     Server                      Visitor
//!  ────────────                     ──────                      ───────
//!                                     ◄──────── visitor:join ──────
//!                                     ───────── agent:assigned ───►
//!                                     ◄──────── call:request ──────
//!       ◄──────── call:incoming ──────
//!       ───────── call:accept ───────►
//!       ◄──────── call:started ───────  ───────── call:accepted ──►
//!
//!       ───────── agent:away ────────►   (acknowledged: StatusAck)
//!       ◄──────── agent:marked_away ──   (server forced, no ack)
//! ```
//!
//! Only `agent:away` and `agent:back` are acknowledged. Everything else is
//! fire-and-forget.

pub mod events;
pub mod ids;
pub mod payloads;
pub mod status;

pub use events::{names, AgentCommand, ServerEvent, VisitorCommand, VisitorEvent};
pub use ids::{AgentId, CallId, OrgId, PoolId, RequestId, SiteId, VisitorId};
pub use payloads::*;
pub use status::{AgentStatus, AwayReason};
