//! # Agent Management
//!
//! Server-side agent records and the registry that owns them.
//!
//! - [`types`]: the [`Agent`] record and its routing eligibility rules
//! - [`registry`]: concurrent registry with atomic offer reservation
//!
//! Agents are never deleted. Deactivation keeps the record with
//! `is_active = false` so historical calls still resolve their agent.

pub mod registry;
pub mod types;

pub use registry::AgentRegistry;
pub use types::Agent;
