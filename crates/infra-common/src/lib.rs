//! # Greeter Infrastructure Common
//!
//! Shared building blocks for the live greeter crates.
//!
//! - [`logging`]: `tracing` subscriber setup used by every binary and test harness
//! - [`errors`]: the crate-level error type for configuration and wire handling
//! - [`protocol`]: event names, payloads and the agent status model exchanged
//!   between agent clients and the routing server
//!
//! The protocol module is the contract between `greeter-agent-client` and
//! `greeter-call-engine`. Both sides serialize the same structs, so a payload
//! change here is a wire change.

pub mod errors;
pub mod logging;
pub mod protocol;

pub use errors::types::{Error, Result};
pub use logging::setup::{setup_logging, LoggingConfig};
