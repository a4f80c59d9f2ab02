//! Error types for the agent client
//!
//! Errors are grouped so callers can pick a recovery strategy:
//!
//! - **Connection** errors are transient; the reliable command channel
//!   already retries them with backoff before anything reaches the caller.
//! - **State** errors mean the operation does not apply right now (no call
//!   ringing, already in a call). Check [`PresenceSnapshot`](crate::PresenceSnapshot) first.
//! - **Configuration** errors need a config fix and never recover on retry.
//! - **Notification** errors come from a single alert channel and are
//!   logged rather than returned from `start_ringing`.

use greeter_infra_common::protocol::AgentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not connected to signaling server")]
    NotConnected,

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Transport closed")]
    TransportClosed,

    #[error("No acknowledgement for {command} within {timeout_ms}ms")]
    AckTimeout { command: String, timeout_ms: u64 },

    #[error("No incoming call to {action}")]
    NoIncomingCall { action: &'static str },

    #[error("No active call")]
    NoActiveCall,

    #[error("Operation {operation} not allowed while {status}")]
    InvalidState {
        operation: &'static str,
        status: AgentStatus,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("{channel} notification failed: {reason}")]
    Notification { channel: &'static str, reason: String },

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Protocol error: {0}")]
    Protocol(#[from] greeter_infra_common::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub fn connection_failed<S: Into<String>>(reason: S) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    pub fn notification<S: Into<String>>(channel: &'static str, reason: S) -> Self {
        Self::Notification {
            channel,
            reason: reason.into(),
        }
    }

    pub fn invalid_configuration<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation later can succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::NotConnected
            | ClientError::ConnectionFailed { .. }
            | ClientError::AckTimeout { .. } => true,

            ClientError::InvalidConfiguration { .. }
            | ClientError::PermissionDenied
            | ClientError::Protocol(_)
            | ClientError::Serialization(_) => false,

            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ClientError::NotConnected
            | ClientError::ConnectionFailed { .. }
            | ClientError::TransportClosed
            | ClientError::AckTimeout { .. } => "connection",

            ClientError::NoIncomingCall { .. }
            | ClientError::NoActiveCall
            | ClientError::InvalidState { .. } => "state",

            ClientError::InvalidConfiguration { .. } => "configuration",

            ClientError::Notification { .. } | ClientError::PermissionDenied => "notification",

            ClientError::Protocol(_) | ClientError::Serialization(_) => "protocol",
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
