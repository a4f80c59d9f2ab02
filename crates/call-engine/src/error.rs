use greeter_infra_common::protocol::AgentStatus;
use thiserror::Error;

/// Call engine errors.
///
/// A visitor nobody can take is not an error: the resolver reports it as
/// [`RoutingOutcome::Exhausted`](crate::routing::RoutingOutcome::Exhausted).
#[derive(Error, Debug)]
pub enum CallCenterError {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Invalid status change for agent {agent_id}: {from} -> {to}")]
    InvalidStatus {
        agent_id: String,
        from: AgentStatus,
        to: AgentStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] greeter_infra_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CallCenterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(greeter_infra_common::Error::Serialization(err))
    }
}

impl CallCenterError {
    pub fn agent<S: Into<String>>(msg: S) -> Self {
        Self::Agent(msg.into())
    }

    pub fn pool<S: Into<String>>(msg: S) -> Self {
        Self::Pool(msg.into())
    }

    pub fn routing<S: Into<String>>(msg: S) -> Self {
        Self::Routing(msg.into())
    }

    pub fn orchestration<S: Into<String>>(msg: S) -> Self {
        Self::Orchestration(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn signaling<S: Into<String>>(msg: S) -> Self {
        Self::Signaling(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CallCenterError>;
