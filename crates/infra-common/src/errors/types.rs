use thiserror::Error;

/// Errors raised by shared infrastructure.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// A payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event name that is not part of the protocol
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// A status change the agent state model does not allow
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn logging<S: Into<String>>(msg: S) -> Self {
        Self::Logging(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
