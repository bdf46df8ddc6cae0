//! Error types for verity-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A payload could not be encoded for the wire
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A payload arrived that does not match the expected wire shape
    #[error("Malformed payload on channel {channel}: {reason}")]
    MalformedPayload { channel: String, reason: String },

    /// Configuration failed to load or validate
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Failure raised by a host transition function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransitionError {
    message: String,
}

impl TransitionError {
    /// Create a transition error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure raised by a client prediction function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PredictionError {
    message: String,
}

impl PredictionError {
    /// Create a prediction error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}
