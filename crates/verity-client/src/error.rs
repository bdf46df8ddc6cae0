//! Error types for verity-client

use thiserror::Error;
use verity_core::{ActionId, PredictionError};

/// Client error type
#[derive(Debug, Error)]
pub enum Error {
    /// Too many actions awaiting acknowledgment
    #[error("Pending queue full, {capacity} actions awaiting acknowledgment")]
    PendingQueueFull { capacity: usize },

    /// The prediction function failed while folding the pending queue
    #[error("Prediction failed at action {action_id}: {source}")]
    Prediction {
        action_id: ActionId,
        #[source]
        source: PredictionError,
    },

    /// Core error (serialization, configuration)
    #[error(transparent)]
    Core(#[from] verity_core::Error),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
