//! Queue Error Types

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No backend yielded an event; callers retry later
    #[error("Queue is empty")]
    Empty,

    #[error("Queue is full (max size: {max_size})")]
    QueueFull { max_size: usize },

    #[error("Queue '{queue}' is closed")]
    Closed { queue: String },

    #[error("Unknown queue type: {type_name}")]
    BackendNotFound { type_name: String },

    #[error("Queue type '{type_name}' could not be constructed: {cause}")]
    BackendConstructionFailed { type_name: String, cause: String },

    #[error("Queue '{queue}' failed during '{operation}': {cause}")]
    BackendOperationFailed {
        queue: String,
        operation: String,
        cause: String,
    },

    #[error("Invalid command '{entry}' in command filter '{filter}'")]
    InvalidCommandFilter { filter: String, entry: String },

    #[error("Invalid field key filter '{pattern}': {source}")]
    InvalidFieldFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Queue configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl QueueError {
    /// Whether this is the expected "nothing available" outcome
    pub fn is_empty(&self) -> bool {
        matches!(self, QueueError::Empty)
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
