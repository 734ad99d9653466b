//! Error types for job and queue operations.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
///
/// Configuration errors are raised synchronously by the job setters, before
/// anything reaches the store. Store errors are surfaced as they come back
/// from Redis and are never retried here.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Redis error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Store executor error (non-Redis backends)
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored record does not match the job encoding.
    #[error("Corrupted job record {id}: {reason}")]
    Corrupted { id: String, reason: String },

    /// Job id collides with the recurring namespace
    #[error("Job id {0:?} uses the reserved recurring prefix")]
    ReservedId(String),

    /// Job id cannot be encoded as a recurring id
    #[error("Invalid job id: {0}")]
    InvalidId(String),

    /// Interval expression could not be resolved to a positive millisecond count
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Recurring jobs are incompatible with remove-on-success/failure queues
    #[error("Recurring jobs cannot be used on a queue that removes jobs on success or failure")]
    RecurringWithAutoRemove,

    /// Retry count outside `0..=u32::MAX`
    #[error("Retries must be between 0 and {max}, got {0}", max = u32::MAX)]
    InvalidRetries(i64),

    /// Negative timeout
    #[error("Timeout cannot be negative: {0}")]
    InvalidTimeout(i64),

    /// Delay instant is not a valid timestamp
    #[error("Invalid delay timestamp: {0}")]
    InvalidDelay(String),

    /// Backoff strategy name is not registered
    #[error("Unknown backoff strategy: {0}")]
    UnknownBackoffStrategy(String),

    /// Backoff delay must be a positive integer
    #[error("Backoff delay must be a positive integer, got {0}")]
    InvalidBackoffDelay(i64),

    /// Progress value was null
    #[error("Progress must be a non-null value")]
    InvalidProgress,

    /// Operation needs a persisted job
    #[error("Job has no id; save it first")]
    NotSaved,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    /// Whether this error was raised by option validation.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ReservedId(_)
                | Self::InvalidId(_)
                | Self::InvalidInterval(_)
                | Self::RecurringWithAutoRemove
                | Self::InvalidRetries(_)
                | Self::InvalidTimeout(_)
                | Self::InvalidDelay(_)
                | Self::UnknownBackoffStrategy(_)
                | Self::InvalidBackoffDelay(_)
        )
    }

    /// Whether this error indicates unrecoverable store corruption.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
