//! Errors raised when constructing a batching queue.
//!
//! Submission and shutdown never fail; the only failure mode of the queue is an invalid
//! construction request.

use batcher_config::shared::ValidationError;
use thiserror::Error;

/// Convenient result type for queue construction.
pub type BatcherResult<T> = Result<T, BatcherError>;

/// Reasons a queue cannot be constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatcherError {
    /// A queue that cannot hold a single item per batch has no valid behavior.
    #[error("batch capacity must be greater than 0")]
    InvalidCapacity,

    /// A zero interval would fire the flush timer continuously.
    #[error("flush interval must be greater than zero")]
    InvalidInterval,

    #[error("invalid batch configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    /// The dispatch loop and handler invocations need a tokio runtime to run on.
    #[error("a batch queue must be created from within a tokio runtime")]
    NoRuntime,
}
