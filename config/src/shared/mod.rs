//! Shared configuration types for batching queues.

mod base;
mod batch;

pub use base::ValidationError;
pub use batch::BatchConfig;
