//! Configuration objects for batching queues.

// Re-exports.
pub use batcher_config::shared::*;
