//! A concurrent batching queue.
//!
//! [`BatchQueue`] accepts items from any number of producers and hands them to a
//! [`BatchHandler`] in groups of at most `capacity` items. A batch is dispatched as soon as the
//! backlog fills one, or when the flush interval elapses without new activity, whichever comes
//! first. [`BatchQueue::close`] stops intake, drains the backlog and waits for every handler
//! invocation to return.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use batcher::BatchQueue;
//!
//! # async fn run() {
//! let queue = BatchQueue::new(100, Duration::from_millis(250), |batch: Vec<String>| async move {
//!     println!("flushing {} events", batch.len());
//! });
//!
//! queue.push("event-1".to_string());
//! queue.add(vec!["event-2".to_string(), "event-3".to_string()]);
//!
//! queue.close().await;
//! # }
//! ```

pub mod concurrency;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod queue;

pub use error::{BatcherError, BatcherResult};
pub use handler::{BatchHandler, BlockingHandler, blocking};
pub use queue::{BatchQueue, FlushTrigger};
