//! Concurrency primitives behind [`crate::queue::BatchQueue`].
//!
//! The queue coordinates three kinds of actors: producers calling `add`, a single dispatch loop
//! that flushes partially filled backlogs, and one task per dispatched batch running the handler.
//! They communicate exclusively through the primitives in this module:
//!
//! - [`signal`] provides the coalescing wake signal producers use to restart the idle timer, and
//!   the one-shot latch used both to request shutdown and to report that the loop terminated.
//! - [`timer`] provides the re-armable idle timer the dispatch loop waits on.
//! - [`tracker`] counts handler invocations in flight so shutdown can wait for all of them
//!   without keeping a handle per task.

pub mod signal;
pub mod timer;
pub mod tracker;
