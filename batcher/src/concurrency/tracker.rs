//! Wait-group for handler invocations in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::gauge;
use tokio::sync::Notify;

use crate::metrics::BATCHER_HANDLERS_IN_FLIGHT;

#[derive(Debug, Default)]
struct TrackerInner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counts running handler invocations and lets shutdown wait until none are left.
///
/// An invocation is registered with [`InFlightTracker::register`] before its task is spawned and
/// deregistered when the returned guard drops, which also happens when the handler panics.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<TrackerInner>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one invocation and returns a guard that deregisters it on drop.
    pub fn register(&self) -> InFlightGuard {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        gauge!(BATCHER_HANDLERS_IN_FLIGHT).increment(1.0);

        InFlightGuard {
            inner: self.inner.clone(),
        }
    }

    /// Returns the number of registered invocations that have not completed.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Waits until no invocation is in flight.
    ///
    /// Returns immediately when the count is already zero. Invocations registered while waiting
    /// are waited for as well.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before reading the count so a concurrent release cannot be missed.
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }

            notified.await;
        }
    }
}

/// RAII guard for one in-flight invocation.
#[derive(Debug)]
pub struct InFlightGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(BATCHER_HANDLERS_IN_FLIGHT).decrement(1.0);

        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
