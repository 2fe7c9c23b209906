//! The batching queue.
//!
//! # Flush triggers
//!
//! Items leave the backlog through three paths, all of which slice it from the front under the
//! backlog lock so that every accepted item ends up in exactly one batch:
//!
//! - **Capacity**: [`BatchQueue::add`] dispatches every full batch the new items complete before
//!   returning. Remainders stay buffered.
//! - **Timeout**: the dispatch loop drains the backlog once the flush interval elapses without
//!   producer activity. Every `add` restarts the interval.
//! - **Close**: [`BatchQueue::close`] (or dropping the last handle) makes the dispatch loop drain
//!   whatever is left and terminate.
//!
//! Each batch is handed to the handler on its own task, registered with an
//! [`InFlightTracker`] so that `close` can wait for all of them.

use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace};

use crate::concurrency::signal::{
    LatchRx, LatchTx, WakeRx, WakeTx, create_latch, create_wake_signal,
};
use crate::concurrency::timer::IdleTimer;
use crate::concurrency::tracker::InFlightTracker;
use crate::config::BatchConfig;
use crate::error::{BatcherError, BatcherResult};
use crate::handler::BatchHandler;
use crate::metrics::{
    BATCHER_BATCHES_DISPATCHED_TOTAL, BATCHER_HANDLER_PANICS_TOTAL,
    BATCHER_ITEMS_DISPATCHED_TOTAL, BATCHER_ITEMS_DROPPED_TOTAL, TRIGGER_LABEL,
};

/// Reason a batch was cut from the backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
    /// The backlog held at least a full batch.
    Capacity,
    /// The flush interval elapsed without producer activity.
    Timeout,
    /// The queue is shutting down.
    Close,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Capacity => "capacity",
            FlushTrigger::Timeout => "timeout",
            FlushTrigger::Close => "close",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Items accepted but not yet dispatched, together with the closed flag.
///
/// Both live under the same lock so a producer cannot observe the queue as open after `close`
/// started draining it.
#[derive(Debug)]
struct Backlog<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// State shared by producer handles and the dispatch loop.
struct Shared<T, H> {
    capacity: usize,
    interval: Duration,
    backlog: Mutex<Backlog<T>>,
    handler: Arc<H>,
    tracker: InFlightTracker,
    runtime: Handle,
}

impl<T, H> Shared<T, H>
where
    T: Send + 'static,
    H: BatchHandler<T>,
{
    fn lock_backlog(&self) -> MutexGuard<'_, Backlog<T>> {
        // The lock is never held across handler code, so a poisoned backlog is still consistent.
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatches every full batch at the front of the backlog.
    fn flush_full_batches(&self, backlog: &mut Backlog<T>) {
        while backlog.items.len() >= self.capacity {
            let batch = backlog.items.drain(..self.capacity).collect();
            self.dispatch(batch, FlushTrigger::Capacity);
        }
    }

    /// Dispatches the whole backlog in batches of at most `capacity` items.
    fn drain(&self, backlog: &mut Backlog<T>, trigger: FlushTrigger) {
        while !backlog.items.is_empty() {
            let len = backlog.items.len().min(self.capacity);
            let batch = backlog.items.drain(..len).collect();
            self.dispatch(batch, trigger);
        }
    }

    /// Launches one handler invocation for `batch` without waiting for it.
    fn dispatch(&self, batch: Vec<T>, trigger: FlushTrigger) {
        let batch_size = batch.len();

        counter!(BATCHER_BATCHES_DISPATCHED_TOTAL, TRIGGER_LABEL => trigger.as_str()).increment(1);
        counter!(BATCHER_ITEMS_DISPATCHED_TOTAL, TRIGGER_LABEL => trigger.as_str())
            .increment(batch_size as u64);
        debug!(batch_size, %trigger, "dispatching batch");

        // Registered before spawning so that `close` cannot miss an invocation that is about to
        // start.
        let guard = self.tracker.register();
        let handler = Arc::clone(&self.handler);

        self.runtime.spawn(async move {
            let _guard = guard;

            let result = AssertUnwindSafe(async { handler.handle_batch(batch).await })
                .catch_unwind()
                .await;

            if result.is_err() {
                counter!(BATCHER_HANDLER_PANICS_TOTAL).increment(1);
                error!(batch_size, %trigger, "batch handler panicked, batch was not processed");
            }
        });
    }

    /// Marks the queue closed and drains what is left. Used by the dispatch loop on shutdown.
    fn drain_for_close(&self) {
        let mut backlog = self.lock_backlog();
        backlog.closed = true;
        self.drain(&mut backlog, FlushTrigger::Close);
    }

    fn drain_for_timeout(&self) {
        let mut backlog = self.lock_backlog();
        self.drain(&mut backlog, FlushTrigger::Timeout);
    }

    fn is_closed_and_empty(&self) -> bool {
        let backlog = self.lock_backlog();
        backlog.closed && backlog.items.is_empty()
    }
}

/// State owned by producer handles only.
///
/// Dropping the last handle drops the wake and close senders, which the dispatch loop treats as a
/// close request.
struct QueueInner<T, H> {
    shared: Arc<Shared<T, H>>,
    wake_tx: WakeTx,
    close_tx: LatchTx,
    terminated_rx: LatchRx,
}

/// A concurrent queue that hands items to a [`BatchHandler`] in bounded batches.
///
/// The queue is a cheap handle: clones share the same backlog, dispatch loop and handler, and can
/// be moved to other tasks or threads. [`BatchQueue::add`] is synchronous and may be called from
/// outside the runtime; it only waits for the backlog lock, never for a handler.
///
/// Batches are dispatched concurrently, so the handler may observe them out of submission order.
/// Items within a batch keep the order in which they were appended to the backlog.
pub struct BatchQueue<T, H> {
    inner: Arc<QueueInner<T, H>>,
}

impl<T, H> BatchQueue<T, H>
where
    T: Send + 'static,
    H: BatchHandler<T>,
{
    /// Creates a queue and starts its dispatch loop on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, if `interval` is zero, or if called outside a tokio runtime.
    /// None of these can be recovered from by a caller holding a hard-coded configuration; use
    /// [`BatchQueue::try_new`] when the values come from user input.
    #[track_caller]
    pub fn new(capacity: usize, interval: Duration, handler: H) -> Self {
        match Self::try_new(capacity, interval, handler) {
            Ok(queue) => queue,
            Err(err) => panic!("cannot create batch queue: {err}"),
        }
    }

    /// Creates a queue from a [`BatchConfig`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration does not validate or if called outside a tokio runtime.
    #[track_caller]
    pub fn from_config(config: &BatchConfig, handler: H) -> Self {
        match Self::try_from_config(config, handler) {
            Ok(queue) => queue,
            Err(err) => panic!("cannot create batch queue: {err}"),
        }
    }

    /// Fallible variant of [`BatchQueue::from_config`].
    pub fn try_from_config(config: &BatchConfig, handler: H) -> BatcherResult<Self> {
        config.validate()?;

        Self::try_new(config.max_size, config.max_fill(), handler)
    }

    /// Fallible variant of [`BatchQueue::new`].
    pub fn try_new(capacity: usize, interval: Duration, handler: H) -> BatcherResult<Self> {
        if capacity == 0 {
            return Err(BatcherError::InvalidCapacity);
        }

        if interval.is_zero() {
            return Err(BatcherError::InvalidInterval);
        }

        let runtime = Handle::try_current().map_err(|_| BatcherError::NoRuntime)?;

        let shared = Arc::new(Shared {
            capacity,
            interval,
            backlog: Mutex::new(Backlog {
                items: VecDeque::new(),
                closed: false,
            }),
            handler: Arc::new(handler),
            tracker: InFlightTracker::new(),
            runtime: runtime.clone(),
        });

        let (wake_tx, wake_rx) = create_wake_signal();
        let (close_tx, close_rx) = create_latch();
        let (terminated_tx, terminated_rx) = create_latch();

        runtime.spawn(run_dispatch_loop(
            shared.clone(),
            wake_rx,
            close_rx,
            terminated_tx,
        ));

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        info!(capacity, interval_ms, "batch queue started");

        Ok(Self {
            inner: Arc::new(QueueInner {
                shared,
                wake_tx,
                close_tx,
                terminated_rx,
            }),
        })
    }

    /// Submits items to the queue.
    ///
    /// Items from one call are appended contiguously and in iteration order. Every full batch the
    /// new items complete is dispatched before this method returns; a partial remainder waits for
    /// the flush interval or for [`BatchQueue::close`].
    ///
    /// Submitting nothing is a no-op. Items submitted after the queue was closed are silently
    /// dropped.
    pub fn add<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            return;
        }

        let shared = &self.inner.shared;
        let mut backlog = shared.lock_backlog();

        if backlog.closed {
            drop(backlog);

            let dropped = items.count();
            counter!(BATCHER_ITEMS_DROPPED_TOTAL).increment(dropped as u64);
            trace!(dropped, "batch queue is closed, dropping submitted items");

            return;
        }

        backlog.items.extend(items);
        shared.flush_full_batches(&mut backlog);

        // Restarts the idle timer.
        self.inner.wake_tx.notify();
    }

    /// Submits a single item. See [`BatchQueue::add`].
    pub fn push(&self, item: T) {
        self.add(std::iter::once(item));
    }

    /// Closes the queue and waits until every accepted item was handled.
    ///
    /// After the first call, [`BatchQueue::add`] drops its input. The dispatch loop then drains the
    /// backlog into final batches and terminates, and this method returns once every handler
    /// invocation dispatched so far has returned.
    ///
    /// Calling `close` again, from any handle and concurrently or not, performs no second drain and
    /// simply waits for the same completion. There is no internal timeout: wrap the call in
    /// [`tokio::time::timeout`] to bound it, in which case handler tasks keep running in the
    /// background after the timeout fires.
    pub async fn close(&self) {
        {
            let mut backlog = self.inner.shared.lock_backlog();
            if !backlog.closed {
                backlog.closed = true;
                self.inner.close_tx.set();
                self.inner.wake_tx.notify();

                info!(pending = backlog.items.len(), "closing batch queue");
            }
        }

        let mut terminated_rx = self.inner.terminated_rx.clone();
        terminated_rx.wait().await;

        self.inner.shared.tracker.wait_idle().await;

        debug!("batch queue closed");
    }

    /// Returns the number of accepted items waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.inner.shared.lock_backlog().items.len()
    }

    /// Returns the number of handler invocations that have not returned yet.
    pub fn in_flight(&self) -> usize {
        self.inner.shared.tracker.in_flight()
    }

    /// Returns `true` once the queue stopped accepting items.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.lock_backlog().closed
    }

    /// Returns the maximum number of items per batch.
    pub fn capacity(&self) -> usize {
        self.inner.shared.capacity
    }

    /// Returns the idle interval after which a partial backlog is flushed.
    pub fn interval(&self) -> Duration {
        self.inner.shared.interval
    }
}

impl<T, H> Clone for BatchQueue<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, H> fmt::Debug for BatchQueue<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchQueue")
            .field("capacity", &self.inner.shared.capacity)
            .field("interval", &self.inner.shared.interval)
            .field("in_flight", &self.inner.shared.tracker.in_flight())
            .field("close_requested", &self.inner.close_tx.is_set())
            .finish_non_exhaustive()
    }
}

/// Long-lived loop flushing partial backlogs on timeout and draining on close.
///
/// Capacity flushes happen inline in `add`; this loop only guarantees that a backlog smaller than
/// a batch never waits indefinitely.
async fn run_dispatch_loop<T, H>(
    shared: Arc<Shared<T, H>>,
    mut wake_rx: WakeRx,
    mut close_rx: LatchRx,
    terminated_tx: LatchTx,
) where
    T: Send + 'static,
    H: BatchHandler<T>,
{
    let mut timer = IdleTimer::new(shared.interval);

    loop {
        if shared.is_closed_and_empty() {
            break;
        }

        tokio::select! {
            biased;

            // Also resolves when every handle was dropped without closing.
            _ = close_rx.wait() => {
                shared.drain_for_close();
                break;
            }
            wake = wake_rx.recv() => {
                if wake.is_none() {
                    shared.drain_for_close();
                    break;
                }

                timer.reset();
            }
            _ = &mut timer => {
                shared.drain_for_timeout();
                timer.reset();
            }
        }
    }

    terminated_tx.set();

    debug!("batch queue dispatch loop terminated");
}
