#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batcher::BatchHandler;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

/// Default timeout for notifications.
///
/// Most waits in these tests complete in milliseconds; the timeout only turns a hang into a failure.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// A [`Notify`] that fails the test instead of waiting forever.
#[derive(Clone)]
pub struct TimedNotify {
    notify: Arc<Notify>,
    timeout_duration: Duration,
}

impl TimedNotify {
    pub fn new(notify: Arc<Notify>) -> Self {
        Self {
            notify,
            timeout_duration: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Waits for the notification.
    ///
    /// # Panics
    ///
    /// Panics if the timeout elapses first.
    pub async fn notified(&self) {
        if timeout(self.timeout_duration, self.notify.notified())
            .await
            .is_err()
        {
            panic!(
                "test notification timed out after {:?}, the expected batches never arrived",
                self.timeout_duration
            );
        }
    }
}

impl fmt::Debug for TimedNotify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedNotify")
            .field("timeout_duration", &self.timeout_duration)
            .finish()
    }
}

type BatchCondition<T> = Box<dyn Fn(&[Vec<T>]) -> bool + Send + Sync>;

struct Inner<T> {
    batches: Vec<Vec<T>>,
    conditions: Vec<(BatchCondition<T>, Arc<Notify>)>,
}

impl<T> Inner<T> {
    fn check_conditions(&mut self) {
        let batches = &self.batches;
        self.conditions.retain(|(condition, notify)| {
            let satisfied = condition(batches);
            if satisfied {
                notify.notify_one();
            }
            !satisfied
        });
    }
}

/// Handler recording every batch it receives.
///
/// Optionally sleeps before recording, to simulate slow processing.
pub struct RecordingHandler<T> {
    inner: Arc<Mutex<Inner<T>>>,
    delay: Option<Duration>,
}

impl<T> Clone for RecordingHandler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            delay: self.delay,
        }
    }
}

impl<T: Clone + Send + 'static> RecordingHandler<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                batches: Vec::new(),
                conditions: Vec::new(),
            })),
            delay: None,
        }
    }

    /// Returns a handler sharing the same recordings that sleeps for `delay` per batch.
    pub fn with_delay(&self, delay: Duration) -> Self {
        Self {
            inner: self.inner.clone(),
            delay: Some(delay),
        }
    }

    pub fn batches(&self) -> Vec<Vec<T>> {
        self.inner.lock().unwrap().batches.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.batches().into_iter().flatten().collect()
    }

    /// Returns a notification fired once `condition` holds for the recorded batches.
    pub fn notify_on_batches<F>(&self, condition: F) -> TimedNotify
    where
        F: Fn(&[Vec<T>]) -> bool + Send + Sync + 'static,
    {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.lock().unwrap();
        inner.conditions.push((Box::new(condition), notify.clone()));
        // The condition may already hold.
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    /// Returns a notification fired once at least `count` items were recorded.
    pub fn wait_for_items(&self, count: usize) -> TimedNotify {
        self.notify_on_batches(move |batches| {
            batches.iter().map(Vec::len).sum::<usize>() >= count
        })
    }

    fn record(&self, batch: Vec<T>) {
        let mut inner = self.inner.lock().unwrap();
        inner.batches.push(batch);
        inner.check_conditions();
    }
}

impl<T: Clone + Send + 'static> BatchHandler<T> for RecordingHandler<T> {
    async fn handle_batch(&self, batch: Vec<T>) {
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        self.record(batch);
    }
}
