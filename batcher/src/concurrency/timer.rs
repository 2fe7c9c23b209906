//! Re-armable idle timer for the dispatch loop.
//!
//! [`IdleTimer`] is armed on creation and resolves once its interval has elapsed since the last
//! [`IdleTimer::reset`]. It is `Unpin`, so the loop can poll `&mut timer` inside `tokio::select!`
//! without extra pinning, and resetting reuses the inner [`Sleep`] instead of allocating a new one.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

/// Upper bound used when `now + interval` overflows [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A timer that fires after `interval` of inactivity.
///
/// Once fired, the timer stays ready until it is reset.
#[derive(Debug)]
pub struct IdleTimer {
    deadline: Pin<Box<Sleep>>,
    interval: Duration,
}

impl IdleTimer {
    /// Creates a timer armed to fire `interval` from now.
    pub fn new(interval: Duration) -> Self {
        Self {
            deadline: Box::pin(sleep(interval)),
            interval,
        }
    }

    /// Re-arms the timer to fire `interval` from now, discarding any pending expiration.
    pub fn reset(&mut self) {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.interval)
            .unwrap_or_else(|| now + FAR_FUTURE);

        self.deadline.as_mut().reset(deadline);
    }
}

impl Future for IdleTimer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().deadline.as_mut().poll(cx)
    }
}
