//! Signaling primitives for the dispatch loop.
//!
//! Two kinds of signals are used. The wake signal is a single-slot, non-blocking channel: a send
//! either fills the slot or coalesces with the notification already pending, and a closed channel
//! tells the loop that every producer handle is gone. The latch is a monotonic flag backed by a
//! watch channel; setting it is idempotent and every receiver observes it, including receivers
//! cloned after it was set.

use tokio::sync::{mpsc, watch};
use tracing::trace;

/// Producer side of the wake signal.
#[derive(Debug, Clone)]
pub struct WakeTx(mpsc::Sender<()>);

impl WakeTx {
    /// Notifies the receiver without blocking.
    ///
    /// Returns `true` if a new notification was queued and `false` if it was coalesced with a
    /// pending one or the receiver is gone.
    pub fn notify(&self) -> bool {
        match self.0.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("wake signal coalesced with a pending one");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Receiver side of the wake signal.
pub type WakeRx = mpsc::Receiver<()>;

/// Creates a wake signal holding at most one pending notification.
pub fn create_wake_signal() -> (WakeTx, WakeRx) {
    let (tx, rx) = mpsc::channel(1);
    (WakeTx(tx), rx)
}

/// Setting side of a one-shot latch.
#[derive(Debug, Clone)]
pub struct LatchTx(watch::Sender<bool>);

impl LatchTx {
    /// Sets the latch.
    ///
    /// Returns `true` only for the call that actually flipped it. Setting an already set latch is
    /// a no-op and never blocks.
    pub fn set(&self) -> bool {
        !self.0.send_replace(true)
    }

    pub fn is_set(&self) -> bool {
        *self.0.borrow()
    }
}

/// Observing side of a one-shot latch.
#[derive(Debug, Clone)]
pub struct LatchRx(watch::Receiver<bool>);

impl LatchRx {
    /// Waits until the latch is set.
    ///
    /// Also resolves when every [`LatchTx`] was dropped, since the latch can no longer change.
    /// The future is cancel safe.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|set| *set).await;
    }
}

/// Creates an unset latch.
pub fn create_latch() -> (LatchTx, LatchRx) {
    let (tx, rx) = watch::channel(false);
    (LatchTx(tx), LatchRx(rx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn wake_signal_coalesces_pending_notifications() {
        let (tx, mut rx) = create_wake_signal();

        assert!(tx.notify());
        assert!(!tx.notify());
        assert!(!tx.notify());

        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err());

        // The slot is free again once the pending notification was consumed.
        assert!(tx.notify());
    }

    #[tokio::test]
    async fn wake_signal_reports_closed_when_producers_are_gone() {
        let (tx, mut rx) = create_wake_signal();
        drop(tx);

        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn latch_is_idempotent() {
        let (tx, mut rx) = create_latch();

        assert!(!tx.is_set());
        assert!(tx.set());
        assert!(!tx.set());
        assert!(tx.is_set());

        timeout(Duration::from_secs(1), rx.wait())
            .await
            .expect("latch wait should resolve once set");
    }

    #[tokio::test]
    async fn late_receivers_observe_a_set_latch() {
        let (tx, rx) = create_latch();
        tx.set();

        let mut late = rx.clone();
        timeout(Duration::from_secs(1), late.wait())
            .await
            .expect("latch wait should resolve immediately");
    }

    #[tokio::test]
    async fn waiters_are_released_when_the_latch_is_set() {
        let (tx, rx) = create_latch();

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let mut rx = rx.clone();
            waiters.push(tokio::spawn(async move { rx.wait().await }));
        }

        tx.set();

        for waiter in waiters {
            timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should be released")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn dropping_the_sender_releases_waiters() {
        let (tx, mut rx) = create_latch();
        drop(tx);

        timeout(Duration::from_secs(1), rx.wait())
            .await
            .expect("wait should resolve once the sender is gone");
    }
}
