use std::future::Future;
use std::sync::Arc;

/// Trait for consumers of the batches produced by a [`crate::BatchQueue`].
///
/// Each dispatched batch results in exactly one call to [`BatchHandler::handle_batch`], driven on
/// its own task. Invocations for different batches may run concurrently and complete in any
/// order, so implementations must tolerate concurrent calls and must not rely on batches arriving
/// in submission order.
///
/// The queue does not observe the outcome of a batch. Handlers are expected to deal with their own
/// failures (log them, retry, forward them elsewhere); a panicking handler is contained and logged
/// by the queue but the batch is not redelivered. A handler that never completes keeps
/// [`crate::BatchQueue::close`] waiting forever.
///
/// Any `Fn(Vec<T>) -> impl Future<Output = ()>` closure is a handler. Synchronous procedures can be
/// adapted with [`blocking`].
pub trait BatchHandler<T>: Send + Sync + 'static {
    /// Processes one batch.
    ///
    /// The batch is never empty and never holds more than the queue's capacity.
    fn handle_batch(&self, batch: Vec<T>) -> impl Future<Output = ()> + Send;
}

impl<T, F, Fut> BatchHandler<T> for F
where
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn handle_batch(&self, batch: Vec<T>) -> impl Future<Output = ()> + Send {
        self(batch)
    }
}

/// Adapter running a synchronous procedure on tokio's blocking thread pool.
///
/// Use it for handlers that perform blocking I/O or heavy computation, so that slow batches do not
/// stall the async workers that run producers and the dispatch loop. The invocation still counts
/// as in flight until the procedure returns.
#[derive(Debug)]
pub struct BlockingHandler<F> {
    procedure: Arc<F>,
}

/// Wraps a synchronous `Fn(Vec<T>)` procedure into a [`BlockingHandler`].
pub fn blocking<T, F>(procedure: F) -> BlockingHandler<F>
where
    F: Fn(Vec<T>) + Send + Sync + 'static,
{
    BlockingHandler {
        procedure: Arc::new(procedure),
    }
}

impl<T, F> BatchHandler<T> for BlockingHandler<F>
where
    T: Send + 'static,
    F: Fn(Vec<T>) + Send + Sync + 'static,
{
    fn handle_batch(&self, batch: Vec<T>) -> impl Future<Output = ()> + Send {
        let procedure = Arc::clone(&self.procedure);

        async move {
            let result = tokio::task::spawn_blocking(move || procedure(batch)).await;

            // Re-raise on this task so the queue reports blocking and async failures alike.
            if let Err(err) = result
                && err.is_panic()
            {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn closures_are_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = seen.clone();
            move |batch: Vec<u32>| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().extend(batch);
                }
            }
        };

        handler.handle_batch(vec![1, 2]).await;
        handler.handle_batch(vec![3]).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_handler_runs_off_the_async_worker() {
        let caller = thread::current().id();
        let observed = Arc::new(Mutex::new(None));
        let handler = {
            let observed = observed.clone();
            blocking(move |batch: Vec<&'static str>| {
                *observed.lock().unwrap() = Some((thread::current().id(), batch));
            })
        };

        handler.handle_batch(vec!["a", "b"]).await;

        let (thread_id, batch) = observed.lock().unwrap().take().unwrap();
        assert_ne!(thread_id, caller);
        assert_eq!(batch, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn blocking_handler_propagates_panics() {
        let handler = blocking(|_batch: Vec<u8>| panic!("boom"));

        let result = std::panic::AssertUnwindSafe(handler.handle_batch(vec![1]))
            .catch_unwind()
            .await;

        assert!(result.is_err());
    }
}
