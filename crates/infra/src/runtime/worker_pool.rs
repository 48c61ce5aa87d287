//! Bounded background execution

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use finsync_domain::{Result, SdkError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::callback_queue::CallbackQueue;

/// Completion handler invoked with the outcome of a background operation.
pub type Completion<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// Runs SDK operations on tokio tasks, at most `max_concurrency` at a time.
///
/// Operations beyond the limit wait for a permit inside their own task, so
/// submitting never blocks the caller.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    submitted: Arc<AtomicU64>,
}

impl WorkerPool {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            submitted: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Operations currently holding a permit.
    #[must_use]
    pub fn running(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }

    /// Total operations submitted since creation.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Run `operation` once a permit is free.
    pub fn spawn<F, T>(&self, operation: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let id = self.submitted.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!(id, "worker pool closed before the operation started");
                return None;
            };
            debug!(id, "worker started");
            Some(operation.await)
        })
    }

    /// Run `operation` and deliver its outcome to `completion` on `queue`.
    ///
    /// The completion always runs; on a closed pool it gets an error and the
    /// handle resolves to `None`.
    pub fn spawn_with_completion<F, T>(
        &self,
        operation: F,
        queue: &CallbackQueue,
        completion: Completion<T>,
    ) -> JoinHandle<Option<()>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let id = self.submitted.fetch_add(1, Ordering::Relaxed);
        let queue = queue.clone();
        tokio::spawn(async move {
            let (outcome, started) = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    debug!(id, "worker started");
                    (operation.await, Some(()))
                }
                Err(_) => {
                    warn!(id, "worker pool closed, failing the completion");
                    (Err(SdkError::Unknown("worker pool closed".into())), None)
                }
            };
            queue.post(move || completion(outcome));
            started
        })
    }

    /// Stop admitting new operations. Running ones finish normally.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_max_concurrency() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                pool.spawn(async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.submitted(), 10);
        assert_eq!(pool.running(), 0);
    }

    #[tokio::test]
    async fn closed_pool_skips_operations() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert_eq!(pool.spawn(async { 1 }).await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_pool_still_delivers_completion() {
        let pool = WorkerPool::new(1);
        let queue = CallbackQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let delivered = Arc::new(parking_lot::Mutex::new(None));
        pool.close();

        let operation_ran = ran.clone();
        let sink = delivered.clone();
        let handle = pool.spawn_with_completion(
            async move {
                operation_ran.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            },
            &queue,
            Box::new(move |result: Result<i32>| *sink.lock() = Some(result)),
        );

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(queue.drain(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(*delivered.lock(), Some(Err(SdkError::Unknown("worker pool closed".into()))));
    }
}
