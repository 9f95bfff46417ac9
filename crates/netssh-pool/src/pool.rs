//! Bounded worker pool (C6): caps how many sessions run their blocking SSH
//! I/O concurrently, and rejects admission once the backlog is too deep
//! rather than growing it without bound. Grounded on the teacher's
//! `semaphore.rs`/`parallel_execution.rs` pair (bounded concurrency via a
//! semaphore, here `tokio::sync::Semaphore` guarding blocking worker
//! threads rather than reused async connections — connection reuse across
//! jobs is explicitly out of scope, §5).

use crate::error::DispatchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{instrument, trace};

/// Default worker count when a caller doesn't size the pool explicitly.
pub const DEFAULT_WORKERS: usize = 4;

/// Runs blocking session jobs on a bounded set of worker threads. The queue
/// capacity (admission limit, not a literal buffer) is `max(workers * 4, 64)`
/// per §5.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    queue_capacity: usize,
    inflight: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let queue_capacity = (workers * 4).max(64);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            queue_capacity,
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Runs `job` on a blocking worker thread once a permit is free. Rejects
    /// immediately, without waiting for a permit, once `inflight` already
    /// reached `queue_capacity` — this is the admission check, not a backoff.
    #[instrument(skip(self, job))]
    pub async fn run_job<F, R>(&self, job: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.inflight.load(Ordering::Relaxed) >= self.queue_capacity {
            return Err(DispatchError::QueueFull {
                capacity: self.queue_capacity,
            });
        }
        self.inflight.fetch_add(1, Ordering::Relaxed);
        trace!(target: "WorkerPool::run_job", inflight = self.inflight(), "admitted job");

        let semaphore = self.semaphore.clone();
        let result = async {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::PoolShuttingDown)?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            })
            .await
            .map_err(|_| DispatchError::PoolShuttingDown)
        }
        .await;

        self.inflight.fetch_sub(1, Ordering::Relaxed);
        result
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_job_and_returns_its_result() {
        let pool = WorkerPool::new(2);
        let result = pool.run_job(|| 1 + 1).await.unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn queue_capacity_is_at_least_64() {
        let pool = WorkerPool::new(1);
        assert_eq!(pool.queue_capacity(), 64);
        let pool = WorkerPool::new(32);
        assert_eq!(pool.queue_capacity(), 128);
    }

    #[tokio::test]
    async fn rejects_once_inflight_reaches_capacity() {
        let pool = Arc::new(WorkerPool::new(1));
        pool.inflight.store(pool.queue_capacity(), Ordering::Relaxed);
        let err = pool.run_job(|| 42).await.unwrap_err();
        assert!(matches!(err, DispatchError::QueueFull { .. }));
    }
}
