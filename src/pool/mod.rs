//! # Fixed-size worker pool.
//!
//! [`WorkerPool`] runs queued jobs on a fixed set of workers, used by the
//! supervisor to start and stop every module in parallel.
//!
//! ```text
//! submit(job) ──► [ job queue ] ──► dispatcher ◄── idle workers
//!                                       │
//!                                       └──► worker k: job.await
//!
//! wait_all()  ──► completion counter reaches zero
//! release()   ──► dispatcher stops every worker, waits for each ack
//! ```
//!
//! ## Rules
//! - Worker count is fixed at construction and never resized.
//! - Each worker executes at most one job at a time.
//! - A job counts as complete when it finishes or is dropped unrun.

mod dispatcher;
mod worker;

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

use crate::error::PoolError;

/// A unit of work executed by a pool worker.
pub type Job = BoxFuture<'static, ()>;

/// Default worker count: one less than the available hardware parallelism,
/// capped at `queue_len`, never below one.
pub fn default_workers(queue_len: usize) -> usize {
    let hw = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    hw.saturating_sub(1).min(queue_len).max(1)
}

/// Outstanding-job counter used as a barrier.
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    async fn wait_zero(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the pending counter when dropped (job finished or discarded).
struct Completion(Arc<Pending>);

impl Completion {
    fn new(pending: &Arc<Pending>) -> Self {
        pending.count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(pending))
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Fixed pool of workers fed by a single dispatcher.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use modvisor::WorkerPool;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = WorkerPool::new(8);
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..8 {
///     let done = done.clone();
///     pool.submit(async move { done.fetch_add(1, Ordering::SeqCst); }).await.unwrap();
/// }
/// pool.wait_all().await;
/// assert_eq!(done.load(Ordering::SeqCst), 8);
/// pool.release().await;
/// # }
/// ```
pub struct WorkerPool {
    jobs: mpsc::Sender<Job>,
    pending: Arc<Pending>,
    workers: usize,
    released: AtomicBool,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Creates a pool with [`default_workers`] workers and a job queue of `queue_len`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(queue_len: usize) -> Self {
        Self::with_workers(default_workers(queue_len), queue_len)
    }

    /// Creates a pool with exactly `workers` workers (minimum 1).
    pub fn with_workers(workers: usize, queue_len: usize) -> Self {
        let workers = workers.max(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(queue_len.max(1));
        let (idle_tx, idle_rx) = mpsc::channel(workers);
        let (stop_tx, stop_rx) = oneshot::channel();

        for id in 0..workers {
            worker::spawn(id, idle_tx.clone());
        }
        drop(idle_tx);
        let dispatcher = tokio::spawn(dispatcher::dispatch(jobs_rx, idle_rx, workers, stop_rx));

        Self {
            jobs: jobs_tx,
            pending: Arc::new(Pending {
                count: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            workers,
            released: AtomicBool::new(false),
            stop: Mutex::new(Some(stop_tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of submitted jobs that have not completed yet.
    pub fn outstanding(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    fn wrap<F>(&self, job: F) -> Job
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let done = Completion::new(&self.pending);
        Box::pin(async move {
            job.await;
            drop(done);
        })
    }

    /// Enqueues a job, waiting only while the job queue is at capacity.
    pub async fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.released.load(Ordering::Acquire) {
            return Err(PoolError::Released);
        }
        let job = self.wrap(job);
        self.jobs.send(job).await.map_err(|_| PoolError::Released)
    }

    /// Enqueues a job without waiting.
    pub fn try_submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.released.load(Ordering::Acquire) {
            return Err(PoolError::Released);
        }
        let job = self.wrap(job);
        self.jobs.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PoolError::Full,
            mpsc::error::TrySendError::Closed(_) => PoolError::Released,
        })
    }

    /// Waits until every job submitted so far has completed.
    ///
    /// Returns immediately when nothing is outstanding.
    pub async fn wait_all(&self) {
        self.pending.wait_zero().await;
    }

    /// Stops the dispatcher and every worker, waiting for each to acknowledge.
    ///
    /// Jobs still queued are dropped. Calling it twice is a no-op.
    pub async fn release(&self) {
        self.released.store(true, Ordering::Release);
        let stop = self.stop.lock().expect("worker pool mutex poisoned").take();
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        let dispatcher = self
            .dispatcher
            .lock()
            .expect("worker pool mutex poisoned")
            .take();
        if let Some(handle) = dispatcher {
            let _ = handle.await;
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Ok(mut stop) = self.stop.lock() {
            if let Some(stop) = stop.take() {
                let _ = stop.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Barrier;

    const GUARD: Duration = Duration::from_secs(2);

    #[test]
    fn default_workers_is_bounded() {
        assert_eq!(default_workers(0), 1);
        assert_eq!(default_workers(1), 1);
        assert!(default_workers(1000) >= 1);
        assert!(default_workers(3) <= 3);
    }

    #[tokio::test]
    async fn wait_all_without_jobs_returns_immediately() {
        let pool = WorkerPool::new(4);
        tokio::time::timeout(Duration::from_millis(100), pool.wait_all())
            .await
            .unwrap();
        pool.release().await;
    }

    #[tokio::test]
    async fn wait_all_covers_every_submitted_job() {
        let pool = WorkerPool::with_workers(3, 20);
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..20u64 {
            let done = done.clone();
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(i % 4)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }
        tokio::time::timeout(GUARD, pool.wait_all()).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(pool.outstanding(), 0);
        pool.release().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn jobs_run_concurrently_across_workers() {
        let pool = WorkerPool::with_workers(4, 4);
        let barrier = Arc::new(Barrier::new(4));
        for _ in 0..4 {
            let barrier = barrier.clone();
            pool.submit(async move {
                barrier.wait().await;
            })
            .await
            .unwrap();
        }
        tokio::time::timeout(GUARD, pool.wait_all()).await.unwrap();
        pool.release().await;
    }

    #[tokio::test]
    async fn never_more_jobs_in_flight_than_workers() {
        let pool = WorkerPool::with_workers(2, 16);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            pool.submit(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }
        tokio::time::timeout(GUARD, pool.wait_all()).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        pool.release().await;
    }

    #[tokio::test]
    async fn try_submit_reports_full_queue() {
        let pool = WorkerPool::with_workers(1, 1);
        let gate = Arc::new(Notify::new());
        let mut saw_full = false;
        for _ in 0..10 {
            let gate = gate.clone();
            match pool.try_submit(async move { gate.notified().await }) {
                Ok(()) => tokio::task::yield_now().await,
                Err(PoolError::Full) => {
                    saw_full = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(saw_full);

        while pool.outstanding() > 0 {
            gate.notify_waiters();
            tokio::task::yield_now().await;
        }
        pool.release().await;
    }

    #[tokio::test]
    async fn released_pool_rejects_jobs() {
        let pool = WorkerPool::new(2);
        pool.release().await;
        pool.release().await;
        assert_eq!(pool.submit(async {}).await, Err(PoolError::Released));
        assert_eq!(pool.try_submit(async {}), Err(PoolError::Released));
    }
}
