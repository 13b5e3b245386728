//! # Bounded single-consumer task executor.
//!
//! [`TaskExecutor`] is a fixed-capacity FIFO of work items served by one
//! processing loop, itself a [`CancellableTask`]. Modules use it to serialize
//! their internal work.
//!
//! ```text
//! submit / submit_blocking ──► [ mpsc queue (capacity N) ] ──► processing loop
//!                                                                 │ one item at a time
//! terminate() ──► cancel loop ──► drain queued items ──► Stopped  ▼
//! abandon()   ──► cancel loop ──► discard queued items ─► Stopped
//! ```
//!
//! ## Lifecycle
//! `Created → Running → Stopping → Stopped`. Work can be queued while `Created`;
//! it runs once [`run`](TaskExecutor::run) is called.
//!
//! ## Rules
//! - `submit` fails with `QueueFull` exactly when `capacity` items are queued and the
//!   executor is not stopping; once stopping it fails with `Stopped`.
//! - The item being executed is no longer counted as queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::tasks::cancellable::{CancelHandle, CancellableTask};

/// A deferred unit of work.
pub type WorkItem = BoxFuture<'static, ()>;

/// Callback receiving queue occupancy as a percentage of capacity.
pub type MonitorFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Executor lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ExecutorState {
    /// Built, processing loop not running yet.
    Created = 0,
    /// Processing loop running.
    Running = 1,
    /// Shutdown requested; queued items are being drained or discarded.
    Stopping = 2,
    /// Processing loop finished.
    Stopped = 3,
}

impl ExecutorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ExecutorState::Created,
            1 => ExecutorState::Running,
            2 => ExecutorState::Stopping,
            _ => ExecutorState::Stopped,
        }
    }
}

struct Shared {
    state: AtomicU8,
    abandon: AtomicBool,
}

impl Shared {
    fn state(&self) -> ExecutorState {
        ExecutorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves to `next` only forward; returns the previous state.
    fn advance(&self, next: ExecutorState) -> ExecutorState {
        let prev = self.state.fetch_max(next as u8, Ordering::AcqRel);
        ExecutorState::from_u8(prev)
    }
}

/// Fixed-capacity FIFO work queue with one processing loop.
pub struct TaskExecutor {
    tx: mpsc::Sender<WorkItem>,
    shared: Arc<Shared>,
    worker: CancellableTask,
    monitor: Option<CancellableTask>,
}

impl TaskExecutor {
    /// Creates an executor whose queue holds at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<WorkItem>(capacity.max(1));
        let shared = Arc::new(Shared {
            state: AtomicU8::new(ExecutorState::Created as u8),
            abandon: AtomicBool::new(false),
        });

        let loop_shared = Arc::clone(&shared);
        let worker = CancellableTask::new(move |cancel| process(rx, cancel, loop_shared));

        Self {
            tx,
            shared,
            worker,
            monitor: None,
        }
    }

    /// Reports queue occupancy (percent of capacity) to `callback` every `period`
    /// while the executor is running.
    pub fn with_monitor<F>(mut self, period: Duration, callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let callback: MonitorFn = Arc::new(callback);
        let tx = self.tx.clone();
        self.monitor = Some(CancellableTask::new(move |cancel| async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => callback(occupancy(&tx)),
                }
            }
        }));
        self
    }

    /// Starts the processing loop (and the monitor, if any).
    pub fn run(&self) {
        let _ = self.shared.state.compare_exchange(
            ExecutorState::Created as u8,
            ExecutorState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.worker.execute();
        if let Some(monitor) = &self.monitor {
            monitor.execute();
        }
    }

    /// Signals shutdown; already queued items are executed before the loop finishes.
    pub fn terminate(&self) {
        let prev = self.shared.advance(ExecutorState::Stopping);
        if let Some(monitor) = &self.monitor {
            monitor.request_cancellation();
        }
        self.worker.request_cancellation();
        if prev == ExecutorState::Created {
            // never ran: let the loop observe the stop and drain
            self.worker.execute();
        }
    }

    /// Signals shutdown and discards queued-but-unrun items.
    pub fn abandon(&self) {
        self.shared.abandon.store(true, Ordering::Release);
        self.terminate();
    }

    /// [`terminate`](Self::terminate), then waits for the processing loop to finish.
    pub async fn terminate_and_wait(&self) {
        self.terminate();
        self.worker.wait().await;
    }

    /// [`abandon`](Self::abandon), then waits for the processing loop to finish.
    pub async fn abandon_and_wait(&self) {
        self.abandon();
        self.worker.wait().await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExecutorState {
        self.shared.state()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of queued (not yet started) items.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue occupancy as a percentage of capacity.
    pub fn occupancy(&self) -> u8 {
        occupancy(&self.tx)
    }

    fn is_stopping(&self) -> bool {
        self.shared.state() >= ExecutorState::Stopping
    }

    /// Queues `work` without waiting.
    pub fn submit<F>(&self, name: &str, work: F) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_stopping() {
            return Err(ExecutorError::Stopped);
        }
        self.tx.try_send(Box::pin(work)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExecutorError::QueueFull {
                name: name.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => ExecutorError::Stopped,
        })
    }

    /// Queues `work`, waiting for room unless `cancel` fires first.
    pub async fn submit_blocking<F>(
        &self,
        cancel: &CancellationToken,
        name: &str,
        work: F,
    ) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_stopping() {
            return Err(ExecutorError::Stopped);
        }
        if self.tx.capacity() == 0 {
            tracing::warn!(task = name, "tasks queue is full, execution may be delayed");
        }
        let item: WorkItem = Box::pin(work);
        tokio::select! {
            res = self.tx.send(item) => res.map_err(|_| ExecutorError::Stopped),
            _ = cancel.cancelled() => Err(ExecutorError::Canceled { name: name.to_string() }),
        }
    }

    /// Queues `work` and waits until it has run.
    pub async fn submit_and_wait<F>(&self, name: &str, work: F) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(name, async move {
            work.await;
            let _ = done_tx.send(());
        })?;
        done_rx.await.map_err(|_| ExecutorError::Stopped)
    }

    /// Queues `work`, waits until it has run and propagates its result.
    pub async fn submit_and_wait_for_error<F, T>(&self, name: &str, work: F) -> Result<T, ExecutorError>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(name, async move {
            let _ = done_tx.send(work.await);
        })?;
        match done_rx.await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(error)) => Err(ExecutorError::Failed {
                name: name.to_string(),
                error,
            }),
            Err(_) => Err(ExecutorError::Stopped),
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shared.advance(ExecutorState::Stopping);
    }
}

fn occupancy(tx: &mpsc::Sender<WorkItem>) -> u8 {
    let max = tx.max_capacity();
    let used = max - tx.capacity();
    ((used * 100) / max) as u8
}

async fn process(mut rx: mpsc::Receiver<WorkItem>, cancel: CancelHandle, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(work) => work.await,
                None => break,
            },
        }
    }

    rx.close();
    let abandon = shared.abandon.load(Ordering::Acquire);
    while let Ok(work) = rx.try_recv() {
        if !abandon {
            work.await;
        }
    }
    shared.advance(ExecutorState::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const GUARD: Duration = Duration::from_secs(2);

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn runs_items_in_fifo_order() {
        let exec = TaskExecutor::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = seen.clone();
            exec.submit("push", async move { seen.lock().unwrap().push(i) })
                .unwrap();
        }
        exec.run();
        assert_eq!(exec.state(), ExecutorState::Running);
        exec.submit_and_wait("barrier", async {}).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);

        exec.terminate_and_wait().await;
        assert_eq!(exec.state(), ExecutorState::Stopped);
    }

    #[tokio::test]
    async fn queue_full_exactly_at_capacity() {
        let exec = TaskExecutor::new(2);
        exec.submit("a", async {}).unwrap();
        assert_eq!(exec.len(), 1);
        exec.submit("b", async {}).unwrap();
        assert_eq!(exec.occupancy(), 100);

        let err = exec.submit("c", async {}).unwrap_err();
        assert!(matches!(err, ExecutorError::QueueFull { ref name } if name == "c"));

        exec.terminate();
        let err = exec.submit("d", async {}).unwrap_err();
        assert!(matches!(err, ExecutorError::Stopped));
    }

    #[tokio::test]
    async fn terminate_drains_queued_items() {
        let exec = TaskExecutor::new(4);
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            exec.submit("count", counting(&runs)).unwrap();
        }
        tokio::time::timeout(GUARD, exec.terminate_and_wait())
            .await
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(exec.state(), ExecutorState::Stopped);
    }

    #[tokio::test]
    async fn abandon_discards_queued_items() {
        let exec = TaskExecutor::new(4);
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            exec.submit("count", counting(&runs)).unwrap();
        }
        tokio::time::timeout(GUARD, exec.abandon_and_wait())
            .await
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(exec.state(), ExecutorState::Stopped);
    }

    #[tokio::test]
    async fn submit_and_wait_for_error_propagates() {
        let exec = TaskExecutor::new(4);
        exec.run();

        let v = exec
            .submit_and_wait_for_error("ok", async { Ok::<_, anyhow::Error>(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);

        let err = exec
            .submit_and_wait_for_error("bad", async { Err::<(), _>(anyhow::anyhow!("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "task bad failed: boom");
        exec.terminate_and_wait().await;
    }

    #[tokio::test]
    async fn submit_blocking_gives_up_on_cancel() {
        let exec = TaskExecutor::new(1);
        exec.submit("fill", async {}).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(GUARD, exec.submit_blocking(&cancel, "late", async {}))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Canceled { .. }));
    }

    #[tokio::test]
    async fn submit_blocking_waits_for_room() {
        let exec = Arc::new(TaskExecutor::new(1));
        let runs = Arc::new(AtomicUsize::new(0));
        exec.submit("fill", counting(&runs)).unwrap();

        let waiter = {
            let exec = exec.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                exec.submit_blocking(&cancel, "second", counting(&runs)).await
            })
        };
        tokio::task::yield_now().await;
        exec.run();

        tokio::time::timeout(GUARD, waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        exec.terminate_and_wait().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn monitor_reports_occupancy() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = samples.clone();
        let exec = TaskExecutor::new(4).with_monitor(Duration::from_millis(5), move |pct| {
            sink.lock().unwrap().push(pct)
        });

        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        {
            let gate = gate.clone();
            let started = started.clone();
            exec.submit("hold", async move {
                started.notify_one();
                gate.notified().await;
            })
            .unwrap();
        }
        exec.run();
        started.notified().await;
        exec.submit("a", async {}).unwrap();
        exec.submit("b", async {}).unwrap();

        tokio::time::timeout(GUARD, async {
            while !samples.lock().unwrap().contains(&50) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        gate.notify_one();
        exec.terminate_and_wait().await;
    }
}
