//! # Cooperatively cancellable task.
//!
//! [`CancellableTask`] pairs a unit of async work with a one-shot stop request
//! ([`CancellationToken`]) and a completion acknowledgment (a `watch` flag set
//! when the body returns).
//!
//! ```text
//! new(body) ──► execute() ──► tokio::spawn(body(CancelHandle))
//!                                   │ polls handle.is_cancelled()
//! request_cancellation() ──► token.cancel()      │
//!                                   ▼
//! request_cancellation_and_wait() ◄── done = true
//! ```
//!
//! ## Rules
//! - The body only **observes** cancellation through a [`CancelHandle`]; nothing is preempted.
//! - Cancellation is idempotent: a second request is a no-op.
//! - `execute()` runs the body at most once; later calls are ignored.
//! - `wait()` and `request_cancellation_and_wait()` on a task that was never
//!   executed return at once: there is no body left to acknowledge.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Body = Box<dyn FnOnce(CancelHandle) -> BoxFuture<'static, ()> + Send>;

/// Raises the completion flag when dropped, so a panicking body still acknowledges.
struct Acknowledge(watch::Sender<bool>);

impl Drop for Acknowledge {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Read-only view of a cancellation signal handed to task bodies.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Returns `true` once cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl From<CancellationToken> for CancelHandle {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}

/// A unit of work with a cooperative stop request and a completion acknowledgment.
///
/// # Example
/// ```rust
/// use modvisor::CancellableTask;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let task = CancellableTask::new(|cancel| async move {
///     while !cancel.is_cancelled() {
///         tokio::task::yield_now().await;
///     }
/// });
/// task.execute();
/// task.request_cancellation_and_wait().await;
/// assert!(task.is_finished());
/// # }
/// ```
pub struct CancellableTask {
    token: CancellationToken,
    requested: AtomicBool,
    body: Mutex<Option<Body>>,
    done_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl CancellableTask {
    /// Creates a one-shot task: the body runs to completion or until it observes cancellation.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(CancelHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, _rx) = watch::channel(false);
        let body: Body = Box::new(move |h: CancelHandle| -> BoxFuture<'static, ()> {
            Box::pin(body(h))
        });
        Self {
            token: CancellationToken::new(),
            requested: AtomicBool::new(false),
            body: Mutex::new(Some(body)),
            done_tx,
            started: AtomicBool::new(false),
        }
    }

    /// Creates a repeatable task that re-invokes `body` back to back.
    ///
    /// The loop exits when cancellation is requested, or when a single invocation
    /// finished later than `interval` after the previous check (a run overran the
    /// interval). Fast bodies therefore repeat until cancelled; the interval acts
    /// as a hang detector, not as a period.
    pub fn repeatable<F, Fut>(interval: Duration, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(move |cancel| async move {
            let mut deadline = Instant::now() + interval;
            loop {
                body().await;
                if cancel.is_cancelled() || Instant::now() >= deadline {
                    return;
                }
                deadline = Instant::now() + interval;
            }
        })
    }

    /// Begins concurrent execution of the body. Non-blocking.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute(&self) {
        let body = self
            .body
            .lock()
            .expect("cancellable task body mutex poisoned")
            .take();
        let Some(body) = body else {
            return;
        };
        self.started.store(true, Ordering::Release);

        let handle = CancelHandle::from(self.token.clone());
        let done = Acknowledge(self.done_tx.clone());
        tokio::spawn(async move {
            body(handle).await;
            drop(done);
        });
    }

    /// Requests cancellation. Idempotent and non-blocking.
    ///
    /// Returns `true` for the call that actually raised the signal.
    pub fn request_cancellation(&self) -> bool {
        if self.requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Requests cancellation and waits until the body has returned.
    ///
    /// Returns immediately if the task was never executed.
    pub async fn request_cancellation_and_wait(&self) {
        self.request_cancellation();
        self.wait().await;
    }

    /// Waits until the body has returned, without requesting cancellation.
    pub async fn wait(&self) {
        if !self.started.load(Ordering::Acquire) {
            return;
        }
        let mut rx = self.done_tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` once the body has returned.
    pub fn is_finished(&self) -> bool {
        *self.done_tx.borrow()
    }

    /// A read-only handle to this task's cancellation signal.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle::from(self.token.clone())
    }
}

impl Drop for CancellableTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns `work`; if it has not finished within `timeout`, calls `on_timeout`.
///
/// The work is not aborted on timeout, it keeps running in the background.
pub async fn run_with_timeout<Fut, T>(timeout: Duration, work: Fut, on_timeout: T)
where
    Fut: Future<Output = ()> + Send + 'static,
    T: FnOnce(),
{
    let mut handle = tokio::spawn(work);
    if tokio::time::timeout(timeout, &mut handle).await.is_err() {
        on_timeout();
    }
}

/// Sleeps for `duration` unless `token` is cancelled first.
///
/// Returns `true` if the full duration elapsed, `false` on cancellation.
pub async fn sleep_with_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Arc;

    const GUARD: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn one_shot_observes_cancellation() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();
        let task = CancellableTask::new(move |cancel| async move {
            cancel.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        task.execute();
        assert!(!task.is_finished());

        tokio::time::timeout(GUARD, task.request_cancellation_and_wait())
            .await
            .unwrap();
        assert!(observed.load(Ordering::SeqCst));
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn one_shot_runs_to_completion_without_cancel() {
        let task = CancellableTask::new(|_cancel| async {});
        task.execute();
        tokio::time::timeout(GUARD, task.wait()).await.unwrap();
        assert!(task.is_finished());
        assert!(!task.is_cancelled());
    }

    #[tokio::test]
    async fn waiting_on_an_unexecuted_task_returns_at_once() {
        let task = CancellableTask::new(|_cancel| async {});
        tokio::time::timeout(Duration::from_secs(1), task.request_cancellation_and_wait())
            .await
            .expect("wait blocked on a task that never ran");
        assert!(task.is_cancelled());
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn cancellation_is_idempotent() {
        let task = CancellableTask::new(|cancel| async move { cancel.cancelled().await });
        task.execute();
        assert!(task.request_cancellation());
        assert!(!task.request_cancellation());
        tokio::time::timeout(GUARD, task.request_cancellation_and_wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_before_execute_returns() {
        let task = CancellableTask::new(|_cancel| async {});
        tokio::time::timeout(GUARD, task.request_cancellation_and_wait())
            .await
            .unwrap();
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn execute_runs_body_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = CancellableTask::new(move |_cancel| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        task.execute();
        task.execute();
        task.wait().await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeatable_loops_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = CancellableTask::repeatable(Duration::from_secs(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });
        task.execute();
        while runs.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
        tokio::time::timeout(GUARD, task.request_cancellation_and_wait())
            .await
            .unwrap();
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn repeatable_exits_when_a_run_overruns_interval() {
        let task = CancellableTask::repeatable(Duration::from_millis(10), || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        task.execute();
        task.wait().await;
        assert!(task.is_finished());
        assert!(!task.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn run_with_timeout_fires_callback_on_slow_work() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        run_with_timeout(
            Duration::from_millis(10),
            async { tokio::time::sleep(Duration::from_secs(1)).await },
            move || flag.store(true, Ordering::SeqCst),
        )
        .await;
        assert!(fired.load(Ordering::SeqCst));

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        run_with_timeout(Duration::from_secs(1), async {}, move || {
            flag.store(true, Ordering::SeqCst)
        })
        .await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_with_cancel_reports_outcome() {
        let token = CancellationToken::new();
        assert!(sleep_with_cancel(&token, Duration::from_millis(5)).await);
        token.cancel();
        assert!(!sleep_with_cancel(&token, Duration::from_secs(60)).await);
    }
}
