//! # Pool worker.
//!
//! A worker loops: register itself idle, then wait for exactly one
//! [`Assignment`], either a job to run or a stop instruction to acknowledge.
//!
//! ```text
//! loop {
//!   idle.send(link) ──► dispatcher
//!   recv() ─┬─ Run(job)  ──► job.await ──► loop
//!           └─ Stop(ack) ──► ack.send(()) ──► exit
//! }
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::Job;

/// Instruction handed from the dispatcher to one idle worker.
pub(super) enum Assignment {
    Run(Job),
    Stop(oneshot::Sender<()>),
}

/// Dispatcher-side handle of an idle worker.
#[derive(Clone)]
pub(super) struct WorkerLink {
    pub(super) id: usize,
    tx: mpsc::Sender<Assignment>,
}

impl WorkerLink {
    /// Hands an assignment to the worker. Returns `false` if the worker is gone.
    pub(super) async fn assign(&self, assignment: Assignment) -> bool {
        self.tx.send(assignment).await.is_ok()
    }
}

/// Spawns worker `id`, which announces itself on `idle` whenever it is free.
pub(super) fn spawn(id: usize, idle: mpsc::Sender<WorkerLink>) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::channel::<Assignment>(1);
    let link = WorkerLink { id, tx };

    tokio::spawn(async move {
        loop {
            if idle.send(link.clone()).await.is_err() {
                return;
            }
            match rx.recv().await {
                Some(Assignment::Run(job)) => job.await,
                Some(Assignment::Stop(ack)) => {
                    let _ = ack.send(());
                    return;
                }
                None => return,
            }
        }
    })
}
