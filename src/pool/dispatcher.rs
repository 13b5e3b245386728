//! # Job dispatcher.
//!
//! Matches queued jobs to idle workers one-to-one. A worker is only handed a
//! job after it registered itself idle, so no worker ever holds two jobs.
//!
//! On stop, the dispatcher collects every worker as it becomes idle, sends it
//! a stop instruction and waits for its acknowledgment. Jobs still queued at
//! that point are dropped.

use tokio::sync::{mpsc, oneshot};

use super::worker::{Assignment, WorkerLink};
use super::Job;

pub(super) async fn dispatch(
    mut jobs: mpsc::Receiver<Job>,
    mut idle: mpsc::Receiver<WorkerLink>,
    workers: usize,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            job = jobs.recv() => {
                let Some(job) = job else { break };
                let Some(worker) = idle.recv().await else { return };
                if !worker.assign(Assignment::Run(job)).await {
                    tracing::warn!(worker = worker.id, "pool worker gone, job dropped");
                }
            }
        }
    }

    jobs.close();
    for _ in 0..workers {
        let Some(worker) = idle.recv().await else { break };
        let (ack_tx, ack_rx) = oneshot::channel();
        if worker.assign(Assignment::Stop(ack_tx)).await {
            let _ = ack_rx.await;
        }
    }
}
