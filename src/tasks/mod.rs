//! # Task primitives.
//!
//! - [`CancellableTask`] - async work with a one-shot cooperative stop request and completion ack
//! - [`CancelHandle`] - read-only view of the stop request handed to task bodies
//! - [`TaskExecutor`] - bounded single-consumer FIFO queue built on [`CancellableTask`]
//! - [`run_with_timeout`], [`sleep_with_cancel`] - small timing helpers

mod cancellable;
mod executor;

pub use cancellable::{run_with_timeout, sleep_with_cancel, CancelHandle, CancellableTask};
pub use executor::{ExecutorState, MonitorFn, TaskExecutor, WorkItem};
