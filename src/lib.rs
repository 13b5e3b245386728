//! # modvisor
//!
//! **Modvisor** is an in-process module orchestration library for Rust.
//!
//! It loads a declarative list of pluggable components ("modules"), starts and
//! stops them in parallel, routes messages between them by id and turns
//! unrecoverable failures into a single fatal escalation handed back to the
//! process entry point.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//!     │ ModuleDescriptor │   │ ModuleDescriptor │   │ ModuleDescriptor │
//!     │   (id, type, ..) │   │   (id, type, ..) │   │   (id, type, ..) │
//!     └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!              ▼                      ▼                      ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                           │
//! │  - ModuleFactory (type → Module)                                      │
//! │  - registry: id → ModuleEntry { module, started, transition lock }    │
//! │  - WorkerPool per start()/stop() (one job per module)                 │
//! │  - Bus + SubscriberSet (lifecycle and escalation events)              │
//! │  - process-wide CancellationToken, first FatalEscalation              │
//! └──────┬────────────────────┬────────────────────┬─────────────────┬────┘
//!        ▼                    ▼                    ▼                 │
//!   ┌──────────┐         ┌──────────┐         ┌──────────┐           │
//!   │ Module A │ ◄─────► │ Module B │ ◄─────► │ Module C │           │
//!   └────┬─────┘  call_  └────┬─────┘ module  └────┬─────┘           │
//!        │       (via SupervisorHandle)            │                 │
//!        └──── restart_module / terminate ─────────┘                 │
//!                                                                    ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                         Bus (broadcast channel)                       │
//! │                (capacity: SupervisorConfig::bus_capacity)             │
//! └─────────────────────────────────┬─────────────────────────────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     LogWriter   sub2  ...  subN
//! ```
//!
//! ### Module lifecycle
//! ```text
//! Unregistered ──load()──► Configured/Stopped ──start()──► Started
//!                                   ▲                         │
//!                                   └─────────stop()──────────┘
//!
//! failed start/stop  ─► state unchanged, error to the caller
//! restart_module     ─► stop ─► start; failure or watchdog expiry ─► FatalEscalation
//! terminate          ─► stop all ─► FatalEscalation (always)
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                              |
//! |-------------------|------------------------------------------------------------------|-------------------------------------------------|
//! | **Modules**       | Pluggable components and how they are built.                     | [`Module`], [`ModuleFactory`], [`FactoryRegistry`] |
//! | **Supervision**   | Load, parallel start/stop, routing, restart and escalation.      | [`Supervisor`], [`SupervisorHandle`]            |
//! | **Primitives**    | Cancellable tasks, bounded executor, fixed worker pool.          | [`CancellableTask`], [`TaskExecutor`], [`WorkerPool`] |
//! | **Subscriber API**| Hook into lifecycle and escalation events.                       | [`Subscribe`]                                   |
//! | **Errors**        | Typed errors; only [`RuntimeError::Fatal`] should end a process. | [`SupervisorError`], [`RuntimeError`]           |
//! | **Configuration** | Supervisor settings and the JSON module list.                    | [`SupervisorConfig`], [`ModulesConfig`]         |
//! | **Helpers**       | Set operations, time conversion, binary value store.             | [`util`]                                        |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] subscriber rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use modvisor::{FactoryRegistry, Module, ModuleRef, Payload, Supervisor, SupervisorConfig};
//!
//! struct Hello(String);
//!
//! #[async_trait]
//! impl Module for Hello {
//!     fn id(&self) -> &str { &self.0 }
//!     fn module_type(&self) -> &str { "hello" }
//!     async fn start(&self) -> anyhow::Result<()> { Ok(()) }
//!     async fn stop(&self) -> anyhow::Result<()> { Ok(()) }
//!     async fn handle_message(&self, kind: i32, _payload: Payload) -> anyhow::Result<()> {
//!         println!("{} got message {kind}", self.0);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factories = FactoryRegistry::new()
//!         .register("hello", |_sup, id, _queue| Ok(Arc::new(Hello(id.to_string())) as ModuleRef));
//!
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_factory(factories)
//!         .build();
//!
//!     sup.load_json(r#"{"modules":[{"id":"greeter","type":"hello"}]}"#).await?;
//!     sup.start().await?;
//!     sup.call_module("greeter", 1, Box::new(())).await?;
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod modules;
mod pool;
mod subscribers;
mod tasks;
pub mod util;

// ---- Public re-exports ----

pub use crate::core::{Supervisor, SupervisorBuilder, SupervisorConfig, SupervisorHandle};
pub use error::{ExecutorError, FatalEscalation, PoolError, RuntimeError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use modules::{FactoryRegistry, Module, ModuleDescriptor, ModuleFactory, ModuleRef, ModulesConfig, Payload};
pub use pool::{default_workers, Job, WorkerPool};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    run_with_timeout, sleep_with_cancel, CancelHandle, CancellableTask, ExecutorState, MonitorFn,
    TaskExecutor, WorkItem,
};
pub use util::init_tracing;

// Optional: a built-in subscriber rendering events through `tracing`.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
