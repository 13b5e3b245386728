//! Runtime core: module orchestration and lifecycle.
//!
//! The public API from this module is [`Supervisor`], built through
//! [`SupervisorBuilder`] from a [`SupervisorConfig`], and the weak
//! [`SupervisorHandle`] given to modules.
//!
//! Internal modules:
//! - [`supervisor`]: registry, parallel start/stop, routing, escalation, shutdown;
//! - [`handle`]: weak handle exposed to modules;
//! - [`builder`]: wires bus, subscribers and factory;
//! - [`config`]: supervisor settings;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod config;
mod handle;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use handle::SupervisorHandle;
pub use supervisor::Supervisor;
