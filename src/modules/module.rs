//! # Module abstraction.
//!
//! A [`Module`] is a pluggable unit of application logic with a uniform
//! configure/start/stop lifecycle and a message-handling entry point. Modules
//! are built by a [`ModuleFactory`](crate::ModuleFactory) and owned by the
//! supervisor's registry once loaded.
//!
//! The supervisor tracks whether a module is started; implementations only
//! report success or failure of each call. Methods take `&self`, so a module
//! keeps its mutable state behind its own locks.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Opaque message payload routed between modules.
pub type Payload = Box<dyn Any + Send>;

/// Shared handle to a module (`Arc<dyn Module>`).
pub type ModuleRef = Arc<dyn Module>;

/// # Pluggable, supervised component.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use modvisor::{Module, Payload};
///
/// struct Heartbeat { id: String }
///
/// #[async_trait]
/// impl Module for Heartbeat {
///     fn id(&self) -> &str { &self.id }
///     fn module_type(&self) -> &str { "heartbeat" }
///
///     async fn start(&self) -> anyhow::Result<()> { Ok(()) }
///     async fn stop(&self) -> anyhow::Result<()> { Ok(()) }
///
///     async fn handle_message(&self, kind: i32, payload: Payload) -> anyhow::Result<()> {
///         let text = payload.downcast::<String>().map_err(|_| anyhow::anyhow!("bad payload"))?;
///         println!("{}: {kind} {text}", self.id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Unique identifier from the descriptor.
    fn id(&self) -> &str;

    /// Type tag the factory built this module from.
    fn module_type(&self) -> &str;

    /// Applies the descriptor's opaque parameters. Called once, before the first start.
    async fn configure(&self, _params: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    /// Starts the module.
    async fn start(&self) -> anyhow::Result<()>;

    /// Stops the module.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Handles a message routed by the supervisor. Only called while started.
    async fn handle_message(&self, kind: i32, payload: Payload) -> anyhow::Result<()>;
}
