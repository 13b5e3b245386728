//! # Module factories.
//!
//! The supervisor never builds modules itself. It calls a [`ModuleFactory`]
//! with its own handle, the descriptor's type tag, id and queue size.
//!
//! Two ways to provide one:
//! - any closure `Fn(SupervisorHandle, &str, &str, usize) -> anyhow::Result<ModuleRef>`
//! - a [`FactoryRegistry`] mapping type names to constructors

use std::collections::HashMap;

use crate::core::SupervisorHandle;
use crate::modules::ModuleRef;

/// Builds modules from descriptor data.
pub trait ModuleFactory: Send + Sync + 'static {
    /// Creates the module `id` of type `module_type`.
    fn create(
        &self,
        supervisor: SupervisorHandle,
        module_type: &str,
        id: &str,
        queue_size: usize,
    ) -> anyhow::Result<ModuleRef>;
}

impl<F> ModuleFactory for F
where
    F: Fn(SupervisorHandle, &str, &str, usize) -> anyhow::Result<ModuleRef> + Send + Sync + 'static,
{
    fn create(
        &self,
        supervisor: SupervisorHandle,
        module_type: &str,
        id: &str,
        queue_size: usize,
    ) -> anyhow::Result<ModuleRef> {
        self(supervisor, module_type, id, queue_size)
    }
}

type Constructor =
    Box<dyn Fn(SupervisorHandle, &str, usize) -> anyhow::Result<ModuleRef> + Send + Sync>;

/// Type-name → constructor table.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use modvisor::{FactoryRegistry, ModuleRef};
/// # use modvisor::{Module, Payload};
/// # struct Echo(String);
/// # #[async_trait::async_trait]
/// # impl Module for Echo {
/// #     fn id(&self) -> &str { &self.0 }
/// #     fn module_type(&self) -> &str { "echo" }
/// #     async fn start(&self) -> anyhow::Result<()> { Ok(()) }
/// #     async fn stop(&self) -> anyhow::Result<()> { Ok(()) }
/// #     async fn handle_message(&self, _k: i32, _p: Payload) -> anyhow::Result<()> { Ok(()) }
/// # }
///
/// let factories = FactoryRegistry::new()
///     .register("echo", |_sup, id, _queue| Ok(Arc::new(Echo(id.to_string())) as ModuleRef));
/// assert!(factories.contains("echo"));
/// ```
#[derive(Default)]
pub struct FactoryRegistry {
    constructors: HashMap<String, Constructor>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the constructor for `module_type`.
    pub fn register<C>(mut self, module_type: impl Into<String>, ctor: C) -> Self
    where
        C: Fn(SupervisorHandle, &str, usize) -> anyhow::Result<ModuleRef> + Send + Sync + 'static,
    {
        self.constructors.insert(module_type.into(), Box::new(ctor));
        self
    }

    /// True when a constructor exists for `module_type`.
    pub fn contains(&self, module_type: &str) -> bool {
        self.constructors.contains_key(module_type)
    }

    /// Sorted list of registered type names.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl ModuleFactory for FactoryRegistry {
    fn create(
        &self,
        supervisor: SupervisorHandle,
        module_type: &str,
        id: &str,
        queue_size: usize,
    ) -> anyhow::Result<ModuleRef> {
        let ctor = self
            .constructors
            .get(module_type)
            .ok_or_else(|| anyhow::anyhow!("unknown module type '{module_type}'"))?;
        ctor(supervisor, id, queue_size)
    }
}
