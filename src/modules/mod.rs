//! # Modules: the supervised components.
//!
//! - [`Module`] - capability trait (configure/start/stop/handle_message)
//! - [`ModuleFactory`], [`FactoryRegistry`] - how modules are built from descriptors
//! - [`ModuleDescriptor`], [`ModulesConfig`] - the inbound configuration

mod descriptor;
pub(crate) mod entry;
mod factory;
mod module;

pub use descriptor::{ModuleDescriptor, ModulesConfig};
pub use factory::{FactoryRegistry, ModuleFactory};
pub use module::{Module, ModuleRef, Payload};
