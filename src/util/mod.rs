//! Helpers consumed by modules: set operations, time conversion, a binary value
//! store, config file loading and tracing setup.

mod config_file;
mod logging;
pub mod sets;
mod storage;
pub mod time;

pub use config_file::{default_config_path, load_config_file, load_modules_config};
pub use logging::init_tracing;
pub use storage::{FileStorage, StorageError};
