//! # Registry entry: a module plus its lifecycle state.
//!
//! The started flag lives here, not in the module, and only changes after a
//! successful `start`/`stop`. Each entry serializes its own transitions, so at
//! most one start or stop is in flight per module whichever path issued it
//! (fan-out, restart, terminate).
//!
//! ```text
//! start(): lock ─► started? ─yes─► AlreadyStarted
//!                      │no
//!                      ▼
//!          ModuleStarting ─► module.start() ─ok─► started = true, ModuleStarted
//!                                          └err─► ModuleFailed, Lifecycle error
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::modules::ModuleRef;

pub(crate) struct ModuleEntry {
    id: Arc<str>,
    module: ModuleRef,
    started: AtomicBool,
    transition: Mutex<()>,
}

impl ModuleEntry {
    pub(crate) fn new(id: &str, module: ModuleRef) -> Arc<Self> {
        Arc::new(Self {
            id: Arc::from(id),
            module,
            started: AtomicBool::new(false),
            transition: Mutex::new(()),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn module(&self) -> &ModuleRef {
        &self.module
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) async fn start(&self, bus: &Bus) -> Result<(), SupervisorError> {
        let _guard = self.transition.lock().await;
        if self.is_started() {
            let err = SupervisorError::AlreadyStarted {
                id: self.id.to_string(),
            };
            bus.publish(Event::module_failed(&self.id, err.to_string()));
            return Err(err);
        }

        bus.publish(Event::new(EventKind::ModuleStarting).with_module(Arc::clone(&self.id)));
        match self.module.start().await {
            Ok(()) => {
                self.started.store(true, Ordering::Release);
                bus.publish(Event::new(EventKind::ModuleStarted).with_module(Arc::clone(&self.id)));
                Ok(())
            }
            Err(error) => {
                let err = SupervisorError::Lifecycle {
                    id: self.id.to_string(),
                    action: "start",
                    error,
                };
                bus.publish(Event::module_failed(&self.id, err.to_string()));
                Err(err)
            }
        }
    }

    pub(crate) async fn stop(&self, bus: &Bus) -> Result<(), SupervisorError> {
        let _guard = self.transition.lock().await;
        if !self.is_started() {
            let err = SupervisorError::AlreadyStopped {
                id: self.id.to_string(),
            };
            bus.publish(Event::module_failed(&self.id, err.to_string()));
            return Err(err);
        }

        bus.publish(Event::new(EventKind::ModuleStopping).with_module(Arc::clone(&self.id)));
        match self.module.stop().await {
            Ok(()) => {
                self.started.store(false, Ordering::Release);
                bus.publish(Event::new(EventKind::ModuleStopped).with_module(Arc::clone(&self.id)));
                Ok(())
            }
            Err(error) => {
                let err = SupervisorError::Lifecycle {
                    id: self.id.to_string(),
                    action: "stop",
                    error,
                };
                bus.publish(Event::module_failed(&self.id, err.to_string()));
                Err(err)
            }
        }
    }
}
