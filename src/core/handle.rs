//! # Supervisor handle handed to modules.
//!
//! Modules are owned by the supervisor, so they hold a weak [`SupervisorHandle`]
//! instead of an `Arc<Supervisor>`. Every call upgrades it first and fails with
//! [`SupervisorError::Unavailable`] once the supervisor is gone.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::Supervisor;
use crate::error::SupervisorError;
use crate::modules::Payload;

/// Cheap, cloneable, weak reference to a [`Supervisor`].
#[derive(Clone)]
pub struct SupervisorHandle {
    inner: Weak<Supervisor>,
}

impl SupervisorHandle {
    pub(crate) fn new(inner: Weak<Supervisor>) -> Self {
        Self { inner }
    }

    /// A handle bound to no supervisor; every call fails with `Unavailable`.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    fn upgrade(&self) -> Result<Arc<Supervisor>, SupervisorError> {
        self.inner.upgrade().ok_or(SupervisorError::Unavailable)
    }

    /// True while the supervisor is alive.
    pub fn is_available(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// See [`Supervisor::call_module`].
    pub async fn call_module(
        &self,
        id: &str,
        kind: i32,
        payload: Payload,
    ) -> Result<(), SupervisorError> {
        self.upgrade()?.call_module(id, kind, payload).await
    }

    /// See [`Supervisor::restart_module`].
    pub fn restart_module(
        &self,
        id: &str,
        reason: &str,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        self.upgrade()?.restart_module(id, reason, timeout)
    }

    /// Restarts `id` with the configured `restart_timeout`.
    pub fn restart(&self, id: &str, reason: &str) -> Result<(), SupervisorError> {
        let sup = self.upgrade()?;
        let timeout = sup.config().restart_timeout;
        sup.restart_module(id, reason, timeout)
    }

    /// See [`Supervisor::terminate`].
    pub fn terminate(
        &self,
        module: &str,
        reason: &str,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        self.upgrade()?.terminate(module, reason, timeout);
        Ok(())
    }

    /// Terminates with the configured `terminate_timeout`.
    pub fn terminate_process(&self, module: &str, reason: &str) -> Result<(), SupervisorError> {
        let sup = self.upgrade()?;
        let timeout = sup.config().terminate_timeout;
        sup.terminate(module, reason, timeout);
        Ok(())
    }

    /// See [`Supervisor::escalate`].
    pub fn escalate(&self, module: Option<&str>, reason: &str) -> Result<(), SupervisorError> {
        self.upgrade()?.escalate(module, reason);
        Ok(())
    }

    /// True when module `id` is registered and started.
    pub fn is_started(&self, id: &str) -> bool {
        self.inner.upgrade().is_some_and(|sup| sup.is_started(id))
    }

    /// Process-wide context; already cancelled when the supervisor is gone.
    pub fn ctx(&self) -> CancellationToken {
        match self.inner.upgrade() {
            Some(sup) => sup.ctx(),
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        }
    }
}

impl fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_handle_is_unavailable() {
        let handle = SupervisorHandle::detached();
        assert!(!handle.is_available());
        assert!(!handle.is_started("a"));
        assert!(matches!(
            handle.restart("a", "test"),
            Err(SupervisorError::Unavailable)
        ));
        assert!(matches!(
            handle.terminate_process("a", "test"),
            Err(SupervisorError::Unavailable)
        ));
        assert!(handle.ctx().is_cancelled());
        assert_eq!(format!("{handle:?}"), "SupervisorHandle { available: false }");
    }
}
