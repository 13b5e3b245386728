//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings of one [`Supervisor`](crate::Supervisor).
//! The module list itself is not part of it; it comes from
//! [`ModulesConfig`](crate::ModulesConfig).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `tasks_queue_size` missing or `0` in a descriptor → `default_queue_size`

use std::time::Duration;

/// Global configuration for the supervisor.
///
/// ## Field semantics
/// - `grace`: maximum wait for all modules to stop on shutdown
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `restart_timeout`: watchdog timeout used by [`SupervisorHandle::restart`](crate::SupervisorHandle::restart)
/// - `terminate_timeout`: watchdog timeout used by [`SupervisorHandle::terminate_process`](crate::SupervisorHandle::terminate_process)
/// - `default_queue_size`: queue-size hint handed to the factory when a descriptor has none
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum time to wait for modules to stop after a shutdown request.
    ///
    /// If exceeded, [`Supervisor::run`](crate::Supervisor::run) returns
    /// `RuntimeError::GraceExceeded` listing the modules still started.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Listeners lagging more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// Default restart watchdog timeout.
    pub restart_timeout: Duration,

    /// Default terminate watchdog timeout.
    pub terminate_timeout: Duration,

    /// Default queue-size hint for module executors.
    pub default_queue_size: usize,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Resolves a descriptor's queue-size hint against the default.
    #[inline]
    pub fn queue_size_for(&self, hint: Option<usize>) -> usize {
        match hint {
            Some(n) if n > 0 => n,
            _ => self.default_queue_size,
        }
    }
}

impl Default for SupervisorConfig {
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `restart_timeout = 30s`, `terminate_timeout = 30s`
    /// - `default_queue_size = 256`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            restart_timeout: Duration::from_secs(30),
            terminate_timeout: Duration::from_secs(30),
            default_queue_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_size_falls_back_to_default() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.queue_size_for(None), 256);
        assert_eq!(cfg.queue_size_for(Some(0)), 256);
        assert_eq!(cfg.queue_size_for(Some(8)), 8);
    }

    #[test]
    fn bus_capacity_never_zero() {
        let cfg = SupervisorConfig {
            bus_capacity: 0,
            ..SupervisorConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
