//! Error types used by the modvisor runtime, its executors and modules.
//!
//! This module defines the error enums surfaced to callers:
//!
//! - [`SupervisorError`] - errors raised while loading, starting, stopping or routing to modules.
//! - [`ExecutorError`] - errors raised by the bounded task executor.
//! - [`PoolError`] - errors raised by the worker pool.
//! - [`RuntimeError`] - errors that end [`Supervisor::run`](crate::Supervisor::run).
//!
//! All of them provide `as_label` for logging/metrics. Only [`RuntimeError::Fatal`]
//! is meant to end the hosting process; everything else returns to the caller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the module supervisor.
///
/// Every variant except [`SupervisorError::Aggregate`] concerns a single module id
/// (or the configuration as a whole). None of them is fatal.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The descriptor list was empty.
    #[error("there are no modules in the configuration")]
    EmptyConfiguration,

    /// The configuration text could not be decoded.
    #[error("can't decode modules configuration: {reason}")]
    InvalidConfiguration {
        /// Decoder message.
        reason: String,
    },

    /// The module factory refused to build a module.
    #[error("creation of module {id} failed: {error}")]
    Factory {
        /// Module identifier.
        id: String,
        /// Factory error.
        #[source]
        error: anyhow::Error,
    },

    /// `Module::configure` returned an error.
    #[error("loading config for module {id} failed: {error}")]
    Config {
        /// Module identifier.
        id: String,
        /// Configure error.
        #[source]
        error: anyhow::Error,
    },

    /// Start requested for a module that is already started.
    #[error("module {id} already started")]
    AlreadyStarted {
        /// Module identifier.
        id: String,
    },

    /// Stop requested for a module that is not started.
    #[error("module {id} already stopped")]
    AlreadyStopped {
        /// Module identifier.
        id: String,
    },

    /// No module is registered under this id.
    #[error("module {id} not found")]
    NotFound {
        /// Module identifier.
        id: String,
    },

    /// The target module exists but is not started.
    #[error("module {id} is not started")]
    NotStarted {
        /// Module identifier.
        id: String,
    },

    /// `Module::start` or `Module::stop` returned an error.
    #[error("module {id} {action} failed: {error}")]
    Lifecycle {
        /// Module identifier.
        id: String,
        /// `"start"` or `"stop"`.
        action: &'static str,
        /// Module error.
        #[source]
        error: anyhow::Error,
    },

    /// `Module::handle_message` returned an error.
    #[error("module {id} message handler failed: {error}")]
    Handler {
        /// Module identifier.
        id: String,
        /// Handler error.
        #[source]
        error: anyhow::Error,
    },

    /// Per-module failures collected from a parallel start/stop.
    ///
    /// Order is not guaranteed.
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<SupervisorError>),

    /// The supervisor behind a [`SupervisorHandle`](crate::SupervisorHandle) is gone.
    #[error("supervisor is no longer available")]
    Unavailable,
}

struct AggregateDisplay<'a>(&'a [SupervisorError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "[{err}]")?;
        }
        Ok(())
    }
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::SupervisorError;
    ///
    /// let err = SupervisorError::NotFound { id: "feed".into() };
    /// assert_eq!(err.as_label(), "module_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::EmptyConfiguration => "config_empty",
            SupervisorError::InvalidConfiguration { .. } => "config_invalid",
            SupervisorError::Factory { .. } => "module_factory_failed",
            SupervisorError::Config { .. } => "module_config_failed",
            SupervisorError::AlreadyStarted { .. } => "module_already_started",
            SupervisorError::AlreadyStopped { .. } => "module_already_stopped",
            SupervisorError::NotFound { .. } => "module_not_found",
            SupervisorError::NotStarted { .. } => "module_not_started",
            SupervisorError::Lifecycle { .. } => "module_lifecycle_failed",
            SupervisorError::Handler { .. } => "module_handler_failed",
            SupervisorError::Aggregate(_) => "aggregate",
            SupervisorError::Unavailable => "supervisor_unavailable",
        }
    }

    /// Returns the module id this error is about, if it concerns a single module.
    pub fn module_id(&self) -> Option<&str> {
        match self {
            SupervisorError::Factory { id, .. }
            | SupervisorError::Config { id, .. }
            | SupervisorError::AlreadyStarted { id }
            | SupervisorError::AlreadyStopped { id }
            | SupervisorError::NotFound { id }
            | SupervisorError::NotStarted { id }
            | SupervisorError::Lifecycle { id, .. }
            | SupervisorError::Handler { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Indicates a configuration-level failure (empty or undecodable input).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SupervisorError::EmptyConfiguration | SupervisorError::InvalidConfiguration { .. }
        )
    }
}

/// # Errors produced by the bounded task executor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The queue holds `capacity` items and the executor is not stopping.
    #[error("execute {name} task failed, tasks queue is full")]
    QueueFull {
        /// Work item name.
        name: String,
    },

    /// Shutdown has begun; no new work is accepted.
    #[error("tasks executor stopped")]
    Stopped,

    /// The caller's cancellation token fired while waiting for room.
    #[error("submission of {name} cancelled while waiting for queue room")]
    Canceled {
        /// Work item name.
        name: String,
    },

    /// The work item ran and returned an error.
    #[error("task {name} failed: {error}")]
    Failed {
        /// Work item name.
        name: String,
        /// Work error.
        #[source]
        error: anyhow::Error,
    },
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::QueueFull { .. } => "executor_queue_full",
            ExecutorError::Stopped => "executor_stopped",
            ExecutorError::Canceled { .. } => "executor_canceled",
            ExecutorError::Failed { .. } => "executor_task_failed",
        }
    }
}

/// # Errors produced by the worker pool.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The job queue is at capacity (non-blocking submit only).
    #[error("worker pool job queue is full")]
    Full,

    /// The pool has been released.
    #[error("worker pool released")]
    Released,
}

/// A process-fatal event: a restart or terminate escalation.
///
/// Created by the supervisor, reported once, and handed to the process entry
/// point through [`RuntimeError::Fatal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FatalEscalation {
    /// Module that triggered the escalation, if any.
    pub module: Option<String>,
    /// Human-readable cause.
    pub reason: String,
}

impl FatalEscalation {
    /// Creates an escalation for `module` with the given reason.
    pub fn new(module: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            module: module.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FatalEscalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(m) => write!(f, "terminating current process (module {m}): {}", self.reason),
            None => write!(f, "terminating current process: {}", self.reason),
        }
    }
}

/// # Errors ending the supervisor run loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A restart/terminate escalation; the hosting process should exit.
    #[error("fatal escalation: {0}")]
    Fatal(FatalEscalation),

    /// Shutdown grace period was exceeded; some modules were still started.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Modules still started when the grace period ran out.
        stuck: Vec<String>,
    },

    /// Registering OS signal handlers failed.
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Fatal(_) => "runtime_fatal",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }

    /// Process exit code the entry point should use.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::Fatal(_) => 1,
            RuntimeError::GraceExceeded { .. } => 2,
            RuntimeError::Signal(_) => 3,
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_names_every_failing_module() {
        let err = SupervisorError::Aggregate(vec![
            SupervisorError::AlreadyStarted { id: "a".into() },
            SupervisorError::Lifecycle {
                id: "b".into(),
                action: "start",
                error: anyhow::anyhow!("port busy"),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "[module a already started], [module b start failed: port busy]"
        );
        assert_eq!(err.as_label(), "aggregate");
        assert!(err.module_id().is_none());
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(SupervisorError::EmptyConfiguration.is_configuration());
        assert!(SupervisorError::InvalidConfiguration { reason: "eof".into() }.is_configuration());
        assert!(!SupervisorError::NotFound { id: "x".into() }.is_configuration());
    }

    #[test]
    fn fatal_display_mentions_module() {
        let esc = FatalEscalation::new(Some("feed"), "timeout 2s reached while restarting");
        assert_eq!(
            esc.to_string(),
            "terminating current process (module feed): timeout 2s reached while restarting"
        );
        assert_eq!(RuntimeError::Fatal(esc).exit_code(), 1);
    }
}
