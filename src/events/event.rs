//! # Runtime events emitted by the supervisor and its modules.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Module lifecycle events**: load, starting/started, stopping/stopped, failed
//! - **Escalation events**: restart and terminate requests, fatal escalation
//! - **Shutdown events**: OS signal observed, stop-all within/over grace
//! - **Subscriber events**: subscriber queue overflow or panic
//!
//! The [`Event`] struct carries additional metadata such as timestamps, module id,
//! reasons and watchdog timeouts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RestartRequested)
//!     .with_module("feed")
//!     .with_reason("config changed")
//!     .with_timeout(Duration::from_secs(2));
//!
//! assert_eq!(ev.kind, EventKind::RestartRequested);
//! assert_eq!(ev.module.as_deref(), Some("feed"));
//! assert_eq!(ev.timeout_ms, Some(2000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `module` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `module` (subscriber name) and `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All modules stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some modules did not stop in time.
    GraceExceeded,

    // === Module lifecycle events ===
    /// Module built by the factory, configured and registered.
    ///
    /// Sets `module`.
    ModuleLoaded,

    /// `Module::start` is about to be called.
    ModuleStarting,

    /// `Module::start` succeeded; the module is now started.
    ModuleStarted,

    /// `Module::stop` is about to be called.
    ModuleStopping,

    /// `Module::stop` succeeded; the module is now stopped.
    ModuleStopped,

    /// A lifecycle call was refused or failed.
    ///
    /// Sets `module` and `reason`. The module state is unchanged.
    ModuleFailed,

    // === Escalation events ===
    /// A restart of `module` was requested.
    ///
    /// Sets `module`, `reason` and `timeout_ms` (watchdog).
    RestartRequested,

    /// Process termination was requested by `module`.
    ///
    /// Sets `module`, `reason` and `timeout_ms` (watchdog).
    TerminateRequested,

    /// A process-fatal escalation was raised.
    ///
    /// Sets `reason` and, if known, `module`.
    FatalEscalation,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Module id (or subscriber name for subscriber events).
    pub module: Option<Arc<str>>,
    /// Human-readable reason (errors, escalation causes, overflow details).
    pub reason: Option<Arc<str>>,
    /// Watchdog timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            module: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a module id.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a watchdog timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_module(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_module(subscriber)
            .with_reason(info)
    }

    /// Creates a module failure event.
    #[inline]
    pub fn module_failed(id: &str, reason: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::ModuleFailed)
            .with_module(id)
            .with_reason(reason)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, EventKind::FatalEscalation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ModuleStarting);
        let b = Event::new(EventKind::ModuleStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_is_clamped_to_u32() {
        let ev = Event::new(EventKind::TerminateRequested).with_timeout(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
