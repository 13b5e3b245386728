//! # LogWriter: bus events rendered through `tracing`
//!
//! A subscriber that turns every [`Event`] into one structured `tracing` record.
//! Install a tracing subscriber first (see [`init_tracing`](crate::init_tracing)).
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  modvisor: module started module="feed"
//! WARN  modvisor: restart requested module="feed" reason="config changed" timeout_ms=2000
//! ERROR modvisor: fatal escalation module="feed" reason="timeout 2s reached while restarting"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let module = e.module.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ModuleLoaded => tracing::debug!(module, "module loaded"),
            EventKind::ModuleStarting => tracing::debug!(module, "module starting"),
            EventKind::ModuleStarted => tracing::info!(module, "module started"),
            EventKind::ModuleStopping => tracing::debug!(module, "module stopping"),
            EventKind::ModuleStopped => tracing::info!(module, "module stopped"),
            EventKind::ModuleFailed => tracing::warn!(module, reason, "module failed"),
            EventKind::RestartRequested => {
                tracing::warn!(module, reason, timeout_ms = ?e.timeout_ms, "restart requested")
            }
            EventKind::TerminateRequested => {
                tracing::error!(module, reason, timeout_ms = ?e.timeout_ms, "terminate requested")
            }
            EventKind::FatalEscalation => tracing::error!(module, reason, "fatal escalation"),
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStoppedWithin => tracing::info!("all modules stopped within grace"),
            EventKind::GraceExceeded => tracing::error!("shutdown grace exceeded"),
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = module, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = module, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
