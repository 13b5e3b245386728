//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the supervisor, its lifecycle jobs
//! and escalation watchdogs can publish without blocking.
//!
//! ```text
//! Publishers (many):                    Consumer (one):
//!   start/stop jobs ──┐
//!   watchdogs       ──┼──► Bus ──► Supervisor listener ──► SubscriberSet
//!   run loop        ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks.
//! - Slow receivers observe `RecvError::Lagged(n)` and skip `n` oldest events.
//! - Events are dropped when nobody is subscribed.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given ring-buffer capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn publish_reaches_existing_receivers_only() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ModuleLoaded));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ModuleStarted).with_module("a"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ModuleStarted);
        assert_eq!(ev.module.as_deref(), Some("a"));
    }
}
