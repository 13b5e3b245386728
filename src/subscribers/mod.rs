//! # Event subscribers.
//!
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                  ┌─────────┼─────────┐
//!                                                  ▼         ▼         ▼
//!                                              LogWriter  Metrics   Custom
//! ```
//!
//! Implement [`Subscribe`] to observe module lifecycle and escalation events.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
