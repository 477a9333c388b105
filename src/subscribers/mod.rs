//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for observing lifecycle events;
//! [`SubscriberSet`] fans events out to several subscribers without blocking
//! publishers.
//!
//! ## Architecture
//! ```text
//! Task / Routine / JobHandler ── publish(Event) ──► Bus
//!                                                   │
//!                                   SubscriberSet::listen (forwarder)
//!                                                   │
//!                               ┌───────────────────┼───────────────────┐
//!                               ▼                   ▼                   ▼
//!                           LogWriter            Metrics             Custom
//! ```
//!
//! ## Implementing a subscriber
//! ```no_run
//! use async_trait::async_trait;
//! use stoppable::{Event, EventKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::WorkerPanicked {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "alerts"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
