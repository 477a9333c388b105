//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Task` (start/stop transitions, worker panics), `Routine`
//!   (cycle failures), `JobHandler` (job bookkeeping), `SubscriberSet` workers.
//! - **Consumers**: `SubscriberSet::listen()` and any direct `Bus::subscribe()` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
