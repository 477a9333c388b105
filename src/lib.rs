//! # stoppable
//!
//! **Stoppable** provides cooperatively stoppable background work for tokio.
//!
//! It offers three building blocks:
//! - [`Routine`] repeats a [`Cycle`] until its [`StopToken`] is raised;
//! - [`Task`] owns a routine together with the worker that runs it and
//!   exposes `start` / `stop` / `running`;
//! - [`JobHandler`] tracks already dispatched jobs, reaps the finished ones and
//!   drains the rest when its task stops.
//!
//! ## Architecture
//! ```text
//!             ┌────────────────────────────────────────────────────┐
//!             │ Task (owner)                                       │
//!             │  - StopToken (Arc, shared with the routine)        │
//!             │  - Routine   (Arc; the worker holds a Weak)        │
//!             │  - worker    (tokio JoinHandle, one at a time)     │
//!             └──────┬───────────────────────────┬─────────────────┘
//!      start()       │ reset token, spawn        │ stop()
//!                    ▼                           ▼ token.stop(), join
//!             ┌─────────────────────────────────────────────────────┐
//!             │ Routine::run()                                      │
//!             │   first call() polled ─► StartSignal::fire()        │
//!             │   loop { call(); Err → handler; stopping? → break } │
//!             │   finish()                                          │
//!             └──────┬──────────────────────────────────────────────┘
//!                    │ Cycle
//!         ┌──────────┴──────────┐
//!         ▼                     ▼
//!    CycleFn(closure)     JobHandler (call = reap step, finish = drain)
//! ```
//!
//! ### Events
//! ```text
//! Task / Routine / JobHandler ── publish ──► Bus ──► SubscriberSet::listen ──► Subscribe
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                       |
//! |-------------------|------------------------------------------------------------|------------------------------------------|
//! | **Routines**      | Repeat a cycle until stopped                               | [`Routine`], [`Cycle`], [`CycleFn`]      |
//! | **Tasks**         | Owned worker with start/stop/running                       | [`Task`], [`TaskBuilder`]                |
//! | **Jobs**          | Reap finished jobs, drain on shutdown                      | [`JobHandler`]                           |
//! | **Subscriber API**| Observe lifecycle events                                   | [`Subscribe`], [`SubscriberSet`], [`Bus`]|
//! | **Errors**        | Typed errors for user work and the lifecycle machinery     | [`TaskError`], [`RuntimeError`]          |
//! | **Configuration** | Task and job handler settings                              | [`Config`], [`JobConfig`]                |
//!
//! ## Optional features
//! - `logging`: exports the [`tracing`]-backed `LogWriter` subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::time::Duration;
//! use stoppable::{Task, TaskError};
//!
//! #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! async fn main() -> Result<(), stoppable::RuntimeError> {
//!     let ticks = Arc::new(AtomicU64::new(0));
//!     let counter = Arc::clone(&ticks);
//!
//!     let task = Task::from_fn(
//!         move || {
//!             let counter = Arc::clone(&counter);
//!             async move {
//!                 counter.fetch_add(1, Ordering::Relaxed);
//!                 tokio::time::sleep(Duration::from_millis(1)).await;
//!                 Ok::<_, TaskError>(())
//!             }
//!         },
//!         |err| eprintln!("tick failed: {err}"),
//!     );
//!
//!     task.start().await?;
//!     assert!(ticks.load(Ordering::Relaxed) >= 1);
//!     assert!(task.running());
//!
//!     task.stop().await;
//!     assert!(!task.running());
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod jobs;
mod subscribers;

// ---- Public re-exports ----

pub use config::{Config, JobConfig};
pub use core::{
    Cycle, CycleFn, CycleRef, ErrorHandler, Routine, StartSignal, Started, StopToken, Task,
    TaskBuilder, error_handler,
};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{Job, JobHandler};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the tracing-backed logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
