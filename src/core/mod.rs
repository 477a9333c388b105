//! Core lifecycle primitives.
//!
//! Leaf-first:
//! - [`token`]: resettable stop flag shared by a task and its routine;
//! - [`signal`]: one-shot-then-rearm "routine started" notification;
//! - [`cycle`]: the unit of repeated work and the error handler type;
//! - [`routine`]: repeats a cycle until the stop token is raised;
//! - [`task`]: owns a routine plus the worker running it, with start/stop/running.

mod cycle;
mod routine;
mod signal;
mod task;
mod token;

pub use cycle::{Cycle, CycleFn, CycleRef, ErrorHandler, error_handler};
pub use routine::Routine;
pub use signal::{StartSignal, Started};
pub use task::{Task, TaskBuilder};
pub use token::StopToken;
