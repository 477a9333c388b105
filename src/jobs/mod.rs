//! # Background job tracking.
//!
//! [`JobHandler`] owns jobs that were already dispatched onto the runtime,
//! reaps the finished ones while its [`Task`](crate::Task) runs and drains the
//! rest when that task stops.
//!
//! ## Wiring
//! ```text
//! producers ── add(JoinHandle) / emplace(Future) ──► JobHandler (Arc)
//!                                                     │  pending: Mutex<VecDeque<Job>>
//!                                                     ▼
//!                          Task(cycle = JobHandler) ── call()   → reap step
//!                                                   └─ finish() → drain
//! ```

mod handler;

pub use handler::{Job, JobHandler};
