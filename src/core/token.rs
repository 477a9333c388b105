//! # Shared cooperative stop flag.
//!
//! A [`StopToken`] is shared (`Arc`) between a [`Task`](crate::Task) and the
//! [`Routine`](crate::Routine) it runs. The control side raises it, the worker
//! checks it after every cycle.
//!
//! Unlike a one-way cancellation token it can be [`reset`](StopToken::reset),
//! so one token serves every start/stop round of the same task.

use std::sync::atomic::{AtomicBool, Ordering};

/// Resettable, lock-free stop flag.
#[derive(Debug, Default)]
pub struct StopToken {
    stopping: AtomicBool,
}

impl StopToken {
    /// Creates a token in the "not stopping" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the flag.
    ///
    /// Only call this once the routine using the token is known to have exited
    /// (or has not started yet); [`Task::start`](crate::Task::start) does so before launching a worker.
    pub fn reset(&self) {
        self.stopping.store(false, Ordering::Release);
    }

    /// Raises the flag. Idempotent, callable from any thread.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Returns `true` once [`stop`](StopToken::stop) was called and the token was not reset since.
    #[inline]
    pub fn stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}
