//! # Cycle abstraction and function-backed cycle.
//!
//! A [`Cycle`] is the unit of work a [`Routine`](crate::Routine) repeats until
//! its stop token is raised. [`CycleFn`] wraps a closure that produces a fresh
//! future per iteration; [`CycleRef`] is the shared handle the runtime stores.
//!
//! ## Caller obligations
//! - `call()` must return in bounded time: the stop token is only checked
//!   between iterations, so a cycle that never returns makes `Task::stop()` hang.
//! - The [`ErrorHandler`] must not panic; a panicking handler unwinds the worker
//!   and is reported by the owning task as [`TaskError::Panicked`].
//!
//! ## Example
//! ```rust
//! use stoppable::{CycleFn, CycleRef, TaskError};
//!
//! let tick: CycleRef = CycleFn::arc(|| async {
//!     // do one unit of work...
//!     Ok::<_, TaskError>(())
//! });
//! # let _ = tick;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;

/// Shared error sink for cycle and job failures.
pub type ErrorHandler = Arc<dyn Fn(TaskError) + Send + Sync + 'static>;

/// Shared reference to a cycle.
pub type CycleRef = Arc<dyn Cycle>;

/// # One repeatable iteration of background work.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use async_trait::async_trait;
/// use stoppable::{Cycle, TaskError};
///
/// struct Counter(AtomicU64);
///
/// #[async_trait]
/// impl Cycle for Counter {
///     async fn call(&self) -> Result<(), TaskError> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    /// Runs one iteration.
    ///
    /// An `Err` is forwarded to the routine's error handler and the loop continues.
    async fn call(&self) -> Result<(), TaskError>;

    /// Runs once after the last iteration, on the same worker, before the worker exits.
    ///
    /// Default: nothing.
    async fn finish(&self) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Function-backed cycle.
///
/// Wraps a closure that *creates* a new future per iteration.
#[derive(Debug)]
pub struct CycleFn<F> {
    f: F,
}

impl<F> CycleFn<F> {
    /// Creates a new function-backed cycle.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the cycle and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Cycle for CycleFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn call(&self) -> Result<(), TaskError> {
        (self.f)().await
    }
}

/// Wraps a closure into an [`ErrorHandler`].
pub fn error_handler<H>(handler: H) -> ErrorHandler
where
    H: Fn(TaskError) + Send + Sync + 'static,
{
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cycle_fn_creates_fresh_future_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let cycle: CycleRef = CycleFn::arc(move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            }
        });

        cycle.call().await.unwrap();
        cycle.call().await.unwrap();
        cycle.finish().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
