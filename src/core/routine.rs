//! # Repeating cycle loop bound to a stop token.
//!
//! [`Routine::run`] executes one [`Cycle`] over and over on the calling task
//! until its [`StopToken`] is raised.
//!
//! ## Flow
//! ```text
//! run():
//!   ├─► poll the first cycle.call() once  (the first iteration is entered)
//!   ├─► started.fire()                   (wakes Routine::running() waiters)
//!   ├─► loop {
//!   │     finish the current cycle.call()
//!   │       └─ Err(e) ─► publish CycleFailed, handler(e)
//!   │     token.stopping()? ─► break
//!   │   }
//!   ├─► cycle.finish()
//!   │     └─ Err(e) ─► publish CycleFailed, handler(e)
//!   └─► started.rearm()                  (also on unwind)
//! ```
//!
//! ## Rules
//! - The cycle runs at least once per `run()`, even if the token is already raised.
//! - The start signal fires only after the first iteration has been polled, so a
//!   `running()` waiter never wakes before the cycle body was entered.
//! - After `stop()` is observed no further cycle begins.
//! - `run()` must not be called concurrently on the same routine.

use std::sync::Arc;
use std::task::Poll;

use crate::{
    core::{
        cycle::{CycleRef, ErrorHandler},
        signal::{StartSignal, Started},
        token::StopToken,
    },
    error::TaskError,
    events::{Bus, Event, EventKind},
};

/// Repeats a cycle until its stop token is raised.
pub struct Routine {
    token: Arc<StopToken>,
    cycle: CycleRef,
    handler: ErrorHandler,
    started: StartSignal,
    name: Arc<str>,
    bus: Option<Bus>,
}

impl Routine {
    /// Creates a routine bound to `token`.
    pub fn new(token: Arc<StopToken>, cycle: CycleRef, handler: ErrorHandler) -> Self {
        Self {
            token,
            cycle,
            handler,
            started: StartSignal::named("routine"),
            name: Arc::from("routine"),
            bus: None,
        }
    }

    /// Names the routine in its events and in start errors.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self.started = StartSignal::named(Arc::clone(&self.name));
        self
    }

    /// Publishes `CycleFailed` events for this routine under `name`.
    pub fn with_bus(self, name: impl Into<Arc<str>>, bus: Bus) -> Self {
        let mut routine = self.named(name);
        routine.bus = Some(bus);
        routine
    }

    /// Runs the cycle until the stop token is raised.
    pub async fn run(&self) {
        debug_assert!(
            !self.started.is_active(),
            "Routine::run called while another run is active"
        );
        let _rearm = Rearm(&self.started);

        let mut first = self.cycle.call();
        let entered = futures::poll!(&mut first);
        self.started.fire();
        let mut outcome = match entered {
            Poll::Ready(res) => res,
            Poll::Pending => first.await,
        };

        loop {
            if let Err(err) = outcome {
                self.report(err);
            }
            if self.token.stopping() {
                break;
            }
            outcome = self.cycle.call().await;
        }

        if let Err(err) = self.cycle.finish().await {
            self.report(err);
        }
    }

    /// Returns a handle that completes once the current (or next) run has begun.
    pub fn running(&self) -> Started {
        self.started.subscribe()
    }

    /// Returns `true` while [`run`](Routine::run) is executing.
    pub fn is_running(&self) -> bool {
        self.started.is_active()
    }

    /// The stop token this routine observes.
    pub fn token(&self) -> &Arc<StopToken> {
        &self.token
    }

    fn report(&self, err: TaskError) {
        if let Some(bus) = &self.bus {
            bus.publish(
                Event::new(EventKind::CycleFailed)
                    .with_task(Arc::clone(&self.name))
                    .with_reason(err.to_string()),
            );
        }
        (self.handler)(err);
    }
}

/// Rearms the start signal when a run ends, including by unwinding.
struct Rearm<'a>(&'a StartSignal);

impl Drop for Rearm<'_> {
    fn drop(&mut self) {
        self.0.rearm();
    }
}
