//! # Resettable "routine started" notification.
//!
//! [`StartSignal`] fires once per [`Routine::run`](crate::Routine::run) and is
//! rearmed when the run ends, so every restart can be observed by a fresh waiter.
//!
//! ## State
//! ```text
//! watch<Lifecycle { runs, active }>
//!
//! fire()   : runs += 1, active = true     (top of run)
//! rearm()  : active = false               (end of run)
//!
//! subscribe():
//!   active  → Started { target: runs }     (already complete)
//!   idle    → Started { target: runs + 1 } (completes on the next fire)
//! ```
//!
//! Waiters compare run counts instead of reading `active`, so a handle taken
//! before a very short run still completes after that run has already been rearmed.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::RuntimeError;

#[derive(Clone, Copy, Debug, Default)]
struct Lifecycle {
    runs: u64,
    active: bool,
}

/// Owner side of the start notification.
#[derive(Debug)]
pub struct StartSignal {
    tx: watch::Sender<Lifecycle>,
    task: Arc<str>,
}

impl StartSignal {
    /// Creates an idle signal for a routine named `"routine"`.
    pub fn new() -> Self {
        Self::named("routine")
    }

    /// Creates an idle signal; `task` names the routine in [`RuntimeError::StartSignalLost`].
    pub fn named(task: impl Into<Arc<str>>) -> Self {
        let (tx, _rx) = watch::channel(Lifecycle::default());
        Self {
            tx,
            task: task.into(),
        }
    }

    /// Marks the beginning of a run and wakes every pending waiter.
    pub fn fire(&self) {
        self.tx.send_modify(|s| {
            s.runs += 1;
            s.active = true;
        });
    }

    /// Marks the end of a run; later waiters wait for the next [`fire`](StartSignal::fire).
    pub fn rearm(&self) {
        self.tx.send_modify(|s| s.active = false);
    }

    /// Returns `true` while a run is in progress.
    pub fn is_active(&self) -> bool {
        self.tx.borrow().active
    }

    /// Number of runs signalled so far.
    pub fn runs(&self) -> u64 {
        self.tx.borrow().runs
    }

    /// Returns a wait-once handle for the current (or next) run.
    pub fn subscribe(&self) -> Started {
        let rx = self.tx.subscribe();
        let state = *rx.borrow();
        let target = if state.active {
            state.runs
        } else {
            state.runs + 1
        };
        Started {
            rx,
            target,
            task: Arc::clone(&self.task),
        }
    }
}

impl Default for StartSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait-once handle returned by [`Routine::running`](crate::Routine::running).
#[must_use = "a Started handle does nothing unless awaited"]
#[derive(Debug)]
pub struct Started {
    rx: watch::Receiver<Lifecycle>,
    target: u64,
    task: Arc<str>,
}

impl Started {
    /// Returns `true` if the awaited run has already begun.
    pub fn is_ready(&self) -> bool {
        self.rx.borrow().runs >= self.target
    }

    /// Waits until the awaited run begins.
    ///
    /// Fails with [`RuntimeError::StartSignalLost`] when the routine is dropped first.
    pub async fn wait(mut self) -> Result<(), RuntimeError> {
        let target = self.target;
        let outcome = self.rx.wait_for(|s| s.runs >= target).await.map(|_| ());
        outcome.map_err(|_| RuntimeError::StartSignalLost {
            task: self.task.to_string(),
        })
    }
}
