//! # Lifecycle events emitted by tasks, routines and the job handler.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Task events**: worker start/stop transitions and cycle failures
//! - **Job events**: jobs tracked, reaped, failed and drained by a [`JobHandler`](crate::JobHandler)
//! - **Subscriber events**: delivery problems inside a [`SubscriberSet`](crate::SubscriberSet)
//!
//! The [`Event`] struct carries metadata such as timestamps, task name,
//! reasons and the number of pending jobs.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use stoppable::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CycleFailed)
//!     .with_task("poller")
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::CycleFailed);
//! assert_eq!(ev.task.as_deref(), Some("poller"));
//! assert_eq!(ev.reason.as_deref(), Some("connection refused"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task events ===
    /// `start()` accepted and is launching a worker.
    ///
    /// Sets: `task`
    TaskStarting,

    /// The routine signalled that it runs; `start()` is about to return.
    ///
    /// Sets: `task`
    TaskStarted,

    /// `stop()` raised the stop token and is joining the worker.
    ///
    /// Sets: `task`
    TaskStopRequested,

    /// The worker was joined.
    ///
    /// Sets: `task`
    TaskStopped,

    /// A cycle iteration returned an error (forwarded to the handler).
    ///
    /// Sets: `task`, `reason`
    CycleFailed,

    /// A panic escaped the worker (forwarded to the handler).
    ///
    /// Sets: `task`, `reason`
    WorkerPanicked,

    // === Job events ===
    /// A job handle was added to the pending collection.
    ///
    /// Sets: `task` (handler name), `pending`
    JobAdded,

    /// A completed job was reaped successfully.
    ///
    /// Sets: `task` (handler name), `pending`
    JobReaped,

    /// A completed job reported a failure (forwarded to the handler).
    ///
    /// Sets: `task` (handler name), `reason`, `pending`
    JobFailed,

    /// The shutdown drain finished; every tracked job was awaited.
    ///
    /// Sets: `task` (handler name), `pending` (jobs awaited by the drain)
    JobsDrained,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task (or job handler / subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Number of jobs still pending after the event.
    pub pending: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            pending: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the pending job count.
    #[inline]
    pub fn with_pending(mut self, pending: usize) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events that report a failure forwarded to an error handler.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::CycleFailed | EventKind::WorkerPanicked | EventKind::JobFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::TaskStarting);
        let b = Event::new(EventKind::TaskStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_failure_classification() {
        assert!(Event::new(EventKind::JobFailed).is_failure());
        assert!(!Event::new(EventKind::JobReaped).with_pending(3).is_failure());
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
