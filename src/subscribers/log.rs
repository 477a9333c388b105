//! # LogWriter: renders events through `tracing`.
//!
//! Failures are logged at `warn`, lifecycle transitions at `info` and per-job
//! bookkeeping at `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  stoppable: task starting task="poller"
//! WARN  stoppable: cycle failed task="poller" reason="execution failed: timeout"
//! DEBUG stoppable: job reaped task="uploads" pending=3
//! INFO  stoppable: task stopped task="poller"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskStarting => tracing::info!(target: "stoppable", task, "task starting"),
            EventKind::TaskStarted => tracing::info!(target: "stoppable", task, "task started"),
            EventKind::TaskStopRequested => {
                tracing::info!(target: "stoppable", task, "task stop requested")
            }
            EventKind::TaskStopped => tracing::info!(target: "stoppable", task, "task stopped"),
            EventKind::CycleFailed => {
                tracing::warn!(target: "stoppable", task, reason, "cycle failed")
            }
            EventKind::WorkerPanicked => {
                tracing::warn!(target: "stoppable", task, reason, "worker panicked")
            }
            EventKind::JobAdded => {
                tracing::debug!(target: "stoppable", task, pending = ?e.pending, "job added")
            }
            EventKind::JobReaped => {
                tracing::debug!(target: "stoppable", task, pending = ?e.pending, "job reaped")
            }
            EventKind::JobFailed => {
                tracing::warn!(target: "stoppable", task, reason, pending = ?e.pending, "job failed")
            }
            EventKind::JobsDrained => {
                tracing::info!(target: "stoppable", task, settled = ?e.pending, "jobs drained")
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "stoppable", subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: "stoppable", subscriber = task, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_kind_is_rendered() {
        let writer = LogWriter::new();
        for kind in [
            EventKind::TaskStarting,
            EventKind::CycleFailed,
            EventKind::JobReaped,
            EventKind::SubscriberPanicked,
        ] {
            writer
                .on_event(&Event::new(kind).with_task("t").with_pending(1))
                .await;
        }
        assert_eq!(writer.name(), "LogWriter");
    }
}
