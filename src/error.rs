//! Error types used by routines, tasks and the job handler.
//!
//! This module defines two error enums:
//!
//! - [`TaskError`]: failures of user work (a cycle iteration or a job), always
//!   delivered to the caller-supplied error handler, never returned from `stop()`.
//! - [`RuntimeError`]: failures of the lifecycle machinery itself, returned from
//!   [`Task::start`](crate::Task::start).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// # Errors produced by the lifecycle machinery.
///
/// These describe a worker that could not be brought up, as opposed to
/// failures inside the work it runs.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The worker exited (or its routine was dropped) before signalling that it started.
    #[error("task {task} exited before signalling start")]
    StartSignalLost {
        /// Name of the task that failed to start.
        task: String,
    },

    /// The worker did not signal start within the configured start timeout.
    #[error("task {task} did not start within {timeout:?}")]
    StartTimeout {
        /// Name of the task that failed to start.
        task: String,
        /// The configured start timeout.
        timeout: Duration,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stoppable::RuntimeError;
    ///
    /// let err = RuntimeError::StartSignalLost { task: "ticker".into() };
    /// assert_eq!(err.as_label(), "runtime_start_signal_lost");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::StartSignalLost { .. } => "runtime_start_signal_lost",
            RuntimeError::StartTimeout { .. } => "runtime_start_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::StartSignalLost { task } => {
                format!("start signal lost; task={task}")
            }
            RuntimeError::StartTimeout { task, timeout } => {
                format!("start timeout after {timeout:?}; task={task}")
            }
        }
    }
}

/// # Errors produced by user work.
///
/// A cycle iteration or a job reports [`TaskError::Fail`]; the runtime adds
/// [`TaskError::Panicked`] and [`TaskError::Canceled`] when a worker or a job
/// does not return normally.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A cycle iteration or a job returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A worker or a job panicked.
    #[error("panicked: {error}")]
    Panicked {
        /// The panic payload, if it was a string.
        error: String,
    },

    /// A job was aborted before it completed.
    #[error("job cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use stoppable::TaskError;
    ///
    /// let err = TaskError::fail("disk full");
    /// assert_eq!(err.to_string(), "execution failed: disk full");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { error } => format!("panic: {error}"),
            TaskError::Canceled => "job cancelled".to_string(),
        }
    }
}

impl From<JoinError> for TaskError {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            return TaskError::Canceled;
        }
        match err.try_into_panic() {
            Ok(payload) => TaskError::Panicked {
                error: panic_message(payload.as_ref()),
            },
            Err(err) => TaskError::Panicked {
                error: err.to_string(),
            },
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
