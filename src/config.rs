//! # Task and job-handler configuration.
//!
//! Provides [`Config`] (settings for one [`Task`](crate::Task)) and [`JobConfig`]
//! (settings for a [`JobHandler`](crate::JobHandler)).
//!
//! ## Sentinel values
//! - `start_timeout = 0s` → `start()` waits for the start signal without limit
//! - `bus_capacity = 0` → clamped to 1 by the [`Bus`](crate::Bus)
//! - `reap_timeout = 0s` → clamped to 1µs so an empty handler never spins

use std::borrow::Cow;
use std::time::Duration;

/// Configuration for a single [`Task`](crate::Task).
///
/// ## Field semantics
/// - `name`: Task name used in events and errors
/// - `start_timeout`: Maximum wait in `start()` for the worker to begin its first cycle (`0s` = no limit)
/// - `bus_capacity`: Event bus ring buffer size used when the task builds its own bus (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Human-readable task name.
    pub name: Cow<'static, str>,

    /// Maximum time `start()` waits for the routine to signal that it runs.
    ///
    /// - `Duration::ZERO` = wait without limit
    /// - `> 0` = `start()` returns `RuntimeError::StartTimeout` once exceeded
    pub start_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Creates a default configuration with the given task name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the start timeout as an `Option`.
    ///
    /// - `None` → wait without limit
    /// - `Some(d)` → bounded wait
    #[inline]
    pub fn start_timeout(&self) -> Option<Duration> {
        if self.start_timeout == Duration::ZERO {
            None
        } else {
            Some(self.start_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `name = "task"`
    /// - `start_timeout = 0s` (wait without limit)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("task"),
            start_timeout: Duration::ZERO,
            bus_capacity: 1024,
        }
    }
}

/// Configuration for a [`JobHandler`](crate::JobHandler).
#[derive(Clone, Copy, Debug)]
pub struct JobConfig {
    /// Bounded wait used when polling one pending job for completion,
    /// and the idle sleep when no jobs are pending.
    pub reap_timeout: Duration,
}

impl JobConfig {
    /// Smallest reap timeout the handler will use.
    pub const MIN_REAP_TIMEOUT: Duration = Duration::from_micros(1);

    /// Returns the reap timeout, never below [`JobConfig::MIN_REAP_TIMEOUT`].
    #[inline]
    pub fn reap_timeout_clamped(&self) -> Duration {
        self.reap_timeout.max(Self::MIN_REAP_TIMEOUT)
    }
}

impl Default for JobConfig {
    /// Default configuration: `reap_timeout = 10µs`.
    fn default() -> Self {
        Self {
            reap_timeout: Duration::from_micros(10),
        }
    }
}
