//! # JobHandler: reaps completed jobs and drains the rest on shutdown.
//!
//! Runs as the [`Cycle`] of its own [`Task`](crate::Task):
//! - every iteration is one **reap step**;
//! - [`Cycle::finish`] is the **drain**, executed once when the task stops.
//!
//! ## Reap step
//! ```text
//! batch = take(pending)                         (under the lock)
//! for job in batch (FIFO):
//!     finished?                  ─► settle(outcome)   (failure → handler)
//!     reap_timeout >= 1ms?       ─► timeout(reap_timeout, job) ─► settle | keep
//!     otherwise                  ─► keep
//! pending = kept ++ pending                     (under the lock; jobs added meanwhile stay behind)
//! nothing settled?               ─► sleep(reap_timeout)
//! ```
//!
//! ## Drain
//! Repeatedly takes the whole queue and awaits every job without timeout until the
//! queue is empty, so no job added before the drain is abandoned.
//!
//! ## Rules
//! - The pending queue is only ever mutated under its mutex; jobs are polled outside it.
//! - A taken job is owned by exactly one reaper, so it is settled exactly once.
//! - One job's failure never stops the reaping of the others.
//! - A job is counted in `pending()` before it becomes visible to a reaper.
//! - Sub-millisecond timeouts never arm a timer per job: tokio rounds timers up to 1ms,
//!   so an unfinished job is only checked, and the idle sleep bounds the spin instead.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinHandle};
use tokio::time;

use crate::{
    config::JobConfig,
    core::{Cycle, ErrorHandler},
    error::TaskError,
    events::{Bus, Event, EventKind},
};

/// Shortest wait a tokio timer can express.
const TIMER_RESOLUTION: Duration = Duration::from_millis(1);

/// Handle of a dispatched job.
pub type Job = JoinHandle<Result<(), TaskError>>;

/// Tracks in-flight jobs, reaps finished ones and forwards their failures.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use stoppable::{JobHandler, Task, TaskError};
///
/// # #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
/// # async fn main() -> Result<(), stoppable::RuntimeError> {
/// let jobs = Arc::new(JobHandler::new(|err| eprintln!("job failed: {err}")));
/// let reaper = Task::new(jobs.clone(), |err| eprintln!("reaper failed: {err}"));
/// reaper.start().await?;
///
/// jobs.emplace(async {
///     tokio::time::sleep(Duration::from_millis(10)).await;
///     Err::<(), _>(TaskError::fail("upload rejected"))
/// });
///
/// reaper.stop().await; // waits for the job above
/// assert_eq!(jobs.pending(), 0);
/// # Ok(())
/// # }
/// ```
pub struct JobHandler {
    name: Arc<str>,
    handler: ErrorHandler,
    cfg: JobConfig,
    queue: Mutex<VecDeque<Job>>,
    tracked: AtomicUsize,
    bus: Option<Bus>,
}

impl JobHandler {
    /// Creates a handler with the default [`JobConfig`] (10µs reap timeout).
    pub fn new<H>(handler: H) -> Self
    where
        H: Fn(TaskError) + Send + Sync + 'static,
    {
        Self::with_config(handler, JobConfig::default())
    }

    /// Creates a handler with an explicit configuration.
    pub fn with_config<H>(handler: H, cfg: JobConfig) -> Self
    where
        H: Fn(TaskError) + Send + Sync + 'static,
    {
        Self {
            name: Arc::from("jobs"),
            handler: Arc::new(handler),
            cfg,
            queue: Mutex::new(VecDeque::new()),
            tracked: AtomicUsize::new(0),
            bus: None,
        }
    }

    /// Publishes job events to `bus` under `name`.
    pub fn with_bus(mut self, name: impl Into<Arc<str>>, bus: Bus) -> Self {
        self.name = name.into();
        self.bus = Some(bus);
        self
    }

    /// Starts tracking an already dispatched job.
    ///
    /// Safe to call from any thread, whether or not the owning task is running.
    pub fn add(&self, job: Job) {
        let pending = {
            let mut queue = self.queue();
            queue.push_back(job);
            self.tracked.fetch_add(1, Ordering::AcqRel) + 1
        };
        self.publish(Event::new(EventKind::JobAdded).with_pending(pending));
    }

    /// Dispatches `job` onto the current runtime and tracks its handle.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like [`tokio::spawn`].
    pub fn emplace<F>(&self, job: F)
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.add(tokio::spawn(job));
    }

    /// Number of jobs added and not yet reaped.
    pub fn pending(&self) -> usize {
        self.tracked.load(Ordering::Acquire)
    }

    /// Runs one reap step; returns how many jobs were settled.
    pub async fn reap(&self) -> usize {
        let timeout = self.cfg.reap_timeout_clamped();
        let timed = timeout >= TIMER_RESOLUTION;
        let batch = mem::take(&mut *self.queue());

        let mut kept = VecDeque::with_capacity(batch.len());
        let mut settled = 0;
        for mut job in batch {
            let outcome = if job.is_finished() {
                Some((&mut job).await)
            } else if timed {
                time::timeout(timeout, &mut job).await.ok()
            } else {
                None
            };
            match outcome {
                Some(outcome) => {
                    self.settle(outcome);
                    settled += 1;
                }
                None => kept.push_back(job),
            }
        }

        if !kept.is_empty() {
            let mut queue = self.queue();
            kept.append(&mut queue);
            *queue = kept;
        }
        settled
    }

    /// Awaits every tracked job to completion; returns how many jobs were settled.
    pub async fn drain(&self) -> usize {
        let mut settled = 0;
        loop {
            let batch = mem::take(&mut *self.queue());
            if batch.is_empty() {
                break;
            }
            for job in batch {
                let outcome = job.await;
                self.settle(outcome);
                settled += 1;
            }
        }

        tracing::debug!(handler = %self.name, settled, "jobs drained");
        self.publish(Event::new(EventKind::JobsDrained).with_pending(settled));
        settled
    }

    fn settle(&self, outcome: Result<Result<(), TaskError>, JoinError>) {
        let pending = self
            .tracked
            .fetch_sub(1, Ordering::AcqRel)
            .saturating_sub(1);
        let err = match outcome {
            Ok(Ok(())) => {
                self.publish(Event::new(EventKind::JobReaped).with_pending(pending));
                return;
            }
            Ok(Err(err)) => err,
            Err(join) => TaskError::from(join),
        };

        self.publish(
            Event::new(EventKind::JobFailed)
                .with_reason(err.to_string())
                .with_pending(pending),
        );
        (self.handler)(err);
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_task(Arc::clone(&self.name)));
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cycle for JobHandler {
    async fn call(&self) -> Result<(), TaskError> {
        if self.reap().await == 0 {
            time::sleep(self.cfg.reap_timeout_clamped()).await;
        }
        Ok(())
    }

    async fn finish(&self) -> Result<(), TaskError> {
        self.drain().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn collecting() -> (JobHandler, Arc<Mutex<Vec<TaskError>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let jobs = JobHandler::new(move |e| sink.lock().unwrap().push(e));
        (jobs, errors)
    }

    async fn explode() -> Result<(), TaskError> {
        panic!("job exploded")
    }

    fn delayed(ms: u64, result: Result<(), TaskError>) -> Job {
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(ms)).await;
            result
        })
    }

    #[tokio::test]
    async fn test_reap_keeps_unfinished_jobs() {
        let (jobs, errors) = collecting();
        jobs.add(delayed(0, Ok(())));
        jobs.add(delayed(10_000, Ok(())));
        time::sleep(Duration::from_millis(5)).await;

        assert_eq!(jobs.reap().await, 1);
        assert_eq!(jobs.pending(), 1);
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_each_failure_is_reported_once() {
        let (jobs, errors) = collecting();
        jobs.add(delayed(0, Err(TaskError::fail("a"))));
        jobs.add(delayed(0, Ok(())));
        jobs.add(delayed(0, Err(TaskError::fail("b"))));
        time::sleep(Duration::from_millis(5)).await;

        assert_eq!(jobs.reap().await, 3);
        assert_eq!(jobs.reap().await, 0);
        assert_eq!(
            *errors.lock().unwrap(),
            vec![TaskError::fail("a"), TaskError::fail("b")]
        );
    }

    #[tokio::test]
    async fn test_panicking_and_aborted_jobs_are_reported() {
        let (jobs, errors) = collecting();
        jobs.emplace(explode());
        let aborted = delayed(10_000, Ok(()));
        aborted.abort();
        jobs.add(aborted);

        assert_eq!(jobs.drain().await, 2);
        assert_eq!(
            *errors.lock().unwrap(),
            vec![
                TaskError::Panicked {
                    error: "job exploded".into()
                },
                TaskError::Canceled,
            ]
        );
    }

    #[tokio::test]
    async fn test_drain_waits_without_timeout() {
        let (jobs, _) = collecting();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = Arc::clone(&done);
            jobs.emplace(async move {
                time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            });
        }

        assert_eq!(jobs.drain().await, 3);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(jobs.pending(), 0);
    }

    #[tokio::test]
    async fn test_unfinished_jobs_stay_queued_across_steps() {
        let (jobs, _) = collecting();
        for _ in 0..3 {
            jobs.add(delayed(10_000, Ok(())));
        }

        assert_eq!(jobs.reap().await, 0);
        assert_eq!(jobs.reap().await, 0);
        assert_eq!(jobs.pending(), 3);
        assert_eq!(jobs.queue().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_millisecond_reap_arms_no_timer_per_job() {
        let (jobs, _) = collecting();
        for _ in 0..50 {
            jobs.add(tokio::spawn(std::future::pending::<Result<(), TaskError>>()));
        }
        jobs.add(tokio::spawn(async { Ok::<_, TaskError>(()) }));
        tokio::task::yield_now().await;

        let begun = time::Instant::now();
        assert_eq!(jobs.reap().await, 1);
        assert_eq!(begun.elapsed(), Duration::ZERO);
        assert_eq!(jobs.pending(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_millisecond_reap_waits_on_each_job() {
        let cfg = JobConfig {
            reap_timeout: Duration::from_millis(2),
        };
        let jobs = JobHandler::with_config(|_| {}, cfg);
        jobs.add(tokio::spawn(std::future::pending::<Result<(), TaskError>>()));
        jobs.add(delayed(3, Ok(())));

        assert_eq!(jobs.reap().await, 1);
        assert_eq!(jobs.pending(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_add_and_reap_keep_count_consistent() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 2_000;

        let jobs = Arc::new(JobHandler::new(|_| {}));
        let rt = tokio::runtime::Handle::current();
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let jobs = Arc::clone(&jobs);
                let rt = rt.clone();
                std::thread::spawn(move || {
                    for _ in 0..PER_PRODUCER {
                        jobs.add(rt.spawn(async { Ok::<_, TaskError>(()) }));
                    }
                })
            })
            .collect();

        let mut settled = 0;
        while producers.iter().any(|p| !p.is_finished()) {
            settled += jobs.reap().await;
            assert!(jobs.pending() <= PRODUCERS * PER_PRODUCER);
            tokio::task::yield_now().await;
        }
        for producer in producers {
            producer.join().unwrap();
        }
        settled += jobs.drain().await;

        assert_eq!(settled, PRODUCERS * PER_PRODUCER);
        assert_eq!(jobs.pending(), 0);
        assert!(jobs.queue().is_empty());
    }

    #[tokio::test]
    async fn test_events_track_pending_count() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let (jobs, _) = collecting();
        let jobs = jobs.with_bus("uploads", bus);

        jobs.add(delayed(0, Err(TaskError::fail("x"))));
        jobs.drain().await;

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let kinds: Vec<EventKind> = events.iter().map(|ev| ev.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::JobAdded, EventKind::JobFailed, EventKind::JobsDrained]
        );
        assert_eq!(events[0].pending, Some(1));
        assert_eq!(events[1].pending, Some(0));
        assert!(events.iter().all(|ev| ev.task.as_deref() == Some("uploads")));
    }
}
