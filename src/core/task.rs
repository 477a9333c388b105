//! # Task: owns a routine and the worker running it.
//!
//! A [`Task`] wraps one [`Routine`] and gives callers idempotent
//! [`start`](Task::start) / [`stop`](Task::stop) control over a dedicated tokio worker.
//!
//! ## State machine
//! ```text
//!            start()                      stop()
//!   Idle ──────────────► Running ──────────────────► Idle
//!    ▲  (returns after the         (returns after the   │
//!    │   first cycle was entered)   worker was joined)  │
//!    └──────────────────────────────────────────────────┘
//!
//! start() while Running → Ok(false)   stop() while Idle → false
//! ```
//!
//! ## start()
//! ```text
//! transition lock
//!   ├─► join a worker that already exited on its own (panic → handler)
//!   ├─► token.reset(), started = routine.running()
//!   ├─► spawn worker(Weak<Routine>)
//!   └─► select (biased):
//!         started fires   → Ok(true)
//!         worker exits    → Err(StartSignalLost)   (panic → handler)
//!         start_timeout   → Err(StartTimeout)      (worker kept for stop())
//! ```
//!
//! ## stop()
//! ```text
//! transition lock
//!   ├─► token.stop()
//!   └─► await worker: Err(JoinError) → handler(TaskError::Panicked)
//! ```
//!
//! ## Rules
//! - `start()` and `stop()` are serialized by an internal async mutex.
//! - `running()` never waits on that mutex; it reads an atomic flag the worker clears on exit.
//! - The worker holds only a `Weak<Routine>` until it begins; if the task is gone it exits.
//! - Dropping a running task raises the stop token and hands the worker to a detached
//!   reaper on the current runtime, which joins it and forwards a panic to the handler.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio::{sync, time};

use crate::{
    config::Config,
    core::{
        cycle::{CycleFn, CycleRef, ErrorHandler},
        routine::Routine,
        signal::Started,
        token::StopToken,
    },
    error::{RuntimeError, TaskError},
    events::{Bus, Event, EventKind},
};

/// Runs a [`Routine`] on a dedicated worker with synchronous-style start/stop control.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use stoppable::{Task, TaskError};
///
/// # #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
/// # async fn main() -> Result<(), stoppable::RuntimeError> {
/// let cycles = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&cycles);
///
/// let task = Task::from_fn(
///     move || {
///         let counter = Arc::clone(&counter);
///         async move {
///             counter.fetch_add(1, Ordering::SeqCst);
///             tokio::time::sleep(std::time::Duration::from_millis(5)).await;
///             Ok::<_, TaskError>(())
///         }
///     },
///     |err| eprintln!("cycle failed: {err}"),
/// );
///
/// assert!(task.start().await?);
/// assert!(cycles.load(Ordering::SeqCst) >= 1);
/// assert!(task.stop().await);
/// assert!(!task.running());
/// # Ok(())
/// # }
/// ```
///
/// ## Dropping
/// Dropping a running task raises its stop token and joins the worker on a detached
/// reaper task. Outside a tokio runtime no reaper can be spawned: the worker is only
/// asked to stop and may outlive the `Task` until its current cycle returns. Call
/// [`stop`](Task::stop) before dropping when the worker must be gone.
pub struct Task {
    name: Arc<str>,
    cfg: Config,
    token: Arc<StopToken>,
    routine: Arc<Routine>,
    handler: ErrorHandler,
    bus: Option<Bus>,
    alive: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    transition: sync::Mutex<()>,
}

/// How a launch attempt ended.
enum Launch {
    Started,
    Exited(Result<(), JoinError>),
    TimedOut(Duration),
}

impl Task {
    /// Creates a task around `cycle` with the default [`Config`].
    pub fn new<H>(cycle: CycleRef, handler: H) -> Self
    where
        H: Fn(TaskError) + Send + Sync + 'static,
    {
        Self::builder(cycle, handler).build()
    }

    /// Creates a task from a closure producing one cycle future per iteration.
    pub fn from_fn<F, Fut, H>(f: F, handler: H) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
        H: Fn(TaskError) + Send + Sync + 'static,
    {
        Self::new(CycleFn::arc(f), handler)
    }

    /// Starts building a task with custom configuration or an event bus.
    pub fn builder<H>(cycle: CycleRef, handler: H) -> TaskBuilder
    where
        H: Fn(TaskError) + Send + Sync + 'static,
    {
        TaskBuilder::new(cycle, Arc::new(handler))
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stop token shared with the routine.
    ///
    /// An error handler may capture it and call [`StopToken::stop`] to end the
    /// routine from inside; the next `start()` or `stop()` joins that worker.
    pub fn token(&self) -> &Arc<StopToken> {
        &self.token
    }

    /// Returns the event bus, if one is attached.
    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    /// Returns `true` while the worker is alive.
    ///
    /// Never blocks on a concurrent `start()`/`stop()`.
    #[inline]
    pub fn running(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Launches the routine on a new worker and waits until its first cycle was entered.
    ///
    /// Returns `Ok(true)` if a worker was launched, `Ok(false)` if the task was already running.
    ///
    /// # Errors
    /// - [`RuntimeError::StartSignalLost`] if the worker exited before signalling start
    ///   (a panic is also forwarded to the handler).
    /// - [`RuntimeError::StartTimeout`] if [`Config::start_timeout`] elapsed first; the worker
    ///   is kept and a later [`stop`](Task::stop) joins it.
    pub async fn start(&self) -> Result<bool, RuntimeError> {
        if self.running() {
            return Ok(false);
        }
        let _transition = self.transition.lock().await;
        if self.running() {
            return Ok(false);
        }
        self.join_exited().await;

        tracing::debug!(task = %self.name, "starting task");
        self.publish(EventKind::TaskStarting);

        self.token.reset();
        let started = self.routine.running();
        self.alive.store(true, Ordering::Release);
        let mut worker = tokio::spawn(drive(
            Arc::downgrade(&self.routine),
            Arc::clone(&self.alive),
        ));

        match self.launch(started, &mut worker).await {
            Launch::Started => {
                *self.slot() = Some(worker);
                self.publish(EventKind::TaskStarted);
                Ok(true)
            }
            Launch::Exited(joined) => {
                self.alive.store(false, Ordering::Release);
                if let Err(err) = joined {
                    self.forward_join_error(err);
                }
                Err(RuntimeError::StartSignalLost {
                    task: self.name.to_string(),
                })
            }
            Launch::TimedOut(timeout) => {
                *self.slot() = Some(worker);
                tracing::warn!(task = %self.name, ?timeout, "task did not signal start in time");
                Err(RuntimeError::StartTimeout {
                    task: self.name.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Raises the stop token and waits for the worker to exit.
    ///
    /// Returns `true` if a running worker was stopped, `false` if the task was idle.
    /// A panic escaping the worker is forwarded to the handler, never returned.
    pub async fn stop(&self) -> bool {
        if !self.running() && self.slot().is_none() {
            return false;
        }
        let _transition = self.transition.lock().await;
        let Some(worker) = self.slot().take() else {
            return false;
        };

        let was_running = self.running();
        if was_running {
            tracing::debug!(task = %self.name, "stopping task");
            self.publish(EventKind::TaskStopRequested);
        }
        self.token.stop();
        self.join(worker).await;

        if was_running {
            self.publish(EventKind::TaskStopped);
        }
        was_running
    }

    /// Waits for the start signal, racing it against worker exit and the start timeout.
    async fn launch(&self, started: Started, worker: &mut JoinHandle<()>) -> Launch {
        let race = async {
            tokio::select! {
                biased;
                res = started.wait() => match res {
                    Ok(()) => Launch::Started,
                    Err(_) => Launch::Exited(Ok(())),
                },
                joined = &mut *worker => Launch::Exited(joined),
            }
        };

        match self.cfg.start_timeout() {
            Some(limit) => time::timeout(limit, race)
                .await
                .unwrap_or(Launch::TimedOut(limit)),
            None => race.await,
        }
    }

    /// Joins a worker whose routine ended on its own (e.g. the handler raised the token).
    async fn join_exited(&self) {
        let exited = self.slot().take();
        if let Some(worker) = exited {
            self.join(worker).await;
        }
    }

    async fn join(&self, worker: JoinHandle<()>) {
        if let Err(err) = worker.await {
            self.forward_join_error(err);
        }
    }

    fn forward_join_error(&self, err: JoinError) {
        let err = TaskError::from(err);
        tracing::warn!(task = %self.name, error = %err, "task worker panicked");
        if let Some(bus) = &self.bus {
            bus.publish(
                Event::new(EventKind::WorkerPanicked)
                    .with_task(Arc::clone(&self.name))
                    .with_reason(err.to_string()),
            );
        }
        (self.handler)(err);
    }

    fn publish(&self, kind: EventKind) {
        if let Some(bus) = &self.bus {
            bus.publish(Event::new(kind).with_task(Arc::clone(&self.name)));
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.token.stop();
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };

        let handler = Arc::clone(&self.handler);
        match Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    if let Err(err) = worker.await {
                        handler(TaskError::from(err));
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    task = %self.name,
                    "task dropped outside a runtime; worker stops on its own"
                );
            }
        }
    }
}

/// Worker body: runs the routine if the owning task still exists.
async fn drive(routine: Weak<Routine>, alive: Arc<AtomicBool>) {
    let _alive = AliveGuard(alive);
    if let Some(routine) = routine.upgrade() {
        routine.run().await;
    }
}

/// Clears the alive flag when the worker exits, including by unwinding.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for [`Task`] with fluent API.
pub struct TaskBuilder {
    cycle: CycleRef,
    handler: ErrorHandler,
    cfg: Config,
    bus: Option<Bus>,
    token: Option<Arc<StopToken>>,
}

impl TaskBuilder {
    fn new(cycle: CycleRef, handler: ErrorHandler) -> Self {
        Self {
            cycle,
            handler,
            cfg: Config::default(),
            bus: None,
            token: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the task name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.cfg.name = name.into();
        self
    }

    /// Bounds how long `start()` waits for the routine to begin (`0s` = no limit).
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.start_timeout = timeout;
        self
    }

    /// Uses a caller-created stop token instead of a fresh one.
    ///
    /// `start()` resets the token, so it should not be shared with another task.
    pub fn with_token(mut self, token: Arc<StopToken>) -> Self {
        self.token = Some(token);
        self
    }

    /// Publishes lifecycle events to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Publishes lifecycle events to a new bus sized by [`Config::bus_capacity`].
    pub fn with_events(mut self) -> Self {
        self.bus = Some(Bus::new(self.cfg.bus_capacity_clamped()));
        self
    }

    /// Builds the task (idle).
    pub fn build(self) -> Task {
        let name: Arc<str> = Arc::from(self.cfg.name.as_ref());
        let token = self.token.unwrap_or_default();

        let mut routine = Routine::new(
            Arc::clone(&token),
            self.cycle,
            Arc::clone(&self.handler),
        )
        .named(Arc::clone(&name));
        if let Some(bus) = &self.bus {
            routine = routine.with_bus(Arc::clone(&name), bus.clone());
        }

        Task {
            name,
            cfg: self.cfg,
            token,
            routine: Arc::new(routine),
            handler: self.handler,
            bus: self.bus,
            alive: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            transition: sync::Mutex::new(()),
        }
    }
}
