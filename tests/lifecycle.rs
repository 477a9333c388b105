use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stoppable::{CycleFn, CycleRef, Routine, StopToken, Task, TaskError, error_handler};

fn counting(calls: &Arc<AtomicUsize>) -> CycleRef {
    let calls = Arc::clone(calls);
    CycleFn::arc(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, TaskError>(())
        }
    })
}

fn collector() -> (
    impl Fn(TaskError) + Send + Sync + 'static,
    Arc<Mutex<Vec<TaskError>>>,
) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    (move |e: TaskError| sink.lock().unwrap().push(e), errors)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_lets_the_current_cycle_finish_and_starts_no_other() {
    let token = Arc::new(StopToken::new());
    let entered = Arc::new(AtomicUsize::new(0));
    let exited = Arc::new(AtomicUsize::new(0));
    let cycle: CycleRef = CycleFn::arc({
        let entered = Arc::clone(&entered);
        let exited = Arc::clone(&exited);
        move || {
            let entered = Arc::clone(&entered);
            let exited = Arc::clone(&exited);
            async move {
                entered.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                exited.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            }
        }
    });
    let routine = Arc::new(Routine::new(
        Arc::clone(&token),
        cycle,
        error_handler(|_| {}),
    ));

    let started = routine.running();
    let worker = tokio::spawn({
        let routine = Arc::clone(&routine);
        async move { routine.run().await }
    });
    started.wait().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    token.stop();
    worker.await.unwrap();

    let at_exit = entered.load(Ordering::SeqCst);
    assert_eq!(at_exit, exited.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(entered.load(Ordering::SeqCst), at_exit);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_returns_after_first_cycle_began() {
    for _ in 0..20 {
        let calls = Arc::new(AtomicUsize::new(0));
        let task = Task::new(counting(&calls), |_| {});

        assert!(task.start().await.unwrap());
        assert!(calls.load(Ordering::SeqCst) >= 1);
        task.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_returns_after_worker_exit() {
    let inside = Arc::new(AtomicBool::new(false));
    let task = Task::from_fn(
        {
            let inside = Arc::clone(&inside);
            move || {
                let inside = Arc::clone(&inside);
                async move {
                    inside.store(true, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.store(false, Ordering::SeqCst);
                    Ok::<_, TaskError>(())
                }
            }
        },
        |_| {},
    );

    task.start().await.unwrap();
    assert!(task.running());
    assert!(task.stop().await);
    assert!(!task.running());
    assert!(!inside.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_runs_the_cycle_in_each_phase() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::new(counting(&calls), |_| {});

    task.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    task.stop().await;
    let first = calls.load(Ordering::SeqCst);
    assert!(first >= 1);

    task.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    task.stop().await;
    assert!(calls.load(Ordering::SeqCst) > first);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_stop_is_a_no_op() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (handler, errors) = collector();
    let task = Task::new(counting(&calls), handler);

    task.start().await.unwrap();
    assert!(task.stop().await);
    let after_first = calls.load(Ordering::SeqCst);

    assert!(!task.stop().await);
    assert!(!task.running());
    assert_eq!(calls.load(Ordering::SeqCst), after_first);
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_while_running_is_a_no_op() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::new(counting(&calls), |_| {});

    assert!(task.start().await.unwrap());
    assert!(!task.start().await.unwrap());
    assert!(task.running());
    task.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nth_failure_reported_once_and_loop_continues() {
    const FAILING: usize = 3;
    let calls = Arc::new(AtomicUsize::new(0));
    let (handler, errors) = collector();
    let task = Task::from_fn(
        {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    if n == FAILING {
                        Err(TaskError::fail(format!("cycle {n}")))
                    } else {
                        Ok(())
                    }
                }
            }
        },
        handler,
    );

    task.start().await.unwrap();
    while calls.load(Ordering::SeqCst) <= FAILING {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    task.stop().await;

    assert!(calls.load(Ordering::SeqCst) > FAILING);
    assert_eq!(*errors.lock().unwrap(), vec![TaskError::fail("cycle 3")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_is_not_blocked_by_a_slow_stop() {
    let task = Arc::new(Task::from_fn(
        || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, TaskError>(())
        },
        |_| {},
    ));
    task.start().await.unwrap();

    let stopping = tokio::spawn({
        let task = Arc::clone(&task);
        async move { task.stop().await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;

    let observed = tokio::time::timeout(Duration::from_millis(5), async { task.running() }).await;
    assert_eq!(observed.ok(), Some(true));
    assert!(stopping.await.unwrap());
    assert!(!task.running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_can_stop_its_task_and_restart_works() {
    let token = Arc::new(StopToken::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::builder(
        CycleFn::arc({
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TaskError::fail("halt")) }
            }
        }),
        {
            let token = Arc::clone(&token);
            move |_| token.stop()
        },
    )
    .with_name("self-halting")
    .with_token(Arc::clone(&token))
    .build();
    assert!(Arc::ptr_eq(task.token(), &token));

    for round in 1..=2 {
        assert!(task.start().await.unwrap());
        while task.running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), round);
    }
    assert!(!task.stop().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn task_token_stops_the_routine_from_outside() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::new(counting(&calls), |_| {});
    task.start().await.unwrap();

    task.token().stop();
    while task.running() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let settled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), settled);
    assert!(!task.stop().await);
}
