//! End-to-end behavior of pools, runtimes and notifiers together.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use keel_threadpool::{
    Notify, ParkNotify, Task, TaskPoolError, TaskRuntime, ThreadPool, ThreadPoolConfig,
};

fn runtime_with_park() -> (Arc<TaskRuntime>, Arc<ParkNotify>) {
    let notify = Arc::new(ParkNotify::new());
    let runtime = Arc::new(TaskRuntime::new(notify.clone() as Arc<dyn Notify>));
    (runtime, notify)
}

/// Waits for and drains `expected` completions, panicking after `deadline`.
fn drain_until(runtime: &TaskRuntime, notify: &ParkNotify, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = 0;
    while seen < expected {
        assert!(Instant::now() < deadline, "timed out waiting for completions");
        notify.wait_timeout(Duration::from_millis(50));
        seen += runtime.drain();
    }
    assert_eq!(seen, expected);
}

#[test]
fn runs_tasks_and_delivers_completions_to_the_owner() {
    let (runtime, notify) = runtime_with_park();
    let pool = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(2).with_name("e2e").with_max_queue(4),
    )
    .unwrap();

    let owner = thread::current().id();
    let ran = Arc::new(AtomicUsize::new(0));
    let completed_on_owner = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let task = {
            let ran = Arc::clone(&ran);
            let completed_on_owner = Arc::clone(&completed_on_owner);
            Task::from_fn(
                move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    if thread::current().id() == owner {
                        completed_on_owner.fetch_add(1, Ordering::SeqCst);
                    }
                },
            )
        };

        // With the queue bounded at 4 a burst of 5 may hit backpressure;
        // draining a completion frees a slot.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match pool.submit(&task) {
                Ok(()) => break,
                Err(TaskPoolError::QueueFull { .. }) => {
                    assert!(Instant::now() < deadline, "backpressure never cleared");
                    notify.wait_timeout(Duration::from_millis(10));
                    runtime.drain();
                }
                Err(e) => panic!("unexpected submit error: {e}"),
            }
        }
    }

    // Some completions may already have been drained by the retry loop.
    let deadline = Instant::now() + Duration::from_secs(5);
    while completed_on_owner.load(Ordering::SeqCst) < 5 {
        assert!(Instant::now() < deadline, "timed out waiting for completions");
        notify.wait_timeout(Duration::from_millis(50));
        runtime.drain();
    }

    assert_eq!(ran.load(Ordering::SeqCst), 5);
    assert_eq!(completed_on_owner.load(Ordering::SeqCst), 5);
    pool.shutdown();
}

#[test]
fn single_worker_preserves_submission_order() {
    let (runtime, notify) = runtime_with_park();
    let pool = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("fifo"),
    )
    .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..8 {
        let order = Arc::clone(&order);
        let task = Task::from_fn(move || order.lock().unwrap().push(i), || {});
        pool.submit(&task).unwrap();
    }

    drain_until(&runtime, &notify, 8);
    assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
    pool.shutdown();
}

#[test]
fn rejects_submissions_past_the_queue_bound() {
    let (runtime, notify) = runtime_with_park();
    let pool = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("bounded").with_max_queue(2),
    )
    .unwrap();

    // Park the only worker on a gated task so queued tasks stay queued.
    let gate = Arc::new(ParkNotify::new());
    let blocker = {
        let gate = Arc::clone(&gate);
        Task::from_fn(move || gate.wait(), || {})
    };
    pool.submit(&blocker).unwrap();

    let claimed = Instant::now() + Duration::from_secs(5);
    while pool.waiting() > 0 {
        assert!(Instant::now() < claimed, "worker never claimed the task");
        thread::sleep(Duration::from_millis(1));
    }

    let queued: Vec<Task> = (0..2).map(|_| Task::from_fn(|| {}, || {})).collect();
    for task in &queued {
        pool.submit(task).unwrap();
    }
    assert_eq!(pool.waiting(), 2);

    let overflow = Task::from_fn(|| {}, || {});
    let err = pool.submit(&overflow).unwrap_err();
    assert_eq!(
        err,
        TaskPoolError::QueueFull {
            name: "bounded".to_owned(),
            waiting: 2,
        }
    );
    // The rejected task is free to be submitted elsewhere.
    assert!(!overflow.is_active());

    gate.notify();
    drain_until(&runtime, &notify, 3);
    pool.shutdown();
}

#[test]
fn rejects_resubmission_of_an_active_task() {
    let (runtime, notify) = runtime_with_park();
    let pool = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("dup"),
    )
    .unwrap();

    let gate = Arc::new(ParkNotify::new());
    let task = {
        let gate = Arc::clone(&gate);
        Task::from_fn(move || gate.wait(), || {})
    };

    pool.submit(&task).unwrap();
    assert!(task.is_active());

    let err = pool.submit(&task).unwrap_err();
    assert_eq!(err, TaskPoolError::AlreadyActive { id: task.id() });

    gate.notify();
    drain_until(&runtime, &notify, 1);

    // After its completion ran, the same task may go around again.
    assert!(!task.is_active());
    gate.notify();
    pool.submit(&task).unwrap();
    drain_until(&runtime, &notify, 1);
    pool.shutdown();
}

#[test]
fn shutdown_waits_for_the_backlog() {
    let (runtime, _notify) = runtime_with_park();
    let pool = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("slow"),
    )
    .unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let ran = Arc::clone(&ran);
        let task = Task::from_fn(
            move || {
                thread::sleep(Duration::from_millis(10));
                ran.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        pool.submit(&task).unwrap();
    }

    pool.shutdown();
    assert_eq!(ran.load(Ordering::SeqCst), 5);
    assert_eq!(runtime.pending_completions(), 5);
}

#[test]
fn two_pools_share_one_completion_queue() {
    let (runtime, notify) = runtime_with_park();
    let a = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("a"),
    )
    .unwrap();
    let b = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("b"),
    )
    .unwrap();

    let completed = Arc::new(AtomicUsize::new(0));
    for pool in [&a, &b] {
        let completed = Arc::clone(&completed);
        let task = Task::from_fn(
            || {},
            move || {
                completed.fetch_add(1, Ordering::SeqCst);
            },
        );
        pool.submit(&task).unwrap();
    }

    drain_until(&runtime, &notify, 2);
    assert_eq!(completed.load(Ordering::SeqCst), 2);
    a.shutdown();
    b.shutdown();
}

#[test]
fn task_ids_are_unique_across_pools_on_one_runtime() {
    let (runtime, notify) = runtime_with_park();
    let a = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("a"),
    )
    .unwrap();
    let b = ThreadPool::new(
        Arc::clone(&runtime),
        ThreadPoolConfig::new(1).with_name("b"),
    )
    .unwrap();

    let mut tasks = Vec::new();
    for pool in [&a, &b, &a, &b] {
        let task = Task::from_fn(|| {}, || {});
        pool.submit(&task).unwrap();
        tasks.push(task);
    }

    drain_until(&runtime, &notify, 4);

    let mut ids: Vec<u64> = tasks.iter().map(Task::id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    a.shutdown();
    b.shutdown();
}
