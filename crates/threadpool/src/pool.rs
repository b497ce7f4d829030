//! The thread pool: bounded FIFO queue and worker lifecycle
//!
//! Workers pull tasks in strict submission order and execute them outside
//! the queue lock, so a handler may block for as long as it likes without
//! stalling submission. The `waiting` counter mirrors the number of tasks
//! enqueued but not yet claimed; once it reaches the configured maximum,
//! further submissions are rejected — backpressure, not failure.
//!
//! Shutdown posts one exit marker per worker into the same FIFO and joins
//! each worker, so a backlog of slow tasks delays shutdown but can never
//! deadlock it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TaskPoolError};
use crate::runtime::TaskRuntime;
use crate::task::{Task, TaskCore};

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 32;

/// Default bound on tasks enqueued but not yet claimed
pub const DEFAULT_MAX_QUEUE: usize = 65536;

/// Thread pool settings, validated before any thread is spawned
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Symbolic name, used in worker thread names and log lines
    pub name: String,
    /// Number of worker threads, spawned eagerly at construction
    pub threads: usize,
    /// Backpressure limit on the pending queue
    pub max_queue: usize,
}

impl ThreadPoolConfig {
    /// Settings with the given worker count and default name and queue bound
    pub fn new(threads: usize) -> Self {
        Self {
            name: "default".to_owned(),
            threads,
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }

    /// Sets the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the backpressure limit
    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(TaskPoolError::InitFailed {
                name: self.name.clone(),
                reason: "worker count must be positive".to_owned(),
            });
        }
        if self.max_queue == 0 {
            return Err(TaskPoolError::InitFailed {
                name: self.name.clone(),
                reason: "max queue depth must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_THREADS)
    }
}

enum QueueItem {
    Run(Arc<TaskCore>),
    /// Tells exactly one worker to exit; travels the same FIFO as tasks
    Exit,
}

struct QueueState {
    queue: VecDeque<QueueItem>,
    /// Tasks enqueued but not yet claimed by a worker (exit markers are
    /// not counted and not subject to the backpressure limit)
    waiting: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    cond: Condvar,
    name: String,
    max_queue: usize,
    runtime: Arc<TaskRuntime>,
}

/// A bounded pool of worker threads
///
/// Tasks are executed in FIFO submission order; completions are delivered
/// through the pool's [`TaskRuntime`]. Dropping the pool shuts it down,
/// waiting for every worker to exit.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use keel_threadpool::{Notify, ParkNotify, Task, TaskRuntime, ThreadPool, ThreadPoolConfig};
///
/// let notify = Arc::new(ParkNotify::new());
/// let runtime = Arc::new(TaskRuntime::new(notify.clone() as Arc<dyn Notify>));
/// let pool = ThreadPool::new(Arc::clone(&runtime), ThreadPoolConfig::new(2))?;
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let task = {
///     let hits = Arc::clone(&hits);
///     Task::from_fn(move || { hits.fetch_add(1, Ordering::SeqCst); }, || {})
/// };
/// pool.submit(&task)?;
///
/// notify.wait();
/// runtime.drain();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// # Ok::<(), keel_threadpool::TaskPoolError>(())
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Validates `config` and spawns all workers eagerly
    ///
    /// If spawning fails partway, the workers that did start are shut
    /// down and joined before the error is returned; a failed `new` never
    /// leaks threads.
    pub fn new(runtime: Arc<TaskRuntime>, config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                waiting: 0,
            }),
            cond: Condvar::new(),
            name: config.name.clone(),
            max_queue: config.max_queue,
            runtime,
        });

        let mut workers = Vec::with_capacity(config.threads);
        for n in 0..config.threads {
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{n}", config.name))
                .spawn({
                    let shared = Arc::clone(&shared);
                    move || worker_cycle(&shared)
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!(pool = %config.name, error = %e, "worker spawn failed");
                    post_exit_markers(&shared, workers.len());
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(TaskPoolError::InitFailed {
                        name: config.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(pool = %config.name, threads = config.threads, "thread pool started");
        Ok(Self { shared, workers })
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Tasks enqueued but not yet claimed by a worker
    pub fn waiting(&self) -> usize {
        self.shared.state.lock().waiting
    }

    /// Queues a task for execution
    ///
    /// Fails with [`TaskPoolError::AlreadyActive`] if the task is still
    /// queued or executing from a previous submission, and with
    /// [`TaskPoolError::QueueFull`] once the pending queue holds
    /// `max_queue` tasks. Both leave the pool fully usable.
    pub fn submit(&self, task: &Task) -> Result<()> {
        let core = &task.core;

        if core.active.swap(true, Ordering::AcqRel) {
            let id = core.id.load(Ordering::Relaxed);
            tracing::error!(pool = %self.shared.name, id, "task already active");
            return Err(TaskPoolError::AlreadyActive { id });
        }

        {
            let mut state = self.shared.state.lock();

            if state.waiting >= self.shared.max_queue {
                let waiting = state.waiting;
                drop(state);
                core.active.store(false, Ordering::Release);
                tracing::error!(
                    pool = %self.shared.name,
                    waiting,
                    "queue overflow, task rejected"
                );
                return Err(TaskPoolError::QueueFull {
                    name: self.shared.name.clone(),
                    waiting,
                });
            }

            core.id
                .store(self.shared.runtime.next_task_id(), Ordering::Relaxed);
            state.queue.push_back(QueueItem::Run(Arc::clone(core)));
            state.waiting += 1;
            self.shared.cond.notify_one();
        }

        tracing::debug!(
            pool = %self.shared.name,
            id = core.id.load(Ordering::Relaxed),
            "task queued"
        );
        Ok(())
    }

    /// Shuts the pool down, blocking until every worker has exited
    ///
    /// Exit markers are appended behind any pending tasks, so the backlog
    /// drains first. Dropping the pool does the same thing.
    pub fn shutdown(mut self) {
        self.shutdown_workers();
    }

    fn shutdown_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        post_exit_markers(&self.shared, self.workers.len());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!(pool = %self.shared.name, "thread pool stopped");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.shared.name)
            .field("threads", &self.workers.len())
            .field("max_queue", &self.shared.max_queue)
            .finish_non_exhaustive()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}

fn post_exit_markers(shared: &Shared, count: usize) {
    let mut state = shared.state.lock();
    for _ in 0..count {
        state.queue.push_back(QueueItem::Exit);
    }
    shared.cond.notify_all();
}

fn worker_cycle(shared: &Shared) {
    tracing::debug!(pool = %shared.name, "worker started");

    loop {
        let item = {
            let mut state = shared.state.lock();
            loop {
                if let Some(item) = state.queue.pop_front() {
                    if matches!(item, QueueItem::Run(_)) {
                        state.waiting -= 1;
                    }
                    break item;
                }
                shared.cond.wait(&mut state);
            }
        };

        match item {
            QueueItem::Run(core) => {
                tracing::debug!(
                    pool = %shared.name,
                    id = core.id.load(Ordering::Relaxed),
                    "run task"
                );
                // The handler may block or run arbitrarily long; the queue
                // lock is already released.
                core.work.run();
                shared.runtime.push_done(core);
            }
            QueueItem::Exit => {
                tracing::debug!(pool = %shared.name, "worker exiting");
                break;
            }
        }
    }
}
