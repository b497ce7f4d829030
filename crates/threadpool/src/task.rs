//! Tasks: units of work with split execution and completion
//!
//! A task's handler runs on a worker thread; its completion handler runs
//! later on the thread that owns the pool's runtime, after that thread
//! drains the completion queue. The submitter keeps a [`Task`] handle (and
//! with it ownership of the payload); the framework only ever sees the
//! [`Work`] trait.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A unit of work for a thread pool
///
/// `run` executes on a worker thread and may block or take arbitrarily
/// long; `complete` executes on the runtime-owning thread once the result
/// has been handed back. State shared between the two lives in the
/// implementor.
pub trait Work: Send + Sync + 'static {
    /// Executes on a worker thread
    fn run(&self);

    /// Executes on the owning thread after `run` finished
    fn complete(&self);
}

pub(crate) struct TaskCore {
    /// Assigned from the runtime's sequence on each successful submit
    pub(crate) id: AtomicU64,
    /// Set while the task is queued or executing
    pub(crate) active: AtomicBool,
    pub(crate) work: Box<dyn Work>,
}

/// Submitter-side handle to a task
///
/// Cloning is cheap and shares the same underlying task; a task object
/// can be resubmitted once its previous run has completed, but never
/// while it is still active.
#[derive(Clone)]
pub struct Task {
    pub(crate) core: Arc<TaskCore>,
}

impl Task {
    /// Wraps a [`Work`] implementation in a task
    pub fn new(work: impl Work) -> Self {
        Self {
            core: Arc::new(TaskCore {
                id: AtomicU64::new(0),
                active: AtomicBool::new(false),
                work: Box::new(work),
            }),
        }
    }

    /// Builds a task from a pair of closures
    pub fn from_fn(
        run: impl Fn() + Send + Sync + 'static,
        complete: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        struct FnWork<R, C> {
            run: R,
            complete: C,
        }

        impl<R, C> Work for FnWork<R, C>
        where
            R: Fn() + Send + Sync + 'static,
            C: Fn() + Send + Sync + 'static,
        {
            fn run(&self) {
                (self.run)();
            }

            fn complete(&self) {
                (self.complete)();
            }
        }

        Self::new(FnWork { run, complete })
    }

    /// Id assigned at the most recent successful submission
    pub fn id(&self) -> u64 {
        self.core.id.load(Ordering::Relaxed)
    }

    /// Whether the task is currently queued or executing
    pub fn is_active(&self) -> bool {
        self.core.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn from_fn_wires_both_halves() {
        let ran = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let task = {
            let ran = Arc::clone(&ran);
            let completed = Arc::clone(&completed);
            Task::from_fn(
                move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    completed.fetch_add(1, Ordering::SeqCst);
                },
            )
        };

        task.core.work.run();
        task.core.work.complete();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fresh_tasks_are_inactive() {
        let task = Task::from_fn(|| {}, || {});
        assert!(!task.is_active());
        assert_eq!(task.id(), 0);
    }
}
