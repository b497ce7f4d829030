//! Shared runtime context for thread pools
//!
//! The completion queue and the task-id sequence are shared by every pool
//! attached to a runtime, but the runtime itself is an explicit object:
//! hosts construct one per event loop (tests construct as many as they
//! like) instead of the pools coupling through process globals.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::notify::Notify;
use crate::task::TaskCore;

/// Completion queue, id sequence and wake-up capability shared by pools
///
/// Workers from any attached pool push finished tasks here; the owning
/// thread calls [`TaskRuntime::drain`] when the notifier fires. The queue
/// is guarded by a spinlock: it only ever protects O(1) pushes and a
/// single list splice, never task execution.
pub struct TaskRuntime {
    done: spin::Mutex<VecDeque<Arc<TaskCore>>>,
    next_id: AtomicU64,
    notify: Arc<dyn Notify>,
}

impl TaskRuntime {
    /// Creates a runtime that signals completions through `notify`
    pub fn new(notify: Arc<dyn Notify>) -> Self {
        Self {
            done: spin::Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(0),
            notify,
        }
    }

    pub(crate) fn next_task_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Called by workers: hand a finished task back and wake the owner.
    pub(crate) fn push_done(&self, core: Arc<TaskCore>) {
        self.done.lock().push_back(core);
        self.notify.notify();
    }

    /// Number of completions waiting to be drained
    pub fn pending_completions(&self) -> usize {
        self.done.lock().len()
    }

    /// Runs pending completion handlers on the calling thread
    ///
    /// Detaches the whole pending list in one step under the spinlock,
    /// then invokes each task's completion handler outside it, in the
    /// order workers finished. Each task's active flag is cleared before
    /// its handler runs, so a handler may resubmit its own task. Returns
    /// the number of completions handled.
    pub fn drain(&self) -> usize {
        let drained = std::mem::take(&mut *self.done.lock());
        let count = drained.len();

        for core in drained {
            core.active.store(false, Ordering::Release);
            tracing::debug!(id = core.id.load(Ordering::Relaxed), "task completed");
            core.work.complete();
        }

        count
    }
}
