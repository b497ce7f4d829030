//! # keel-threadpool
//!
//! Bounded worker pools for offloading blocking work from an event loop.
//!
//! A [`ThreadPool`] owns a fixed set of worker threads and a FIFO queue
//! with a backpressure limit. [`Task`]s carry two handlers: `run` executes
//! on a worker, `complete` executes later on the thread that owns the
//! shared [`TaskRuntime`], after a [`Notify`] wake-up tells it to
//! [`TaskRuntime::drain`]. Several pools can share one runtime, so the
//! owner drains one queue no matter how many pools feed it.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use keel_threadpool::{Notify, ParkNotify, Task, TaskRuntime, ThreadPool, ThreadPoolConfig};
//!
//! let notify = Arc::new(ParkNotify::new());
//! let runtime = Arc::new(TaskRuntime::new(notify.clone() as Arc<dyn Notify>));
//! let pool = ThreadPool::new(
//!     Arc::clone(&runtime),
//!     ThreadPoolConfig::new(4).with_name("blocking"),
//! )?;
//!
//! let task = Task::from_fn(
//!     || { /* heavy work, on a worker thread */ },
//!     || { /* back on the owning thread */ },
//! );
//! pool.submit(&task)?;
//!
//! notify.wait();
//! runtime.drain();
//! # Ok::<(), keel_threadpool::TaskPoolError>(())
//! ```
//!
//! ## Invariants
//!
//! - Tasks run in submission order within a pool; completions run in
//!   finish order within a runtime.
//! - A task is active from a successful `submit` until just before its
//!   completion handler runs; duplicate submission of an active task is
//!   rejected without side effects.
//! - Shutdown always terminates: exit markers bypass the backpressure
//!   limit and every worker is joined.

mod error;
mod notify;
mod pool;
mod runtime;
mod task;

pub use error::{Result, TaskPoolError};
#[cfg(target_os = "linux")]
pub use notify::EventFdNotify;
pub use notify::{Notify, ParkNotify};
pub use pool::{DEFAULT_MAX_QUEUE, DEFAULT_THREADS, ThreadPool, ThreadPoolConfig};
pub use runtime::TaskRuntime;
pub use task::{Task, Work};
