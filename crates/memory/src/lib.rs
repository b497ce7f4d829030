//! Pool (arena) allocation for the keel runtime
//!
//! The [`Pool`] allocator hands out memory from growable fixed-size blocks
//! and frees everything together: bump allocation with block-chain growth
//! gives O(1) amortized allocation without per-object free-list
//! bookkeeping. Large objects are segregated behind a single size
//! comparison and remain individually freeable, and cleanup callbacks give
//! pool users RAII-like teardown without the allocator knowing their types.
//!
//! A typical host creates one pool per request or connection, allocates
//! freely while handling it, and either drops the pool or [`Pool::reset`]s
//! it for the next request.
//!
//! ```
//! use keel_memory::Pool;
//!
//! let mut pool = Pool::new(4096)?;
//! let greeting = pool.alloc_slice(b"hello")?;
//! assert_eq!(greeting, b"hello");
//!
//! pool.register_cleanup(|| println!("request finished"));
//! pool.reset(); // runs the cleanup, keeps the blocks
//! # Ok::<(), keel_memory::MemoryError>(())
//! ```

#![warn(missing_docs)]

pub mod error;
mod pool;
pub mod utils;

pub use error::{MemoryError, Result};
pub use pool::{DEFAULT_POOL_SIZE, MIN_POOL_SIZE, POOL_ALIGNMENT, Pool};
