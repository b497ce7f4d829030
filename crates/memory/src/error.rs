//! Error types for pool allocation

use thiserror::Error;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Memory operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The underlying system allocation failed
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory {
        /// Size of the allocation that failed
        requested: usize,
    },

    /// A size or alignment the allocator cannot represent
    #[error("invalid layout for {size} bytes aligned to {align}")]
    InvalidLayout {
        /// Requested size
        size: usize,
        /// Requested alignment
        align: usize,
    },
}

impl MemoryError {
    /// Create an out of memory error
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Create an invalid layout error
    pub fn invalid_layout(size: usize, align: usize) -> Self {
        Self::InvalidLayout { size, align }
    }
}
