//! Pool allocator: chained bump blocks with deferred cleanup
//!
//! A [`Pool`] owns a chain of fixed-size memory blocks and satisfies small
//! allocations by bumping a cursor in the current block. Allocations larger
//! than the small-allocation threshold (one page) bypass the chain and are
//! tracked on a separate list so they can be released individually before
//! the pool goes away. Cleanup handlers registered on the pool run exactly
//! once, in reverse registration order, at reset or drop.
//!
//! ## Invariants
//!
//! - A block's cursor always lies within `[0, capacity]`
//! - Small allocations never overlap; the cursor moves forward monotonically
//! - Large allocations never mix with the bump chain
//! - Blocks never move once allocated; pointers handed out stay valid for
//!   the pool's lifetime (or until `reset`, which requires `&mut self`)
//!
//! ## Not thread-safe
//!
//! Interior mutability is Cell/RefCell; the pool is `!Send`/`!Sync` by
//! construction. Serialize access externally or use one pool per
//! thread/request.

use std::alloc::{Layout, alloc, dealloc};
use std::cell::{Cell, RefCell};
use std::mem;
use std::ptr::{self, NonNull};

use crate::error::{MemoryError, Result};
use crate::utils::{align_up, page_size};

/// Default pool size used by [`Pool::default`] (16 KiB)
pub const DEFAULT_POOL_SIZE: usize = 16 * 1024;

/// Alignment of pool blocks and large allocations
pub const POOL_ALIGNMENT: usize = 16;

/// Smallest block capacity a pool will be created with
pub const MIN_POOL_SIZE: usize = 64;

/// Word alignment applied to untyped small allocations
const WORD_ALIGNMENT: usize = mem::align_of::<usize>();

/// One fixed-size block in the pool chain
struct Block {
    ptr: NonNull<u8>,
    capacity: usize,
    /// Bump cursor, as an offset from the block start
    last: Cell<usize>,
}

impl Block {
    fn new(capacity: usize) -> Result<Self> {
        let layout = Layout::from_size_align(capacity, POOL_ALIGNMENT)
            .map_err(|_| MemoryError::invalid_layout(capacity, POOL_ALIGNMENT))?;

        // SAFETY: layout has non-zero size (capacity >= MIN_POOL_SIZE) and a
        // power-of-two alignment; null return is handled below.
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| MemoryError::out_of_memory(capacity))?;

        Ok(Self {
            ptr,
            capacity,
            last: Cell::new(0),
        })
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated in new() with exactly this layout, and
        // Drop runs once.
        unsafe {
            dealloc(
                self.ptr.as_ptr(),
                Layout::from_size_align_unchecked(self.capacity, POOL_ALIGNMENT),
            );
        }
    }
}

/// A tracked allocation too large for the bump chain
struct Large {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// Arena-style pool allocator
///
/// Created with an initial block size; grows by appending same-size blocks
/// on exhaustion. Destroyed as a unit: pending cleanup handlers run first,
/// then large allocations and every chain block are freed together.
///
/// # Examples
///
/// ```
/// use keel_memory::Pool;
///
/// let pool = Pool::new(4096).unwrap();
/// let n = pool.alloc(42u64).unwrap();
/// assert_eq!(*n, 42);
/// ```
pub struct Pool {
    blocks: RefCell<Vec<Block>>,
    /// Index of the block the next small allocation is tried from
    current: Cell<usize>,
    large: RefCell<Vec<Large>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    /// Capacity of every chain block
    block_size: usize,
    /// Largest size served from the bump chain
    threshold: usize,
}

impl Pool {
    /// Creates a pool with an initial block of roughly `size` bytes
    ///
    /// The size is clamped to [`MIN_POOL_SIZE`] and rounded up to
    /// [`POOL_ALIGNMENT`]. Fails only if the system allocation fails.
    pub fn new(size: usize) -> Result<Self> {
        let block_size = align_up(size.max(MIN_POOL_SIZE), POOL_ALIGNMENT);
        let first = Block::new(block_size)?;

        Ok(Self {
            blocks: RefCell::new(vec![first]),
            current: Cell::new(0),
            large: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            block_size,
            threshold: block_size.min(page_size() - 1),
        })
    }

    /// Largest allocation served from the bump chain; anything bigger is
    /// tracked as a large allocation
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Capacity of each chain block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently in the chain
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Number of tracked large allocations
    pub fn large_count(&self) -> usize {
        self.large.borrow().len()
    }

    /// Allocates `size` bytes, word-aligned
    ///
    /// Small requests bump-allocate from the current block, transparently
    /// appending a new same-size block on exhaustion. Requests above the
    /// threshold get a standalone tracked allocation, individually freeable
    /// via [`Pool::free_large`].
    pub fn alloc_bytes(&self, size: usize) -> Result<NonNull<u8>> {
        self.alloc_raw(size, WORD_ALIGNMENT)
    }

    /// As [`Pool::alloc_bytes`], zero-filled
    pub fn alloc_bytes_zeroed(&self, size: usize) -> Result<NonNull<u8>> {
        let p = self.alloc_raw(size, WORD_ALIGNMENT)?;
        // SAFETY: p points to `size` writable bytes just handed out by the
        // allocator and not yet visible to the caller.
        unsafe {
            ptr::write_bytes(p.as_ptr(), 0, size);
        }
        Ok(p)
    }

    /// Allocates and initializes a value in the pool
    ///
    /// The reference lives as long as the pool (the borrow checker retires
    /// it across `reset`). The pool never drops `T`; attach a cleanup
    /// handler if the value owns resources.
    pub fn alloc<T>(&self, value: T) -> Result<&mut T> {
        let p = self
            .alloc_raw(mem::size_of::<T>(), mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: p is properly aligned for T and points to size_of::<T>()
        // fresh bytes; write moves the value in, after which the memory
        // holds a valid T for the pool's lifetime.
        unsafe {
            p.as_ptr().write(value);
            Ok(&mut *p.as_ptr())
        }
    }

    /// Allocates and copies a slice into the pool
    pub fn alloc_slice<T: Copy>(&self, slice: &[T]) -> Result<&mut [T]> {
        if slice.is_empty() {
            return Ok(&mut []);
        }

        let p = self
            .alloc_raw(mem::size_of_val(slice), mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: p has room for slice.len() elements of T at T's alignment;
        // source and destination cannot overlap (fresh allocation); T: Copy
        // keeps the source valid afterwards.
        unsafe {
            ptr::copy_nonoverlapping(slice.as_ptr(), p.as_ptr(), slice.len());
            Ok(&mut *ptr::slice_from_raw_parts_mut(p.as_ptr(), slice.len()))
        }
    }

    fn alloc_raw(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        if size > self.threshold || align > POOL_ALIGNMENT {
            return self.alloc_large(size, align);
        }

        {
            let blocks = self.blocks.borrow();
            // Walk forward from the current block. After a reset the later
            // blocks sit rewound behind `current`, so they are refilled
            // before the chain grows.
            for i in self.current.get()..blocks.len() {
                let block = &blocks[i];
                let offset = align_up(block.last.get(), align);
                if offset + size <= block.capacity {
                    block.last.set(offset + size);
                    self.current.set(i);
                    // SAFETY: offset + size <= capacity, so the result is
                    // within the block's allocation (at worst one-past-end
                    // when size=0).
                    return Ok(unsafe { NonNull::new_unchecked(block.ptr.as_ptr().add(offset)) });
                }
            }
        }

        // Every block from `current` on is exhausted: append a new
        // same-size block and serve from it. Existing blocks are left
        // untouched so earlier pointers stay valid.
        let mut blocks = self.blocks.borrow_mut();
        let block = Block::new(self.block_size)?;
        block.last.set(size);
        let p = block.ptr;

        tracing::trace!(capacity = self.block_size, blocks = blocks.len() + 1, "pool grew");

        self.current.set(blocks.len());
        blocks.push(block);

        // Block data is POOL_ALIGNMENT-aligned, which covers `align` here.
        Ok(p)
    }

    fn alloc_large(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let layout = Layout::from_size_align(size.max(1), align.max(POOL_ALIGNMENT))
            .map_err(|_| MemoryError::invalid_layout(size, align))?;

        // SAFETY: layout has non-zero size and power-of-two alignment; null
        // return is handled below.
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| MemoryError::out_of_memory(size))?;

        tracing::trace!(size, "pool large allocation");

        self.large.borrow_mut().push(Large { ptr, layout });
        Ok(ptr)
    }

    /// Frees a tracked large allocation
    ///
    /// Returns `true` if `ptr` was found on the large list and released.
    /// A pointer that is not tracked (including one already freed) is left
    /// alone and yields `false`; the bump chain is never affected.
    pub fn free_large(&self, ptr: NonNull<u8>) -> bool {
        let mut large = self.large.borrow_mut();
        if let Some(i) = large.iter().position(|l| l.ptr == ptr) {
            let l = large.swap_remove(i);
            // SAFETY: l.ptr was allocated in alloc_large with l.layout and
            // is removed from the list before freeing, so it cannot be
            // freed twice through this path.
            unsafe { dealloc(l.ptr.as_ptr(), l.layout) };
            true
        } else {
            false
        }
    }

    /// Registers a cleanup handler
    ///
    /// Handlers run exactly once, in reverse registration order, at
    /// [`Pool::reset`], [`Pool::run_cleanups`] or drop.
    pub fn register_cleanup(&self, handler: impl FnOnce() + 'static) {
        self.cleanups.borrow_mut().push(Box::new(handler));
    }

    /// Runs all pending cleanup handlers now, in reverse registration order
    pub fn run_cleanups(&mut self) {
        let mut cleanups = self.cleanups.take();
        while let Some(cleanup) = cleanups.pop() {
            cleanup();
        }
    }

    /// Rewinds the pool for reuse
    ///
    /// Runs pending cleanups, frees all large allocations, then resets
    /// every chain block's cursor to its start. Block memory is retained,
    /// so a pool can be reused across many short-lived operations without
    /// reallocating the chain.
    pub fn reset(&mut self) {
        self.run_cleanups();
        self.free_all_large();

        let blocks = self.blocks.borrow();
        for block in blocks.iter() {
            block.last.set(0);
        }
        self.current.set(0);
    }

    fn free_all_large(&self) {
        for l in self.large.borrow_mut().drain(..) {
            // SAFETY: each entry was allocated in alloc_large with its
            // recorded layout; drain removes it so it is freed once.
            unsafe { dealloc(l.ptr.as_ptr(), l.layout) };
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        // DEFAULT_POOL_SIZE is well-formed, so this cannot fail short of
        // the system refusing 16 KiB.
        Self::new(DEFAULT_POOL_SIZE).expect("default pool allocation failed")
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.run_cleanups();
        self.free_all_large();
        // Chain blocks free themselves.
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::utils::is_aligned;

    #[test]
    fn typed_allocation() {
        let pool = Pool::new(4096).unwrap();
        let v = pool.alloc(7u64).unwrap();
        assert_eq!(*v, 7);
        *v = 9;
        assert_eq!(*v, 9);
    }

    #[test]
    fn small_allocations_do_not_overlap() {
        let pool = Pool::new(256).unwrap();
        let size = 24;
        let mut regions: Vec<(usize, usize)> = Vec::new();

        for _ in 0..64 {
            let p = pool.alloc_bytes(size).unwrap().as_ptr() as usize;
            for &(start, len) in &regions {
                assert!(p + size <= start || p >= start + len, "overlapping regions");
            }
            regions.push((p, size));
        }

        // 64 * 24 bytes cannot fit in one 256-byte block.
        assert!(pool.block_count() > 1);
    }

    #[test]
    fn word_alignment() {
        let pool = Pool::new(256).unwrap();
        pool.alloc_bytes(3).unwrap();
        let p = pool.alloc_bytes(8).unwrap().as_ptr() as usize;
        assert!(is_aligned(p, mem::align_of::<usize>()));
    }

    #[test]
    fn zeroed_allocation() {
        let pool = Pool::new(256).unwrap();
        pool.alloc_bytes(5).unwrap();
        let p = pool.alloc_bytes_zeroed(64).unwrap();
        // SAFETY: p points to 64 bytes we own.
        let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn large_allocations_are_tracked_and_freeable() {
        let pool = Pool::new(256).unwrap();
        let big = pool.threshold() + 1;

        let p = pool.alloc_bytes(big).unwrap();
        assert_eq!(pool.large_count(), 1);
        assert_eq!(pool.block_count(), 1, "large allocation must not grow the chain");

        assert!(pool.free_large(p));
        assert_eq!(pool.large_count(), 0);

        // Idempotent on an already-freed / untracked pointer.
        assert!(!pool.free_large(p));
        let small = pool.alloc_bytes(8).unwrap();
        assert!(!pool.free_large(small));
    }

    #[test]
    fn reset_rewinds_to_first_block() {
        let mut pool = Pool::new(256).unwrap();

        let first = pool.alloc_bytes(32).unwrap().as_ptr() as usize;
        for _ in 0..20 {
            pool.alloc_bytes(32).unwrap();
        }
        let grown = pool.block_count();
        assert!(grown > 1);

        pool.reset();

        // Blocks are kept, cursor is back at the start of the first block.
        assert_eq!(pool.block_count(), grown);
        let again = pool.alloc_bytes(32).unwrap().as_ptr() as usize;
        assert_eq!(again, first);
    }

    #[test]
    fn reset_cycles_reuse_chain_blocks() {
        let mut pool = Pool::new(256).unwrap();

        for _ in 0..20 {
            pool.alloc_bytes(32).unwrap();
        }
        let grown = pool.block_count();
        assert!(grown > 1);

        // The same workload after a reset must refill the retained blocks
        // instead of appending fresh ones.
        for _ in 0..10 {
            pool.reset();
            for _ in 0..20 {
                pool.alloc_bytes(32).unwrap();
            }
            assert_eq!(pool.block_count(), grown);
        }
    }

    #[test]
    fn reset_frees_large_allocations() {
        let mut pool = Pool::new(256).unwrap();
        pool.alloc_bytes(pool.threshold() + 1).unwrap();
        pool.alloc_bytes(pool.threshold() + 1).unwrap();
        assert_eq!(pool.large_count(), 2);

        pool.reset();
        assert_eq!(pool.large_count(), 0);
    }

    #[test]
    fn cleanups_run_once_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut pool = Pool::new(256).unwrap();

        for i in 1..=3 {
            let order = Rc::clone(&order);
            pool.register_cleanup(move || order.borrow_mut().push(i));
        }

        pool.reset();
        assert_eq!(*order.borrow(), vec![3, 2, 1]);

        // Already-run handlers must not fire again at drop.
        drop(pool);
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn cleanups_run_at_drop() {
        let ran = Rc::new(RefCell::new(0));
        {
            let pool = Pool::new(256).unwrap();
            let ran = Rc::clone(&ran);
            pool.register_cleanup(move || *ran.borrow_mut() += 1);
        }
        assert_eq!(*ran.borrow(), 1);
    }

    #[test]
    fn slice_allocation() {
        let pool = Pool::new(256).unwrap();
        let s = pool.alloc_slice(&[1u32, 2, 3]).unwrap();
        assert_eq!(s, &[1, 2, 3]);
        let empty: &mut [u32] = pool.alloc_slice(&[]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn over_aligned_values_go_to_the_large_list() {
        #[repr(align(64))]
        struct Aligned(#[allow(dead_code)] u8);

        let pool = Pool::new(256).unwrap();
        let v = pool.alloc(Aligned(1)).unwrap();
        assert!(is_aligned(std::ptr::from_ref(v) as usize, 64));
        assert_eq!(pool.large_count(), 1);
    }
}
