//! # Fixed Pool
//!
//! Fixed-size block allocator over one pre-reserved buffer.
//!
//! ## Free List Encoding
//!
//! Free blocks form a singly-linked list threaded through the blocks
//! themselves: the first `usize` of a free block holds the index of the next
//! free block, or `block_count` at the end of the list. Those bytes belong to
//! the caller while the block is allocated and are only rewritten when it
//! comes back.
//!
//! ```text
//!  head = 3
//!   │
//!   ▼
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │ used│ used│  4  │  2  │  5  │   5 == block_count: end of list
//! └─────┴─────┴─────┴─────┴─────┘
//!    0     1     2     3     4
//! ```
//!
//! ## Lazy Materialization
//!
//! Conceptually every untouched block already links to its successor. The link
//! word is only written when the `initialized` watermark reaches the block,
//! one block per allocation, so construction does no per-block work.
//!
//! ## Safety Note
//!
//! This module reinterprets block bytes as link words and hands out views into
//! a raw buffer, so it opts into unsafe code. Link words are only accessed
//! while holding the pool lock, and only for blocks in the free state.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use super::block::{Block, ScopedBlock};
use super::layout::BlockLayout;
use super::ownership::OwnershipMap;
use super::stats::PoolStats;
use crate::config::PoolConfig;
use crate::error::{DeallocError, PoolError, PoolResult};
use crate::sync::{LockKind, PoolLock};

/// Mutable pool state. Only ever touched through the pool lock.
#[derive(Debug)]
struct FreeList {
    /// Blocks available for allocation.
    free: usize,
    /// Watermark of blocks whose link word has been written.
    initialized: usize,
    /// First free block, `None` when `free == 0`.
    head: Option<usize>,
    /// Allocated/free bitmap, only with ownership tracking.
    ownership: Option<OwnershipMap>,
    peak_allocated: usize,
    total_allocations: u64,
    total_deallocations: u64,
    failed_allocations: u64,
}

impl FreeList {
    /// Marks block `index` allocated in the ownership map, if any.
    #[inline]
    fn track(&mut self, index: usize) {
        if let Some(ownership) = self.ownership.as_mut() {
            ownership.mark_allocated(index);
        }
    }

    /// Marks block `index` free in the ownership map, if any.
    fn untrack(&mut self, index: usize) -> PoolResult<()> {
        match self.ownership.as_mut() {
            Some(ownership) if !ownership.is_allocated(index) => {
                Err(PoolError::DoubleFree { index })
            }
            Some(ownership) => {
                ownership.mark_free(index);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// A pool of `block_count` equally sized blocks.
///
/// All memory is reserved at construction. Allocation and deallocation are
/// O(1), never touch the system allocator, and are safe to call from many
/// threads at once: a single lock serializes every free-list mutation.
///
/// Blocks are handed out in ascending index order until they have all been
/// used once, then most-recently-freed first.
///
/// # Example
///
/// ```rust,ignore
/// let pool = FixedPool::new(5, 8)?;
///
/// let mut block = pool.allocate()?;   // O(1), no heap allocation
/// block.copy_from_slice(&42u64.to_le_bytes());
///
/// pool.deallocate(block)?;            // O(1), back on the free list
/// ```
///
/// # Safety
///
/// Blocks released through [`FixedPool::deallocate`] cannot be released twice:
/// the [`Block`] is consumed. [`FixedPool::deallocate_ptr`] has no such
/// protection. Releasing the same block twice, or releasing a pointer into this
/// pool that was never allocated, corrupts the free list and can hand one block
/// to two callers. Neither is detected unless ownership tracking is enabled.
#[derive(Debug)]
pub struct FixedPool {
    layout: BlockLayout,
    /// Start of the buffer. Dangling when the buffer is empty.
    buffer: NonNull<u8>,
    buffer_layout: Layout,
    track_ownership: bool,
    state: PoolLock<FreeList>,
}

impl FixedPool {
    /// Creates a pool of `block_count` blocks, each with `block_size` usable
    /// bytes, guarded by a spin lock.
    ///
    /// Blocks smaller than a `usize` still occupy a full `usize` of the buffer
    /// so they can store a link while free.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CapacityOverflow`] if the buffer size overflows.
    pub fn new(block_count: usize, block_size: usize) -> PoolResult<Self> {
        Self::from_config(&PoolConfig::new(block_count, block_size))
    }

    /// Creates a pool from a [`PoolConfig`].
    ///
    /// The buffer is allocated zeroed in one call; nothing else is done per
    /// block unless ownership tracking is requested.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CapacityOverflow`] if the buffer size overflows.
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        let layout = BlockLayout::new(config.block_count, config.block_size)?;
        let buffer_layout = layout.buffer_layout()?;

        let buffer = if buffer_layout.size() == 0 {
            NonNull::<usize>::dangling().cast::<u8>()
        } else {
            // SAFETY: the layout has a non-zero size.
            let ptr = unsafe { alloc::alloc_zeroed(buffer_layout) };
            NonNull::new(ptr).unwrap_or_else(|| alloc::handle_alloc_error(buffer_layout))
        };

        let block_count = layout.block_count();
        let state = FreeList {
            free: block_count,
            initialized: 0,
            head: (block_count > 0).then_some(0),
            ownership: config.track_ownership.then(|| OwnershipMap::new(block_count)),
            peak_allocated: 0,
            total_allocations: 0,
            total_deallocations: 0,
            failed_allocations: 0,
        };

        debug!(
            block_count,
            block_size = layout.block_size(),
            stride = layout.stride(),
            lock = %config.lock,
            track_ownership = config.track_ownership,
            "created block pool"
        );

        Ok(Self {
            layout,
            buffer,
            buffer_layout,
            track_ownership: config.track_ownership,
            state: PoolLock::new(config.lock, state),
        })
    }

    /// Total number of blocks.
    #[inline]
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.layout.block_count()
    }

    /// Usable bytes per block (the length of every returned view).
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.layout.block_size()
    }

    /// Byte distance between consecutive blocks.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// The lock implementation in use.
    #[must_use]
    pub const fn lock_kind(&self) -> LockKind {
        self.state.kind()
    }

    /// Number of blocks available right now.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.state.lock().free
    }

    /// Number of blocks currently handed out.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.block_count() - self.free_count()
    }

    /// Whether the next [`allocate`](Self::allocate) would fail.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.free_count() == 0
    }

    /// Whether `ptr` points into this pool's buffer.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.layout.contains(self.base(), ptr as usize)
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            block_count: self.block_count(),
            block_size: self.block_size(),
            stride: self.stride(),
            free: state.free,
            allocated: self.block_count() - state.free,
            initialized: state.initialized,
            peak_allocated: state.peak_allocated,
            total_allocations: state.total_allocations,
            total_deallocations: state.total_deallocations,
            failed_allocations: state.failed_allocations,
        }
    }

    /// Takes one block from the free list.
    ///
    /// The returned view is exactly [`block_size`](Self::block_size) bytes
    /// long. Its contents are whatever was last written there.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfMemory`] when every block is allocated. The
    /// pool is unchanged and the call can be retried after a deallocation.
    pub fn allocate(&self) -> PoolResult<Block<'_>> {
        let block_count = self.block_count();
        let mut state = self.state.lock();

        if state.initialized < block_count {
            let index = state.initialized;
            // SAFETY: blocks at or above the watermark have never been handed
            // out, so the pool owns them; the lock is held.
            unsafe { self.write_link(index, index + 1) };
            state.initialized += 1;
        }

        let head = state.head;
        let index = match head {
            Some(index) if state.free > 0 => index,
            _ => {
                state.failed_allocations += 1;
                drop(state);
                trace!(block_count, "block pool exhausted");
                return Err(PoolError::OutOfMemory { block_count });
            }
        };

        state.free -= 1;
        let next = if state.free > 0 {
            // SAFETY: `index` is the free-list head, so its link word was
            // written either by the watermark or by a deallocation, and the
            // block is still owned by the pool. The lock is held.
            let next = unsafe { self.read_link(index) };
            debug_assert!(next < block_count, "free list link {next} out of range");
            Some(next)
        } else {
            None
        };
        state.head = next;
        state.track(index);
        state.total_allocations += 1;
        let allocated = block_count - state.free;
        state.peak_allocated = state.peak_allocated.max(allocated);
        drop(state);

        let ptr = self.block_ptr(index);
        // SAFETY: the block was just unlinked from the free list under the
        // lock, so this is the only view of it, and it borrows `self`.
        Ok(unsafe { Block::from_raw(ptr, self.block_size()) })
    }

    /// Takes one block that is released automatically when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfMemory`] when every block is allocated.
    pub fn allocate_scoped(&self) -> PoolResult<ScopedBlock<'_>> {
        let block = self.allocate()?;
        Ok(ScopedBlock::new(block, self))
    }

    /// Returns a block to the pool. It becomes the next block handed out.
    ///
    /// # Errors
    ///
    /// Returns a [`DeallocError`] carrying the untouched block when it is
    /// rejected:
    /// - [`PoolError::OutOfBound`] if the block belongs to another pool. Hand
    ///   it back to that pool instead.
    /// - [`PoolError::Misaligned`] / [`PoolError::DoubleFree`] with ownership
    ///   tracking enabled, for views rebuilt with [`Block::from_raw`].
    pub fn deallocate<'b>(&self, block: Block<'b>) -> Result<(), DeallocError<'b>> {
        let len = block.len();
        let ptr = block.into_raw();
        // SAFETY: `block` is consumed here. Views from the safe API are unique
        // and still allocated; views from `Block::from_raw` carry the same
        // guarantee by that function's contract.
        unsafe { self.release(ptr) }.map_err(|error| DeallocError {
            error,
            // SAFETY: `release` rejects without mutating anything, so the
            // block is in the same state it was passed in, and this is again
            // its only view.
            block: unsafe { Block::from_raw(ptr, len) },
        })
    }

    /// Returns a block by its start pointer, as produced by
    /// [`Block::into_raw`].
    ///
    /// The address is bounds-checked before the lock is taken.
    ///
    /// # Errors
    ///
    /// - [`PoolError::OutOfBound`] if `ptr` is outside this pool's buffer.
    /// - [`PoolError::Misaligned`] / [`PoolError::DoubleFree`] with ownership
    ///   tracking enabled.
    ///
    /// # Safety
    ///
    /// If `ptr` is inside this pool, it must be the start of a block that is
    /// currently allocated, and no view of that block may be used afterwards.
    /// Without ownership tracking, an in-range pointer that is not a block
    /// start releases the block containing it.
    pub unsafe fn deallocate_ptr(&self, ptr: NonNull<u8>) -> PoolResult<()> {
        // SAFETY: forwarded to the caller.
        unsafe { self.release(ptr) }
    }

    /// Pushes the block at `ptr` onto the head of the free list.
    ///
    /// # Safety
    ///
    /// Same contract as [`deallocate_ptr`](Self::deallocate_ptr).
    pub(crate) unsafe fn release(&self, ptr: NonNull<u8>) -> PoolResult<()> {
        let base = self.base();
        let addr = ptr.as_ptr() as usize;

        if !self.layout.contains(base, addr) {
            warn!(addr, "deallocation outside block pool bounds");
            return Err(PoolError::OutOfBound { addr });
        }

        if self.track_ownership && !self.layout.is_block_start(base, addr) {
            warn!(addr, "deallocation of a pointer that is not a block start");
            return Err(PoolError::Misaligned { addr });
        }

        let index = self.layout.index_of(base, addr);
        let mut state = self.state.lock();

        let untracked = state.untrack(index);
        if let Err(err) = untracked {
            drop(state);
            warn!(index, "double free of pool block");
            return Err(err);
        }

        let next = state.head.unwrap_or(self.block_count());
        // SAFETY: the caller handed the block back, so the pool owns it again;
        // the lock is held.
        unsafe { self.write_link(index, next) };
        state.head = Some(index);
        state.free += 1;
        state.total_deallocations += 1;
        Ok(())
    }

    /// Start address of the buffer.
    #[inline]
    fn base(&self) -> usize {
        self.buffer.as_ptr() as usize
    }

    /// Pointer to the start of block `index`.
    #[inline]
    fn block_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.block_count());
        // SAFETY: `index < block_count`, so the offset stays inside the
        // buffer, and a pointer into a live allocation is never null.
        unsafe { NonNull::new_unchecked(self.buffer.as_ptr().add(self.layout.offset_of(index))) }
    }

    /// Reads the link word of free block `index`.
    ///
    /// # Safety
    ///
    /// Block `index` must be free and the pool lock held.
    #[inline]
    unsafe fn read_link(&self, index: usize) -> usize {
        // SAFETY: the block spans at least `LINK_SIZE` bytes of initialized
        // memory and nobody else accesses it. The stride can be odd, hence the
        // unaligned read.
        unsafe { self.block_ptr(index).as_ptr().cast::<usize>().read_unaligned() }
    }

    /// Stores `next` in the link word of block `index`.
    ///
    /// # Safety
    ///
    /// The pool must own block `index` and hold the lock.
    #[inline]
    unsafe fn write_link(&self, index: usize, next: usize) {
        // SAFETY: as in `read_link`.
        unsafe { self.block_ptr(index).as_ptr().cast::<usize>().write_unaligned(next) }
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        if self.buffer_layout.size() > 0 {
            // SAFETY: the buffer was allocated in `from_config` with this
            // layout, and every Block borrows the pool, so none outlive it.
            unsafe { alloc::dealloc(self.buffer.as_ptr(), self.buffer_layout) }
        }
    }
}

// SAFETY: the pool owns its buffer; all shared mutable state sits behind
// `PoolLock`, and link words are only touched while holding it.
unsafe impl Send for FixedPool {}
// SAFETY: see above. Allocated blocks are disjoint from free blocks, so
// callers writing their views never race with link-word accesses.
unsafe impl Sync for FixedPool {}
