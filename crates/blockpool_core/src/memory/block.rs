//! # Block Views
//!
//! Handles to allocated blocks. A [`Block`] borrows its pool, so the buffer
//! behind it cannot be released while the view is alive.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use super::pool::FixedPool;

/// Exclusive view of one allocated block.
///
/// Dereferences to exactly `block_size` bytes. The stride may be larger; the
/// extra bytes are never visible through the view. Contents are whatever was
/// last written: blocks are not zeroed on allocation or on release.
///
/// `Block` is not `Clone`, and [`FixedPool::deallocate`] consumes it, so a
/// block obtained through the safe API cannot be released twice.
pub struct Block<'pool> {
    ptr: NonNull<u8>,
    len: usize,
    _marker: PhantomData<&'pool mut [u8]>,
}

impl<'pool> Block<'pool> {
    /// Rebuilds a view from parts produced by [`Block::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must be the start of a block currently allocated from a pool
    /// that outlives `'pool`, `len` must not exceed that pool's block size,
    /// and no other live view may refer to the same block.
    #[inline]
    #[must_use]
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    /// Detaches the view, returning the block start.
    ///
    /// The block stays allocated. Hand the pointer back with
    /// [`FixedPool::deallocate_ptr`] or rebuild the view with
    /// [`Block::from_raw`].
    #[inline]
    #[must_use]
    pub fn into_raw(self) -> NonNull<u8> {
        self.ptr
    }

    /// Start address of the block.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mutable start address of the block.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Deref for Block<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` starts an allocated block of at least `len`
        // initialized bytes (the buffer is zeroed at construction). The pool
        // does not touch allocated blocks, and this view is the only one.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Block<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `deref`; `&mut self` makes the access unique.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

// SAFETY: a Block is an exclusive byte view, equivalent to `&mut [u8]`.
unsafe impl Send for Block<'_> {}
// SAFETY: shared access only yields `&[u8]`.
unsafe impl Sync for Block<'_> {}

/// A [`Block`] that returns itself to its pool when dropped.
///
/// ```rust,ignore
/// let pool = FixedPool::new(64, 1500)?;
/// {
///     let mut packet = pool.allocate_scoped()?;
///     packet[..4].copy_from_slice(b"PING");
/// } // back in the pool here
/// ```
pub struct ScopedBlock<'pool> {
    block: Block<'pool>,
    pool: &'pool FixedPool,
}

impl<'pool> ScopedBlock<'pool> {
    pub(crate) fn new(block: Block<'pool>, pool: &'pool FixedPool) -> Self {
        Self { block, pool }
    }

    /// Detaches the block from the guard. It is no longer released on drop.
    #[must_use]
    pub fn into_block(self) -> Block<'pool> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped or used again, so the block is
        // moved out exactly once.
        unsafe { ptr::read(&this.block) }
    }
}

impl Deref for ScopedBlock<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.block
    }
}

impl DerefMut for ScopedBlock<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.block
    }
}

impl fmt::Debug for ScopedBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedBlock").field(&self.block).finish()
    }
}

impl Drop for ScopedBlock<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard owns the block, it came from `self.pool`, and the
        // guard is being dropped so nothing can reach the block afterwards.
        let released = unsafe { self.pool.release(self.block.ptr) };
        debug_assert!(released.is_ok(), "scoped block rejected by its own pool");
    }
}
