//! # Block Layout
//!
//! Geometry of a pool buffer and the index/address translation every pool
//! operation is built on. Everything here is pure arithmetic on integers;
//! nothing touches memory.

use std::alloc::Layout;
use std::mem;

use crate::error::{PoolError, PoolResult};

/// Width of the link word stored at the start of every free block.
pub const LINK_SIZE: usize = mem::size_of::<usize>();

/// Geometry of a fixed-size block buffer.
///
/// ```text
///  base                                              base + byte_len()
///   │                                                       │
///   ▼                                                       ▼
///   ┌──────────────┬──────────────┬──────────────┬─────────┐
///   │   block 0    │   block 1    │   block 2    │   ...   │
///   └──────────────┴──────────────┴──────────────┴─────────┘
///   ◄── stride ──► ◄── stride ──►
///   ◄ block_size ►
/// ```
///
/// The stride is never smaller than [`LINK_SIZE`], so a free block can always
/// hold the index of the next free block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    block_count: usize,
    block_size: usize,
    stride: usize,
}

impl BlockLayout {
    /// Computes the layout for `block_count` blocks of `block_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CapacityOverflow`] if the whole buffer cannot be
    /// described by a single [`Layout`].
    pub fn new(block_count: usize, block_size: usize) -> PoolResult<Self> {
        let stride = block_size.max(LINK_SIZE);
        let layout = Self {
            block_count,
            block_size,
            stride,
        };
        layout.buffer_layout()?;
        Ok(layout)
    }

    /// Number of blocks.
    #[inline]
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.block_count
    }

    /// Usable bytes per block, as requested by the caller.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Byte distance between consecutive block starts.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Total size of the buffer in bytes.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        // Checked in `new`.
        self.block_count * self.stride
    }

    /// The [`Layout`] of the backing buffer, aligned for the link word.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::CapacityOverflow`] if the size overflows.
    pub fn buffer_layout(&self) -> PoolResult<Layout> {
        let overflow = PoolError::CapacityOverflow {
            block_count: self.block_count,
            stride: self.stride,
        };
        let size = self.block_count.checked_mul(self.stride).ok_or(overflow)?;
        Layout::from_size_align(size, mem::align_of::<usize>()).map_err(|_| overflow)
    }

    /// Byte offset of block `index` from the buffer start.
    ///
    /// Valid for `index <= block_count`; the one-past-end offset is only used
    /// as a bound.
    #[inline]
    #[must_use]
    pub const fn offset_of(&self, index: usize) -> usize {
        debug_assert!(index <= self.block_count);
        index * self.stride
    }

    /// Address of block `index` in a buffer starting at `base`.
    #[inline]
    #[must_use]
    pub const fn addr_of(&self, base: usize, index: usize) -> usize {
        base + self.offset_of(index)
    }

    /// Index of the block containing `addr`.
    ///
    /// Only meaningful when [`contains`](Self::contains) holds for `addr`.
    #[inline]
    #[must_use]
    pub const fn index_of(&self, base: usize, addr: usize) -> usize {
        (addr - base) / self.stride
    }

    /// Whether `addr` lies in `[base, base + byte_len())`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, base: usize, addr: usize) -> bool {
        addr >= base && addr < self.addr_of(base, self.block_count)
    }

    /// Whether `addr` is exactly the start of a block.
    #[inline]
    #[must_use]
    pub const fn is_block_start(&self, base: usize, addr: usize) -> bool {
        self.contains(base, addr) && (addr - base) % self.stride == 0
    }
}
