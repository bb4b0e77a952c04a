//! # Ownership Tracking
//!
//! Optional allocated/free bitmap used to catch double frees. Lives inside
//! the pool's locked state, so it needs no synchronization of its own.

/// Bitset: 1 = allocated, 0 = free. 64 blocks per u64.
#[derive(Debug)]
pub struct OwnershipMap {
    bits: Box<[u64]>,
}

impl OwnershipMap {
    /// Creates a map for `block_count` blocks, all free.
    #[must_use]
    pub fn new(block_count: usize) -> Self {
        let word_count = block_count.div_ceil(64);
        Self {
            bits: vec![0u64; word_count].into_boxed_slice(),
        }
    }

    /// Whether block `index` is currently allocated.
    #[inline]
    #[must_use]
    pub fn is_allocated(&self, index: usize) -> bool {
        self.bits[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Records that block `index` was handed out.
    #[inline]
    pub fn mark_allocated(&mut self, index: usize) {
        self.bits[index / 64] |= 1u64 << (index % 64);
    }

    /// Records that block `index` was returned.
    #[inline]
    pub fn mark_free(&mut self, index: usize) {
        self.bits[index / 64] &= !(1u64 << (index % 64));
    }
}
