//! Pool statistics snapshot.

/// Point-in-time counters for a [`FixedPool`](crate::FixedPool).
///
/// Taken under the pool lock, so all fields are mutually consistent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of blocks.
    pub block_count: usize,
    /// Usable bytes per block.
    pub block_size: usize,
    /// Byte distance between block starts.
    pub stride: usize,
    /// Blocks available for allocation.
    pub free: usize,
    /// Blocks currently handed out.
    pub allocated: usize,
    /// Blocks whose link word has been materialized.
    pub initialized: usize,
    /// Highest `allocated` value seen so far.
    pub peak_allocated: usize,
    /// Successful allocations since construction.
    pub total_allocations: u64,
    /// Successful deallocations since construction.
    pub total_deallocations: u64,
    /// Allocations rejected with `OutOfMemory`.
    pub failed_allocations: u64,
}

impl PoolStats {
    /// Fraction of blocks currently allocated, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.block_count == 0 {
            return 0.0;
        }
        self.allocated as f64 / self.block_count as f64
    }
}
