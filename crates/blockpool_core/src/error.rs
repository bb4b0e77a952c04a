//! # Pool Error Types
//!
//! All errors that can occur while creating, allocating from or returning
//! blocks to a pool.

use thiserror::Error;

use crate::memory::Block;

/// Errors returned by [`FixedPool`](crate::FixedPool) operations.
///
/// None of these are fatal: the pool's invariants hold after any of them is
/// returned, and no partial mutation has happened.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Every block is currently allocated. Retry after a deallocation.
    #[error("no space left: all {block_count} blocks are allocated")]
    OutOfMemory {
        /// Capacity of the exhausted pool.
        block_count: usize,
    },

    /// The address handed to a deallocation is outside this pool's buffer.
    ///
    /// Signals a caller bug: a block from another pool, a corrupted pointer,
    /// or a view outliving the buffer it came from.
    #[error("index is out of bound: address {addr:#x} is not inside this pool")]
    OutOfBound {
        /// The rejected address.
        addr: usize,
    },

    /// `block_count * stride` does not fit into a single allocation.
    #[error("capacity overflow: {block_count} blocks of {stride} bytes")]
    CapacityOverflow {
        /// Requested number of blocks.
        block_count: usize,
        /// Effective stride in bytes.
        stride: usize,
    },

    /// The block is already free. Only reported with ownership tracking.
    #[error("double free of block {index}")]
    DoubleFree {
        /// Index of the block that was already free.
        index: usize,
    },

    /// The address is inside the pool but not at a block start. Only
    /// reported with ownership tracking.
    #[error("address {addr:#x} is not the start of a block")]
    Misaligned {
        /// The rejected address.
        addr: usize,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// A block that [`FixedPool::deallocate`](crate::FixedPool::deallocate)
/// refused, handed back together with the reason.
///
/// The pool did not touch the block, so it is still allocated wherever it came
/// from and can be returned there.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct DeallocError<'pool> {
    /// Why the block was rejected.
    pub error: PoolError,
    /// The rejected block, unchanged.
    pub block: Block<'pool>,
}

impl From<DeallocError<'_>> for PoolError {
    fn from(err: DeallocError<'_>) -> Self {
        err.error
    }
}

/// Errors raised while loading a [`PoolConfig`](crate::PoolConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed into a config.
    #[error("invalid pool configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed, but describes a pool that cannot be built.
    #[error("invalid pool configuration: {0}")]
    Invalid(#[from] PoolError),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PoolError::OutOfMemory { block_count: 5 };
        assert_eq!(err.to_string(), "no space left: all 5 blocks are allocated");

        let err = PoolError::OutOfBound { addr: 0x10 };
        assert_eq!(
            err.to_string(),
            "index is out of bound: address 0x10 is not inside this pool"
        );
    }

    #[test]
    fn test_config_error_wraps_pool_error() {
        let err = ConfigError::from(PoolError::CapacityOverflow {
            block_count: usize::MAX,
            stride: 8,
        });
        assert!(matches!(err, ConfigError::Invalid(PoolError::CapacityOverflow { .. })));
    }
}
