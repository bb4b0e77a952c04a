//! # Blockpool Core
//!
//! Fixed-size block allocator designed for:
//! - Object recycling and network buffer pools
//! - O(1) allocate and deallocate
//! - Zero system allocations after construction
//!
//! ## Architecture Rules
//!
//! 1. **One buffer** - `block_count * stride` bytes, reserved up front
//! 2. **Intrusive free list** - free blocks store the index of the next free block
//! 3. **Lazy initialization** - links are written on first touch, construction is O(1)
//! 4. **One lock** - every free-list mutation is serialized
//!
//! ## Example
//!
//! ```rust,ignore
//! use blockpool_core::FixedPool;
//!
//! let pool = FixedPool::new(4096, 1500)?;
//! let mut packet = pool.allocate()?;
//! packet[..4].copy_from_slice(b"PING");
//! pool.deallocate(packet)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;
pub mod sync;

pub use config::PoolConfig;
pub use error::{ConfigError, ConfigResult, DeallocError, PoolError, PoolResult};
pub use memory::{Block, BlockLayout, FixedPool, PoolStats, ScopedBlock, LINK_SIZE};
pub use sync::LockKind;
