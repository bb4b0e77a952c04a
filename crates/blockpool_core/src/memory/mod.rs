//! # Memory Management
//!
//! One pre-allocated buffer, carved into fixed-size blocks.
//!
//! ## Design Philosophy
//!
//! All memory is allocated once at construction. Afterwards:
//! - No heap allocations
//! - No per-block bookkeeping outside the blocks themselves
//! - Predictable, flat latency

mod block;
mod layout;
mod ownership;
mod pool;
mod stats;

pub use block::{Block, ScopedBlock};
pub use layout::{BlockLayout, LINK_SIZE};
pub use pool::FixedPool;
pub use stats::PoolStats;
