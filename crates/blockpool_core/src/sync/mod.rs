//! # Synchronization
//!
//! ```text
//! Thread 1:  allocate()   ─┐
//! Thread 2:  deallocate() ─┼──►  PoolLock  ──►  free list + counters
//! Thread 3:  allocate()   ─┘
//! ```
//!
//! One lock per pool. Every critical section is O(1), so contention windows
//! are a few instructions wide.

mod lock;

pub use lock::{LockKind, PoolGuard, PoolLock};
