//! # Pool Lock
//!
//! The single exclusive lock guarding a pool's mutable state.
//!
//! Critical sections are O(1) and a few instructions wide, so the default is
//! a busy-waiting spin lock. Environments where spinning is unwelcome (heavily
//! oversubscribed cores, priority inversion concerns) can pick a parking mutex
//! instead. Both give the same guarantee: every mutation is serialized, and
//! the guard releases the lock on every exit path.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

/// Which lock implementation a pool uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// Busy-wait spin lock (`spin::Mutex`).
    #[default]
    Spin,
    /// OS-assisted parking mutex (`parking_lot::Mutex`).
    Parking,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spin => f.write_str("spin"),
            Self::Parking => f.write_str("parking"),
        }
    }
}

/// Exclusive lock over `T`, backed by the implementation chosen at
/// construction.
pub enum PoolLock<T> {
    /// Spin-lock backed.
    Spin(spin::Mutex<T>),
    /// Parking-mutex backed.
    Parking(parking_lot::Mutex<T>),
}

impl<T> PoolLock<T> {
    /// Wraps `value` in a lock of the given kind.
    #[must_use]
    pub fn new(kind: LockKind, value: T) -> Self {
        match kind {
            LockKind::Spin => Self::Spin(spin::Mutex::new(value)),
            LockKind::Parking => Self::Parking(parking_lot::Mutex::new(value)),
        }
    }

    /// The kind of lock in use.
    #[must_use]
    pub const fn kind(&self) -> LockKind {
        match self {
            Self::Spin(_) => LockKind::Spin,
            Self::Parking(_) => LockKind::Parking,
        }
    }

    /// Acquires the lock, spinning or parking until it is available.
    #[inline]
    pub fn lock(&self) -> PoolGuard<'_, T> {
        match self {
            Self::Spin(mutex) => PoolGuard::Spin(mutex.lock()),
            Self::Parking(mutex) => PoolGuard::Parking(mutex.lock()),
        }
    }
}

impl<T> fmt::Debug for PoolLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolLock").field("kind", &self.kind()).finish_non_exhaustive()
    }
}

/// RAII guard for [`PoolLock`]. The lock is released when this is dropped.
pub enum PoolGuard<'a, T> {
    /// Guard of a spin lock.
    Spin(spin::MutexGuard<'a, T>),
    /// Guard of a parking mutex.
    Parking(parking_lot::MutexGuard<'a, T>),
}

impl<T> Deref for PoolGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        match self {
            Self::Spin(guard) => &**guard,
            Self::Parking(guard) => &**guard,
        }
    }
}

impl<T> DerefMut for PoolGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        match self {
            Self::Spin(guard) => &mut **guard,
            Self::Parking(guard) => &mut **guard,
        }
    }
}
