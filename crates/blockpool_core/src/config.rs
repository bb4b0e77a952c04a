//! # Pool Configuration
//!
//! Construction-time options for a [`FixedPool`](crate::FixedPool). Loaded
//! once at startup, usually from a TOML file:
//!
//! ```toml
//! block_count = 4096
//! block_size = 1500
//! lock = "spin"            # or "parking"
//! track_ownership = false
//! ```
//!
//! Both sizes are fixed for the pool's lifetime. There is no resize.

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::memory::BlockLayout;
use crate::sync::LockKind;

/// Options a pool is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of blocks.
    pub block_count: usize,
    /// Usable bytes per block.
    pub block_size: usize,
    /// Lock implementation guarding the free list.
    #[serde(default)]
    pub lock: LockKind,
    /// Keep an allocated/free bitmap to reject double frees.
    ///
    /// Costs one bit per block and makes construction O(n / 64).
    #[serde(default)]
    pub track_ownership: bool,
}

impl PoolConfig {
    /// Config for `block_count` blocks of `block_size` bytes, spin lock, no
    /// ownership tracking.
    #[must_use]
    pub const fn new(block_count: usize, block_size: usize) -> Self {
        Self {
            block_count,
            block_size,
            lock: LockKind::Spin,
            track_ownership: false,
        }
    }

    /// Sets the lock implementation.
    #[must_use]
    pub const fn with_lock(mut self, lock: LockKind) -> Self {
        self.lock = lock;
        self
    }

    /// Enables or disables double-free detection.
    #[must_use]
    pub const fn with_ownership_tracking(mut self, enabled: bool) -> Self {
        self.track_ownership = enabled;
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`](crate::ConfigError::Parse) for malformed
    /// TOML or unknown keys, and
    /// [`ConfigError::Invalid`](crate::ConfigError::Invalid) if the described
    /// buffer cannot be allocated.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the buffer size fits a single allocation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`](crate::ConfigError::Invalid) on
    /// capacity overflow.
    pub fn validate(&self) -> ConfigResult<()> {
        BlockLayout::new(self.block_count, self.block_size)?;
        Ok(())
    }
}
