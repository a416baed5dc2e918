//! Buffer pool configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BufferError, Result};

/// Configuration for a [`BufferPoolManager`](crate::storage::BufferPoolManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Number of page frames in the pool (default: 1024, i.e. 4MB).
    pub frame_count: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { frame_count: 1024 }
    }
}

impl BufferPoolConfig {
    /// Creates a configuration with the given number of frames.
    #[must_use]
    pub fn with_frames(frame_count: usize) -> Self {
        Self { frame_count }
    }

    /// Checks that the configuration describes a usable pool.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `frame_count` is 0.
    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(BufferError::ConfigError(
                "Buffer pool frame count must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
