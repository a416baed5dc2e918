//! Error types for buffer pool operations.

use thiserror::Error;

/// Result type alias using [`BufferError`].
pub type Result<T> = std::result::Result<T, BufferError>;

/// Error types for buffer pool and disk manager operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The caller broke a precondition of the called operation.
    ///
    /// The manager's state is left exactly as it was before the call.
    #[error("Usage violation: {0}")]
    UsageViolation(String),

    /// Every frame is pinned, so no frame can be handed out.
    #[error("Buffer pool exhausted: all {frames} frames are pinned")]
    PoolExhausted { frames: usize },

    /// I/O failure reported by the disk manager.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Disk manager contract failure (bad page id, double free, ...).
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid buffer pool configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BufferError {
    /// Returns true if this error is a caller bug.
    #[must_use]
    pub fn is_usage_violation(&self) -> bool {
        matches!(self, BufferError::UsageViolation(_))
    }

    /// Returns true if every frame was pinned when a frame was needed.
    #[must_use]
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, BufferError::PoolExhausted { .. })
    }

    /// Returns true if the caller can resolve this error by unpinning pages
    /// and retrying.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_pool_exhausted()
    }
}
