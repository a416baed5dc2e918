//! clockpool - a clock-sweep buffer pool manager.
//!
//! Maps a bounded set of fixed-size in-memory frames onto a much larger
//! universe of disk pages. Higher layers pin pages through the
//! [`BufferPoolManager`](storage::BufferPoolManager) and never touch the
//! disk directly.

pub mod config;
pub mod error;
pub mod storage;

pub use config::BufferPoolConfig;
pub use error::{BufferError, Result};
pub use storage::{
    BufferPoolManager, DirtyFlag, DiskManager, FileDiskManager, FillMode, MemoryDiskManager,
    Page, PageId, PAGE_SIZE,
};
