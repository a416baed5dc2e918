//! Storage module.
//!
//! This module provides the storage layer, including:
//! - Page-level I/O and allocation ([`page`])
//! - Buffer pool management ([`buffer_pool`])

pub mod buffer_pool;
pub mod page;

// Re-export commonly used types
pub use buffer_pool::{BufferPoolManager, BufferPoolStats, DirtyFlag, FillMode, FrameDescriptor};
pub use page::{
    DiskManager, FileDiskManager, IoStats, MemoryDiskManager, Page, PageId, PAGE_SIZE,
};
