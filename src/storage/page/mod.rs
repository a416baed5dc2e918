//! Page-level storage primitives.
//!
//! This module defines the core page abstractions:
//! - `PageId`: Unique identifier for a disk page
//! - `Page`: Fixed-size data block (4KB)
//! - `DiskManager`: Page allocation and I/O contract, with a file-backed
//!   and an in-memory implementation

mod disk_manager;
mod memory_disk;
mod page_id;

pub use disk_manager::{DiskManager, FileDiskManager};
pub use memory_disk::{IoStats, MemoryDiskManager};
pub use page_id::PageId;

/// Page size in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// A fixed-size page of data.
///
/// Contents are opaque to the buffer pool, which only moves them between
/// disk and memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Creates a zeroed page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Creates a page holding `bytes`, zero-padded to `PAGE_SIZE`.
    ///
    /// Bytes beyond `PAGE_SIZE` are ignored.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut page = Self::new();
        let len = bytes.len().min(PAGE_SIZE);
        page.data[..len].copy_from_slice(&bytes[..len]);
        page
    }

    /// Returns a read-only view of the page data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Returns a mutable view of the page data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Overwrites this page with the contents of `other`.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data[..]);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("data_len", &self.data.len())
            .finish()
    }
}
