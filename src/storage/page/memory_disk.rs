//! In-memory disk manager.
//!
//! Holds pages in a map instead of a file and counts every call, which
//! makes it the disk of choice for tests and benchmarks. Any kind of call
//! can be made to fail on demand.

use std::collections::HashMap;
use std::io;

use crate::error::Result;
use crate::storage::page::disk_manager::{check_page_id, PageAllocator};
use crate::storage::page::{DiskManager, Page, PageId};

/// Counts of calls made against a [`MemoryDiskManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Successful page reads.
    pub reads: u64,
    /// Successful page writes.
    pub writes: u64,
    /// Successful allocations (runs, not pages).
    pub allocations: u64,
    /// Successful deallocations.
    pub deallocations: u64,
}

/// Disk manager backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryDiskManager {
    pages: HashMap<PageId, Page>,
    allocator: PageAllocator,
    stats: IoStats,
    fail_reads: bool,
    fail_writes: bool,
    fail_allocations: bool,
    fail_deallocations: bool,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory disk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the call counters.
    #[must_use]
    pub fn stats(&self) -> IoStats {
        self.stats
    }

    /// Zeroes the call counters.
    pub fn reset_stats(&mut self) {
        self.stats = IoStats::default();
    }

    /// Returns the stored contents of a page, if it was ever written.
    #[must_use]
    pub fn contents(&self, page_id: PageId) -> Option<&Page> {
        self.pages.get(&page_id)
    }

    /// Makes every subsequent read fail until reset.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Makes every subsequent write fail until reset.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Makes every subsequent allocation fail until reset.
    pub fn fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Makes every subsequent deallocation fail until reset.
    pub fn fail_deallocations(&mut self, fail: bool) {
        self.fail_deallocations = fail;
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {what} failure"))
}

impl DiskManager for MemoryDiskManager {
    fn allocate(&mut self, run_size: u32) -> Result<PageId> {
        if self.fail_allocations {
            return Err(injected("allocation").into());
        }
        let first = self.allocator.allocate(run_size)?;
        self.stats.allocations += 1;
        Ok(first)
    }

    fn deallocate(&mut self, page_id: PageId) -> Result<()> {
        if self.fail_deallocations {
            return Err(injected("deallocation").into());
        }
        self.allocator.deallocate(page_id)?;
        self.pages.remove(&page_id);
        self.stats.deallocations += 1;
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        check_page_id(page_id)?;
        if self.fail_reads {
            return Err(injected("read").into());
        }
        match self.pages.get(&page_id) {
            Some(stored) => page.copy_from(stored),
            None => page.data_mut().fill(0),
        }
        self.stats.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        check_page_id(page_id)?;
        if self.fail_writes {
            return Err(injected("write").into());
        }
        self.pages.insert(page_id, page.clone());
        self.stats.writes += 1;
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.allocator.high_water()
    }
}
