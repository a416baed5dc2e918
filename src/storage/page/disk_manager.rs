//! Disk manager contract and file-backed implementation.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{BufferError, Result};
use crate::storage::page::{Page, PageId, PAGE_SIZE};

/// Page allocation and I/O, as seen by the buffer pool.
///
/// Every call is synchronous. Failures are returned unchanged to the
/// buffer pool's caller.
pub trait DiskManager {
    /// Reserves `run_size` contiguous pages and returns the first one.
    ///
    /// # Errors
    ///
    /// Returns an error if `run_size` is 0 or the pages cannot be reserved.
    fn allocate(&mut self, run_size: u32) -> Result<PageId>;

    /// Releases a previously allocated page.
    ///
    /// # Errors
    ///
    /// Returns an error if the page was never allocated or is already free.
    fn deallocate(&mut self, page_id: PageId) -> Result<()>;

    /// Fills `page` with the on-disk contents of `page_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persists `page` at the disk location of `page_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Returns the number of pages ever allocated (the high-water mark).
    fn num_pages(&self) -> u32;
}

/// Bookkeeping shared by the disk manager implementations: the high-water
/// mark and the set of deallocated pages available for reuse.
#[derive(Debug, Default)]
pub(super) struct PageAllocator {
    next_page_idx: u32,
    free: BTreeSet<PageId>,
}

impl PageAllocator {
    pub(super) fn with_high_water(next_page_idx: u32) -> Self {
        Self {
            next_page_idx,
            free: BTreeSet::new(),
        }
    }

    pub(super) fn high_water(&self) -> u32 {
        self.next_page_idx
    }

    /// Reserves a run. Single pages reuse the lowest free page first.
    pub(super) fn allocate(&mut self, run_size: u32) -> Result<PageId> {
        if run_size == 0 {
            return Err(BufferError::StorageError("Cannot allocate 0 pages".into()));
        }
        if run_size == 1 {
            if let Some(page_id) = self.free.pop_first() {
                return Ok(page_id);
            }
        }

        let start = self.next_page_idx;
        let end = start
            .checked_add(run_size)
            .filter(|&end| end <= PageId::INVALID.index())
            .ok_or_else(|| {
                BufferError::StorageError(format!(
                    "Cannot allocate {run_size} pages: page id space exhausted"
                ))
            })?;
        self.next_page_idx = end;
        Ok(PageId::new(start))
    }

    pub(super) fn deallocate(&mut self, page_id: PageId) -> Result<()> {
        check_page_id(page_id)?;
        if page_id.index() >= self.next_page_idx {
            return Err(BufferError::StorageError(format!(
                "Cannot deallocate {page_id}: never allocated"
            )));
        }
        if !self.free.insert(page_id) {
            return Err(BufferError::StorageError(format!(
                "Cannot deallocate {page_id}: already free"
            )));
        }
        Ok(())
    }

    /// Undoes the high-water bump of a failed run allocation.
    pub(super) fn rollback(&mut self, first: PageId, run_size: u32) {
        if first.index() + run_size == self.next_page_idx {
            self.next_page_idx = first.index();
        } else {
            self.free.insert(first);
        }
    }
}

pub(super) fn check_page_id(page_id: PageId) -> Result<()> {
    if page_id.is_valid() {
        Ok(())
    } else {
        Err(BufferError::StorageError(
            "The invalid page id does not name a disk page".into(),
        ))
    }
}

/// Manages disk I/O for pages stored in a single file.
///
/// Page `i` lives at byte offset `i * PAGE_SIZE`. The free set is kept in
/// memory only; reopening a file starts with every page allocated.
pub struct FileDiskManager {
    /// Path to the page file.
    path: PathBuf,
    /// File handle for the page file.
    file: File,
    /// High-water mark and free set.
    allocator: PageAllocator,
}

impl FileDiskManager {
    /// Opens or creates a page file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();

        // Calculate next page index from file size
        let next_page_idx = file_len.div_ceil(PAGE_SIZE as u64) as u32;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            allocator: PageAllocator::with_high_water(next_page_idx),
        })
    }

    /// Creates a fresh, empty page file, truncating any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            allocator: PageAllocator::default(),
        })
    }

    /// Returns the path to the page file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes all buffered writes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Returns the size of the page file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl DiskManager for FileDiskManager {
    fn allocate(&mut self, run_size: u32) -> Result<PageId> {
        let first = self.allocator.allocate(run_size)?;

        // Extend the file to cover the run
        let new_size = (u64::from(first.index()) + u64::from(run_size)) * PAGE_SIZE as u64;
        if new_size > self.file.metadata()?.len() {
            if let Err(e) = self.file.set_len(new_size) {
                self.allocator.rollback(first, run_size);
                return Err(e.into());
            }
        }

        debug!("Allocated {run_size} page(s) starting at {first}");
        Ok(first)
    }

    fn deallocate(&mut self, page_id: PageId) -> Result<()> {
        self.allocator.deallocate(page_id)?;
        debug!("Deallocated {page_id}");
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        check_page_id(page_id)?;
        self.file.seek(SeekFrom::Start(page_id.offset()))?;

        match self.file.read_exact(page.data_mut()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Page doesn't exist on disk yet
                page.data_mut().fill(0);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        check_page_id(page_id)?;
        self.file.seek(SeekFrom::Start(page_id.offset()))?;
        self.file.write_all(page.data())?;
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.allocator.high_water()
    }
}
