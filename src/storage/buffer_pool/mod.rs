//! Buffer pool management for page caching.
//!
//! This module implements the buffer pool that maps a fixed set of in-memory
//! frames onto disk pages. It provides:
//! - Page pinning and unpinning with reference counting
//! - Clock (second-chance) eviction with write-back of dirty victims
//! - Allocation and deallocation of disk pages coordinated with the pool
//!
//! # Architecture
//!
//! Three structures are kept consistent with each other: the frame table
//! (one [`FrameDescriptor`] per frame), the pool of page buffers (same
//! indexing), and the directory mapping each resident page to its frame.
//! The frame table is authoritative; the directory holds exactly the valid
//! frames.
//!
//! Page buffers are handed out as `&mut Page` borrowed from the manager, so
//! a view can never outlive the next call into the manager. Pinned pages
//! are re-resolved with [`BufferPoolManager::page`] and
//! [`BufferPoolManager::page_mut`].
//!
//! # Example
//!
//! ```
//! use clockpool::storage::{BufferPoolManager, DirtyFlag, FillMode, MemoryDiskManager};
//!
//! let mut pool = BufferPoolManager::new(8, MemoryDiskManager::new())?;
//! let (page_id, page) = pool.allocate_and_pin(1)?;
//! page.data_mut()[0] = 42;
//! pool.unpin(page_id, DirtyFlag::Dirty)?;
//!
//! let page = pool.pin(page_id, FillMode::DiskRead)?;
//! assert_eq!(page.data()[0], 42);
//! pool.unpin(page_id, DirtyFlag::Clean)?;
//! # Ok::<(), clockpool::BufferError>(())
//! ```

mod clock;
mod frame_descriptor;

pub use frame_descriptor::FrameDescriptor;

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::config::BufferPoolConfig;
use crate::error::{BufferError, Result};
use crate::storage::page::{DiskManager, Page, PageId};

use clock::ClockReplacer;

/// How the contents of a frame are determined when a page is installed.
#[derive(Debug, Clone, Copy)]
pub enum FillMode<'a> {
    /// Read the page from disk into the frame.
    DiskRead,
    /// Copy the given page into the frame; no disk I/O.
    ///
    /// Invalid against a page that is resident and pinned.
    MemoryCopy(&'a Page),
    /// Leave the frame's contents as they are; no disk I/O.
    NoOp,
}

/// Whether the caller modified a page while it held the pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyFlag {
    Clean,
    Dirty,
}

impl From<bool> for DirtyFlag {
    fn from(dirty: bool) -> Self {
        if dirty {
            DirtyFlag::Dirty
        } else {
            DirtyFlag::Clean
        }
    }
}

/// Where an installed frame gets its bytes from.
enum Source<'a> {
    Disk,
    Copy(&'a Page),
    /// Already read into the spare buffer.
    Staged,
    Untouched,
}

/// Buffer pool manager over a disk manager `D`.
pub struct BufferPoolManager<D: DiskManager> {
    /// Per-frame metadata, indexed by slot.
    frames: Vec<FrameDescriptor>,
    /// Page buffers, indexed like `frames`.
    pool: Vec<Page>,
    /// Maps resident page IDs to slots.
    directory: HashMap<PageId, usize>,
    /// Victim selection.
    replacer: ClockReplacer,
    /// Disk manager for page I/O.
    disk: D,
    /// Reads land here first and are swapped into the frame on success.
    spare: Page,
    /// Counter for pins satisfied from the pool.
    cache_hits: u64,
    /// Counter for pins that had to install the page.
    cache_misses: u64,
    /// Counter for valid pages replaced by another page.
    evictions: u64,
    /// Counter for dirty victims written before reuse.
    write_backs: u64,
}

impl<D: DiskManager> BufferPoolManager<D> {
    /// Creates a buffer pool with `frame_count` frames over `disk`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `frame_count` is 0.
    pub fn new(frame_count: usize, disk: D) -> Result<Self> {
        Self::with_config(&BufferPoolConfig::with_frames(frame_count), disk)
    }

    /// Creates a buffer pool from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn with_config(config: &BufferPoolConfig, disk: D) -> Result<Self> {
        config.validate()?;
        let frame_count = config.frame_count;

        Ok(Self {
            frames: (0..frame_count).map(FrameDescriptor::new).collect(),
            pool: (0..frame_count).map(|_| Page::new()).collect(),
            directory: HashMap::with_capacity(frame_count),
            replacer: ClockReplacer::new(),
            disk,
            spare: Page::new(),
            cache_hits: 0,
            cache_misses: 0,
            evictions: 0,
            write_backs: 0,
        })
    }

    /// Pins a page, installing it in a frame if it is not resident.
    ///
    /// A resident page only gets its pin count incremented; no I/O happens.
    /// Otherwise a victim frame is chosen, written back if dirty, and filled
    /// according to `mode`. The returned page carries exactly one more pin
    /// than before the call.
    ///
    /// # Errors
    ///
    /// - `UsageViolation` if `mode` is `MemoryCopy` and the page is resident
    ///   and pinned, or `page_id` is the sentinel
    /// - `PoolExhausted` if the page is not resident and every frame is pinned
    /// - Any disk manager error from the write-back or read
    pub fn pin(&mut self, page_id: PageId, mode: FillMode<'_>) -> Result<&mut Page> {
        if !page_id.is_valid() {
            return Err(usage("Cannot pin the invalid page id".into()));
        }

        if let Some(slot) = self.resident_slot(page_id) {
            let frame = &mut self.frames[slot];
            if matches!(mode, FillMode::MemoryCopy(_)) && frame.pin_count() > 0 {
                return Err(usage(format!(
                    "Memory-copy pin of {page_id}, which is already pinned"
                )));
            }
            frame.pin();
            self.cache_hits += 1;
            trace!("Pin hit {page_id} in slot {slot} (pins: {})", frame.pin_count());
            return Ok(&mut self.pool[slot]);
        }

        self.cache_misses += 1;
        let slot = self.pick_victim()?;
        let source = match mode {
            FillMode::DiskRead => Source::Disk,
            FillMode::MemoryCopy(page) => Source::Copy(page),
            FillMode::NoOp => Source::Untouched,
        };
        self.install(slot, page_id, source)?;
        trace!("Pin miss {page_id} installed in slot {slot}");
        Ok(&mut self.pool[slot])
    }

    /// Releases one pin on a page.
    ///
    /// When the last pin goes, the frame's ref bit is set so the clock
    /// passes over it once more. `Dirty` marks the frame for write-back;
    /// `Clean` never clears an earlier mark.
    ///
    /// # Errors
    ///
    /// Returns `UsageViolation` if the page is not resident or not pinned.
    pub fn unpin(&mut self, page_id: PageId, dirty: DirtyFlag) -> Result<()> {
        let Some(slot) = self.resident_slot(page_id) else {
            return Err(usage(format!("Cannot unpin {page_id}: not resident")));
        };
        let frame = &mut self.frames[slot];
        if frame.pin_count() == 0 {
            return Err(usage(format!("Cannot unpin {page_id}: not pinned")));
        }

        frame.unpin();
        if frame.pin_count() == 0 {
            frame.mark_ref(true);
        }
        if dirty == DirtyFlag::Dirty {
            frame.mark_dirty(true);
        }
        trace!("Unpinned {page_id} ({dirty:?}, pins: {})", frame.pin_count());
        Ok(())
    }

    /// Allocates a run of `run_size` disk pages and pins the first one.
    ///
    /// The first page is read from disk once and installed as a memory
    /// copy. If the new page is already resident and unpinned, its frame is
    /// reused without consulting the replacer. On failure the run is handed
    /// back to the disk manager.
    ///
    /// # Errors
    ///
    /// - `UsageViolation` if the allocated page is resident and pinned
    /// - `PoolExhausted` if a frame is needed and every frame is pinned
    /// - Any disk manager error
    pub fn allocate_and_pin(&mut self, run_size: u32) -> Result<(PageId, &mut Page)> {
        let page_id = self.disk.allocate(run_size)?;
        debug!("Allocated {run_size} page(s) starting at {page_id}");

        match self.install_allocated(page_id) {
            Ok(slot) => Ok((page_id, &mut self.pool[slot])),
            Err(e) => {
                self.release_run(page_id, run_size);
                Err(e)
            }
        }
    }

    /// Deallocates a disk page, dropping it from the pool if resident.
    ///
    /// The disk manager is asked to deallocate even if the page was never
    /// resident.
    ///
    /// # Errors
    ///
    /// - `UsageViolation` if the page is resident and pinned
    /// - Any disk manager error from the deallocation
    pub fn free(&mut self, page_id: PageId) -> Result<()> {
        let slot = self.resident_slot(page_id);
        if let Some(slot) = slot {
            if self.frames[slot].pin_count() > 0 {
                return Err(usage(format!("Cannot free {page_id}: page is pinned")));
            }
        }

        self.disk.deallocate(page_id)?;

        if let Some(slot) = slot {
            self.frames[slot].invalidate();
            self.directory.remove(&page_id);
        }
        debug!("Freed {page_id}");
        Ok(())
    }

    /// Writes a resident page to disk, dirty or not.
    ///
    /// Pin count, dirty bit and residency are left as they are.
    ///
    /// # Errors
    ///
    /// - `UsageViolation` if the page is not resident
    /// - Any disk manager error from the write
    pub fn flush(&mut self, page_id: PageId) -> Result<()> {
        let Some(slot) = self.resident_slot(page_id) else {
            return Err(usage(format!("Cannot flush {page_id}: not resident")));
        };
        self.disk.write_page(page_id, &self.pool[slot])?;
        trace!("Flushed {page_id} from slot {slot}");
        Ok(())
    }

    /// Writes every valid frame to disk in slot order.
    ///
    /// Stops at the first failed write.
    ///
    /// # Errors
    ///
    /// Returns any disk manager error from a write.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut written = 0;
        for (frame, page) in self.frames.iter().zip(&self.pool) {
            if frame.is_valid() {
                self.disk.write_page(frame.resident_page(), page)?;
                written += 1;
            }
        }
        debug!("Flushed {written} resident page(s)");
        Ok(())
    }

    /// Returns the number of frames in the pool.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Returns the number of valid frames with no pins.
    #[must_use]
    pub fn unpinned_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.is_valid() && f.pin_count() == 0)
            .count()
    }

    /// Returns the number of resident pages.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.directory.len()
    }

    /// Returns whether a page is resident.
    #[must_use]
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.resident_slot(page_id).is_some()
    }

    /// Returns the pin count of a resident page.
    #[must_use]
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.resident_slot(page_id)
            .map(|slot| self.frames[slot].pin_count())
    }

    /// Returns the descriptor of the frame at `slot`.
    #[must_use]
    pub fn frame(&self, slot: usize) -> Option<&FrameDescriptor> {
        self.frames.get(slot)
    }

    /// Returns all frame descriptors in slot order.
    #[must_use]
    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    /// Returns a pinned page's contents.
    ///
    /// # Errors
    ///
    /// Returns `UsageViolation` if the page is not resident and pinned.
    pub fn page(&self, page_id: PageId) -> Result<&Page> {
        let slot = self.pinned_slot(page_id)?;
        Ok(&self.pool[slot])
    }

    /// Returns a pinned page's contents for modification.
    ///
    /// The page is not marked dirty; report changes through
    /// [`unpin`](Self::unpin).
    ///
    /// # Errors
    ///
    /// Returns `UsageViolation` if the page is not resident and pinned.
    pub fn page_mut(&mut self, page_id: PageId) -> Result<&mut Page> {
        let slot = self.pinned_slot(page_id)?;
        Ok(&mut self.pool[slot])
    }

    /// Returns buffer pool statistics.
    #[must_use]
    pub fn stats(&self) -> BufferPoolStats {
        let mut dirty_pages = 0;
        let mut pinned_pages = 0;
        for frame in self.frames.iter().filter(|f| f.is_valid()) {
            if frame.is_dirty() {
                dirty_pages += 1;
            }
            if frame.pin_count() > 0 {
                pinned_pages += 1;
            }
        }

        BufferPoolStats {
            frame_count: self.frames.len(),
            pages_used: self.directory.len(),
            dirty_pages,
            pinned_pages,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            evictions: self.evictions,
            write_backs: self.write_backs,
        }
    }

    /// Resets the cache statistics counters.
    pub fn reset_stats(&mut self) {
        self.cache_hits = 0;
        self.cache_misses = 0;
        self.evictions = 0;
        self.write_backs = 0;
    }

    /// Returns the disk manager.
    #[must_use]
    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// Returns the disk manager mutably.
    ///
    /// Writes made through it bypass the pool.
    pub fn disk_mut(&mut self) -> &mut D {
        &mut self.disk
    }

    /// Consumes the pool and returns the disk manager, without flushing.
    #[must_use]
    pub fn into_disk(self) -> D {
        self.disk
    }

    /// Internal: slot of a valid frame holding `page_id`.
    fn resident_slot(&self, page_id: PageId) -> Option<usize> {
        self.directory
            .get(&page_id)
            .copied()
            .filter(|&slot| self.frames[slot].is_valid())
    }

    /// Internal: slot of `page_id` if it is resident and pinned.
    fn pinned_slot(&self, page_id: PageId) -> Result<usize> {
        match self.resident_slot(page_id) {
            Some(slot) if self.frames[slot].pin_count() > 0 => Ok(slot),
            Some(_) => Err(usage(format!("{page_id} is not pinned"))),
            None => Err(usage(format!("{page_id} is not resident"))),
        }
    }

    /// Internal: asks the clock for a reusable frame.
    fn pick_victim(&mut self) -> Result<usize> {
        self.replacer.pick_victim(&mut self.frames).ok_or_else(|| {
            warn!("Buffer pool exhausted: all {} frames pinned", self.frames.len());
            BufferError::PoolExhausted {
                frames: self.frames.len(),
            }
        })
    }

    /// Internal: reads a freshly allocated page and pins it in a frame.
    fn install_allocated(&mut self, page_id: PageId) -> Result<usize> {
        self.disk.read_page(page_id, &mut self.spare)?;

        let slot = match self.resident_slot(page_id) {
            Some(slot) if self.frames[slot].pin_count() > 0 => {
                return Err(usage(format!(
                    "Allocated {page_id} is already resident and pinned"
                )));
            }
            Some(slot) => slot,
            None => self.pick_victim()?,
        };
        self.install(slot, page_id, Source::Staged)?;
        Ok(slot)
    }

    /// Internal: gives an allocated run back after a failed install.
    ///
    /// Runs are released page by page, so a later multi-page allocation
    /// will not reuse them as a run.
    fn release_run(&mut self, first: PageId, run_size: u32) {
        for offset in 0..run_size {
            let page_id = PageId::new(first.index() + offset);
            if let Err(e) = self.disk.deallocate(page_id) {
                warn!("Failed to release {page_id} after failed allocation: {e}");
            }
        }
    }

    /// Internal: replaces whatever occupies `slot` with `page_id`, pinned once.
    ///
    /// All disk I/O happens before any bookkeeping changes, so an error
    /// leaves the frame table, directory and pool untouched.
    fn install(&mut self, slot: usize, page_id: PageId, source: Source<'_>) -> Result<()> {
        let victim = &self.frames[slot];
        let was_valid = victim.is_valid();
        let old_page = victim.resident_page();

        if was_valid && victim.is_dirty() {
            self.disk.write_page(old_page, &self.pool[slot])?;
            self.write_backs += 1;
            debug!("Wrote back dirty {old_page} from slot {slot}");
        }
        if let Source::Disk = source {
            self.disk.read_page(page_id, &mut self.spare)?;
        }

        if self.directory.get(&old_page) == Some(&slot) {
            self.directory.remove(&old_page);
        }
        if was_valid {
            self.evictions += 1;
        }
        self.frames[slot].assign(page_id);
        self.directory.insert(page_id, slot);

        match source {
            Source::Disk | Source::Staged => std::mem::swap(&mut self.pool[slot], &mut self.spare),
            Source::Copy(page) => self.pool[slot].copy_from(page),
            Source::Untouched => {}
        }

        self.frames[slot].pin();
        Ok(())
    }
}

fn usage(message: String) -> BufferError {
    warn!("{message}");
    BufferError::UsageViolation(message)
}

/// Statistics about the buffer pool state.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Number of frames in the pool.
    pub frame_count: usize,
    /// Current number of resident pages.
    pub pages_used: usize,
    /// Number of dirty pages.
    pub dirty_pages: usize,
    /// Number of pinned pages.
    pub pinned_pages: usize,
    /// Number of pins satisfied without installing the page.
    pub cache_hits: u64,
    /// Number of pins that installed the page.
    pub cache_misses: u64,
    /// Number of resident pages replaced by another page.
    pub evictions: u64,
    /// Number of dirty victims written to disk before reuse.
    pub write_backs: u64,
}

impl BufferPoolStats {
    /// Calculates the cache hit rate as a fraction (0.0 to 1.0).
    ///
    /// Returns `None` if there have been no pins.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.total_accesses();
        if total == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / total as f64)
        }
    }

    /// Returns the total number of pins (hits + misses).
    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }
}
