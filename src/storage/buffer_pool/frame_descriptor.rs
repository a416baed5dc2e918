//! Per-frame metadata for the buffer pool.

use crate::storage::page::PageId;

/// Describes the page held by one frame of the buffer pool.
///
/// Each descriptor tracks:
/// - The page currently resident in the frame (or the sentinel)
/// - Whether the frame holds a live page (valid)
/// - Whether the page has been modified since it was read (dirty)
/// - How many callers currently hold the page (pin count)
/// - Whether the page was used since the clock hand last passed (ref bit)
///
/// The setters keep the invariant that an invalid frame is neither pinned
/// nor dirty.
#[derive(Debug, Clone)]
pub struct FrameDescriptor {
    slot_index: usize,
    resident_page: PageId,
    valid: bool,
    dirty: bool,
    pin_count: u32,
    ref_bit: bool,
}

impl FrameDescriptor {
    /// Creates an empty descriptor for the frame at `slot_index`.
    #[must_use]
    pub fn new(slot_index: usize) -> Self {
        Self {
            slot_index,
            resident_page: PageId::INVALID,
            valid: false,
            dirty: false,
            pin_count: 0,
            ref_bit: false,
        }
    }

    /// Installs `page_id` in this frame: valid, clean, unpinned, referenced.
    ///
    /// First occupancy and reuse of an evicted frame look the same here.
    pub(crate) fn assign(&mut self, page_id: PageId) {
        self.resident_page = page_id;
        self.valid = true;
        self.dirty = false;
        self.pin_count = 0;
        self.ref_bit = true;
    }

    /// Increments the pin count.
    pub(crate) fn pin(&mut self) {
        self.pin_count += 1;
    }

    /// Decrements the pin count. The frame must be pinned.
    pub(crate) fn unpin(&mut self) {
        debug_assert!(self.pin_count > 0, "unpin of unpinned frame");
        self.pin_count -= 1;
    }

    pub(crate) fn mark_dirty(&mut self, dirty: bool) {
        self.dirty = dirty && self.valid;
    }

    pub(crate) fn mark_ref(&mut self, referenced: bool) {
        self.ref_bit = referenced;
    }

    /// Drops the resident page. The frame must not be pinned.
    pub(crate) fn invalidate(&mut self) {
        debug_assert_eq!(self.pin_count, 0, "invalidate of pinned frame");
        self.valid = false;
        self.dirty = false;
    }

    /// Position of this frame in the pool.
    #[must_use]
    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    /// Last page installed in this frame, or the sentinel if none ever was.
    ///
    /// Only meaningful while [`is_valid`](Self::is_valid) holds.
    #[must_use]
    pub fn resident_page(&self) -> PageId {
        self.resident_page
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[must_use]
    pub fn ref_bit(&self) -> bool {
        self.ref_bit
    }

    /// Returns whether the replacer may hand this frame out.
    #[must_use]
    pub fn is_evictable(&self) -> bool {
        self.pin_count == 0
    }
}
