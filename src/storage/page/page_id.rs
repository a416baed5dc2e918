//! Page identifier type.

use serde::{Deserialize, Serialize};

/// Unique identifier for a disk page.
///
/// Equality and hashing are by value. [`PageId::INVALID`] is the sentinel
/// meaning "no page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel identity that never names a real page.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Creates a new page ID.
    #[must_use]
    pub const fn new(page_idx: u32) -> Self {
        Self(page_idx)
    }

    /// Returns the page index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.0
    }

    /// Returns false for the sentinel.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Returns the byte offset of this page within its file.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.0 as u64) * (super::PAGE_SIZE as u64)
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "Page({})", self.0)
        } else {
            write!(f, "Page(INVALID)")
        }
    }
}
