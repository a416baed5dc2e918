//! Clock (second-chance) victim selection for the buffer pool.
//!
//! The hand sweeps the frame table circularly. Empty frames are taken
//! immediately; an unpinned frame with its ref bit set has the bit cleared
//! and is passed over once; an unpinned frame with the bit clear is the
//! victim. Pinned frames are skipped untouched. Two full revolutions are
//! enough to reach every unpinned frame with its bit cleared, so a sweep
//! that finds nothing in that many steps means every frame is pinned.

use log::trace;

use super::FrameDescriptor;

/// Second-chance replacer over a frame table.
///
/// The only state is the position of the clock hand, which persists
/// across calls.
#[derive(Debug)]
pub(crate) struct ClockReplacer {
    /// Slot inspected by the previous call; `None` before the first call.
    hand: Option<usize>,
}

impl ClockReplacer {
    pub(crate) fn new() -> Self {
        Self { hand: None }
    }

    /// Picks the slot of a frame that may be reused.
    ///
    /// Returns `None` if every frame is pinned. Ref bits of unpinned frames
    /// passed over on the way are cleared.
    pub(crate) fn pick_victim(&mut self, frames: &mut [FrameDescriptor]) -> Option<usize> {
        let frame_count = frames.len();
        if frame_count == 0 {
            return None;
        }

        let mut hand = self.hand.map_or(0, |h| (h + 1) % frame_count);
        for _ in 0..2 * frame_count {
            let frame = &mut frames[hand];
            if !frame.is_valid() {
                self.hand = Some(hand);
                trace!("Clock picked empty slot {hand}");
                return Some(hand);
            }
            if frame.is_evictable() {
                if frame.ref_bit() {
                    frame.mark_ref(false);
                } else {
                    self.hand = Some(hand);
                    trace!("Clock picked slot {hand} holding {}", frame.resident_page());
                    return Some(hand);
                }
            }
            hand = (hand + 1) % frame_count;
        }

        self.hand = Some(hand);
        None
    }
}
