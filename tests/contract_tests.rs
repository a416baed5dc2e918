//! Contract tests: properties every buffer pool state must satisfy.

use clockpool::storage::{BufferPoolManager, DirtyFlag, DiskManager, FillMode, MemoryDiskManager, PageId};

fn create_pool(frames: usize) -> BufferPoolManager<MemoryDiskManager> {
    BufferPoolManager::new(frames, MemoryDiskManager::new()).expect("create pool")
}

/// Checks the frame table against the directory-facing queries.
fn assert_frame_table_consistent(pool: &BufferPoolManager<MemoryDiskManager>) {
    let valid = pool.frames().iter().filter(|f| f.is_valid()).count();
    assert_eq!(valid, pool.resident_count());

    for frame in pool.frames() {
        if frame.is_valid() {
            assert!(pool.is_resident(frame.resident_page()));
            assert_eq!(pool.pin_count(frame.resident_page()), Some(frame.pin_count()));
        } else {
            assert_eq!(frame.pin_count(), 0);
            assert!(!frame.is_dirty());
        }
    }
}

// =============================================================================
// Pin Accounting
// =============================================================================

mod pin_accounting {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: pin count equals pins minus unpins and never goes negative.
        #[test]
        fn test_pin_count_tracks_pins_and_unpins(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut pool = create_pool(2);
            let page_id = PageId::new(7);
            let mut expected = 0u32;

            for pin in ops {
                if pin {
                    pool.pin(page_id, FillMode::DiskRead).expect("pin");
                    expected += 1;
                } else if expected == 0 {
                    // Either not resident yet or already at zero pins
                    let err = pool.unpin(page_id, DirtyFlag::Clean).unwrap_err();
                    prop_assert!(err.is_usage_violation());
                } else {
                    pool.unpin(page_id, DirtyFlag::Clean).expect("unpin");
                    expected -= 1;
                }

                if pool.is_resident(page_id) {
                    prop_assert_eq!(pool.pin_count(page_id), Some(expected));
                }
            }

            // Only the first pin touched the disk
            let reads = pool.disk().stats().reads;
            prop_assert!(reads <= 1);
        }
    }
}

// =============================================================================
// Capacity and Eviction
// =============================================================================

mod capacity {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pin_beyond_capacity_fails() {
        for frames in 1..12 {
            let mut pool = create_pool(frames);
            for i in 0..frames {
                pool.pin(PageId::new(i as u32), FillMode::DiskRead)
                    .expect("pin within capacity");
            }

            let before: Vec<PageId> = pool.frames().iter().map(|f| f.resident_page()).collect();
            let err = pool
                .pin(PageId::new(frames as u32), FillMode::DiskRead)
                .unwrap_err();
            assert!(err.is_pool_exhausted());

            let after: Vec<PageId> = pool.frames().iter().map(|f| f.resident_page()).collect();
            assert_eq!(before, after);
            assert_eq!(pool.disk().stats().reads, frames as u64);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: with every frame but one pinned, that frame is always the victim.
        #[test]
        fn test_single_unpinned_frame_is_victim(frames in 1usize..16, free_slot_seed in any::<usize>(), rounds in 1usize..6) {
            let free_slot = free_slot_seed % frames;
            let mut pool = create_pool(frames);
            for i in 0..frames {
                pool.pin(PageId::new(i as u32), FillMode::NoOp).expect("pin");
            }
            let mut in_free_slot = PageId::new(free_slot as u32);
            pool.unpin(in_free_slot, DirtyFlag::Clean).expect("unpin");

            for round in 0..rounds {
                let incoming = PageId::new((frames + round) as u32);
                pool.pin(incoming, FillMode::NoOp).expect("pin replaces free slot");
                prop_assert_eq!(pool.frame(free_slot).map(|f| f.resident_page()), Some(incoming));
                prop_assert!(!pool.is_resident(in_free_slot));
                pool.unpin(incoming, DirtyFlag::Clean).expect("unpin");
                in_free_slot = incoming;
            }

            for (slot, frame) in pool.frames().iter().enumerate() {
                if slot != free_slot {
                    prop_assert_eq!(frame.pin_count(), 1);
                }
            }
        }
    }
}

// =============================================================================
// Random Operation Sequences
// =============================================================================

mod random_sequences {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{HashMap, HashSet};

    const FRAMES: usize = 4;
    const PAGES: u32 = 12;

    #[derive(Debug, Clone)]
    enum Op {
        Pin(u32),
        Unpin { page: u32, dirty: bool, value: u8 },
        Free(u32),
        Flush(u32),
        FlushAll,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..PAGES).prop_map(Op::Pin),
            4 => (0..PAGES, any::<bool>(), any::<u8>())
                .prop_map(|(page, dirty, value)| Op::Unpin { page, dirty, value }),
            1 => (0..PAGES).prop_map(Op::Free),
            1 => (0..PAGES).prop_map(Op::Flush),
            1 => Just(Op::FlushAll),
        ]
    }

    /// Expected pins and first-byte contents per page.
    #[derive(Default)]
    struct Model {
        pins: HashMap<u32, u32>,
        content: HashMap<u32, u8>,
        freed: HashSet<u32>,
    }

    impl Model {
        fn pins(&self, page: u32) -> u32 {
            self.pins.get(&page).copied().unwrap_or(0)
        }

        fn pinned_pages(&self) -> usize {
            self.pins.values().filter(|&&n| n > 0).count()
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: pinned pages are never evicted, dirty pages survive
        /// eviction, and the frame table stays consistent.
        #[test]
        fn test_random_operations_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..80)) {
            let mut pool = create_pool(FRAMES);
            pool.disk_mut().allocate(PAGES).expect("preallocate");
            let mut model = Model::default();

            for op in ops {
                match op {
                    Op::Pin(page) => {
                        let page_id = PageId::new(page);
                        match pool.pin(page_id, FillMode::DiskRead) {
                            Ok(data) => {
                                let expected = model.content.get(&page).copied().unwrap_or(0);
                                prop_assert_eq!(data.data()[0], expected);
                                *model.pins.entry(page).or_default() += 1;
                            }
                            Err(err) => {
                                prop_assert!(err.is_pool_exhausted());
                                prop_assert_eq!(model.pinned_pages(), FRAMES);
                                prop_assert_eq!(model.pins(page), 0);
                            }
                        }
                    }
                    Op::Unpin { page, dirty, value } => {
                        let page_id = PageId::new(page);
                        if model.pins(page) > 0 {
                            if dirty {
                                pool.page_mut(page_id).expect("pinned page").data_mut()[0] = value;
                                model.content.insert(page, value);
                            }
                            pool.unpin(page_id, DirtyFlag::from(dirty)).expect("unpin");
                            *model.pins.entry(page).or_default() -= 1;
                        } else {
                            let err = pool.unpin(page_id, DirtyFlag::from(dirty)).unwrap_err();
                            prop_assert!(err.is_usage_violation());
                        }
                    }
                    Op::Free(page) => {
                        if model.freed.contains(&page) {
                            continue;
                        }
                        let result = pool.free(PageId::new(page));
                        if model.pins(page) > 0 {
                            prop_assert!(result.unwrap_err().is_usage_violation());
                            prop_assert!(pool.is_resident(PageId::new(page)));
                        } else {
                            prop_assert!(result.is_ok());
                            prop_assert!(!pool.is_resident(PageId::new(page)));
                            model.freed.insert(page);
                            model.content.remove(&page);
                        }
                    }
                    Op::Flush(page) => {
                        let page_id = PageId::new(page);
                        let resident = pool.is_resident(page_id);
                        let result = pool.flush(page_id);
                        prop_assert_eq!(result.is_ok(), resident);
                    }
                    Op::FlushAll => {
                        pool.flush_all().expect("flush all");
                    }
                }

                for (&page, &pins) in &model.pins {
                    if pins > 0 {
                        prop_assert_eq!(pool.pin_count(PageId::new(page)), Some(pins));
                    }
                }
                assert_frame_table_consistent(&pool);
            }
        }
    }
}

// =============================================================================
// Flush Contract
// =============================================================================

mod flush_contract {
    use super::*;

    /// Contract: after flush_all, every resident page reads back from disk
    /// exactly as it is in memory, and no frame state changes.
    #[test]
    fn test_flush_all_then_disk_matches_memory() {
        let mut pool = create_pool(6);
        for i in 0..10u8 {
            let (page_id, page) = pool.allocate_and_pin(1).expect("allocate page");
            page.data_mut().fill(i);
            pool.unpin(page_id, DirtyFlag::from(i % 3 != 0)).expect("unpin");
        }
        let before: Vec<(PageId, bool, u32)> = pool
            .frames()
            .iter()
            .map(|f| (f.resident_page(), f.is_dirty(), f.pin_count()))
            .collect();

        pool.flush_all().expect("flush all");

        let after: Vec<(PageId, bool, u32)> = pool
            .frames()
            .iter()
            .map(|f| (f.resident_page(), f.is_dirty(), f.pin_count()))
            .collect();
        assert_eq!(before, after);

        let resident: Vec<PageId> = pool
            .frames()
            .iter()
            .filter(|f| f.is_valid())
            .map(|f| f.resident_page())
            .collect();
        for page_id in resident {
            let in_memory = pool.pin(page_id, FillMode::DiskRead).expect("pin").clone();
            pool.unpin(page_id, DirtyFlag::Clean).expect("unpin");
            assert_eq!(pool.disk().contents(page_id), Some(&in_memory));
        }
    }

    /// Contract: a page freed while unpinned is a miss on the next pin, and
    /// deallocation reaches the disk manager exactly once.
    #[test]
    fn test_free_makes_next_pin_a_miss() {
        let mut pool = create_pool(4);
        let (page_id, _) = pool.allocate_and_pin(1).expect("allocate page");
        pool.unpin(page_id, DirtyFlag::Clean).expect("unpin");

        pool.free(page_id).expect("free");
        assert_eq!(pool.disk().stats().deallocations, 1);

        pool.reset_stats();
        pool.pin(page_id, FillMode::DiskRead).expect("pin");
        let stats = pool.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(pool.disk().stats().deallocations, 1);
    }
}
