extern crate segmalloc;

use segmalloc::{BestFit, MemArena, SegConfig, SegMalloc, ALIGNMENT, CHUNK_SIZE};
use std::ptr;

const SENTINELS: usize = 16;

unsafe fn fill(ptr: *mut u8, size: usize, byte: u8) {
    ptr::write_bytes(ptr, byte, size);
}

unsafe fn all_equal(ptr: *mut u8, size: usize, byte: u8) -> bool {
    (0..size).all(|i| *ptr.add(i) == byte)
}

#[test]
fn malloc_is_aligned_with_enough_capacity() {
    let mut a = SegMalloc::new();
    unsafe {
        for size in (1..300).chain([1000, 4095, 4096, 4097, 20_000].iter().copied()) {
            let ptr = a.malloc(size);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % ALIGNMENT, 0);
            assert!(a.usable_size(ptr) >= size);
            fill(ptr, size, 0x5a);
        }
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn zero_size_and_null_are_not_errors() {
    let mut a = SegMalloc::new();
    unsafe {
        assert!(a.malloc(0).is_null());
        a.free(ptr::null_mut());
        assert_eq!(a.usable_size(ptr::null_mut()), 0);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn lifo_reuse_of_freed_block() {
    let mut a = SegMalloc::new();
    unsafe {
        let p = a.malloc(16);
        let q = a.malloc(16);
        a.free(p);
        let r = a.malloc(16);
        assert_eq!(r, p);
        assert_ne!(r, q);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn freeing_neighbours_leaves_one_block() {
    let mut a = SegMalloc::new();
    unsafe {
        let p = a.malloc(100);
        let q = a.malloc(100);
        let r = a.malloc(100);
        assert_eq!(q as usize - p as usize, 128);
        assert_eq!(r as usize - q as usize, 128);

        a.free(q);
        a.free(r);
        assert!(a.check_heap(line!()));

        // q and r (and the free rest of the heap after r) are one block now,
        // so a request needing both of them lands at q.
        let both = a.malloc(2 * 128 - 16);
        assert_eq!(both, q);
        a.free(both);
        a.free(p);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn freeing_neighbours_between_guards_fits_exactly() {
    let mut a = SegMalloc::new();
    unsafe {
        let _p = a.malloc(100);
        let q = a.malloc(100);
        let r = a.malloc(100);
        let _s = a.malloc(100);

        a.free(r);
        a.free(q);
        assert!(a.check_heap(line!()));
        assert_eq!(a.malloc(2 * 128 - 16), q);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn heap_grows_by_whole_chunks() {
    let mut a = SegMalloc::new();
    unsafe {
        let first = a.malloc(32);
        assert!(!first.is_null());
        let initial = a.heap_size();
        assert_eq!(initial, SENTINELS + CHUNK_SIZE);

        let mut count = 1;
        while a.heap_size() == initial {
            let ptr = a.malloc(32);
            assert!(!ptr.is_null());
            fill(ptr, 32, 0x11);
            count += 1;
            assert!(count < 1000);
        }
        assert_eq!(a.heap_size(), SENTINELS + 2 * CHUNK_SIZE);
        // 48 byte blocks: 84 fit with a split, the 85th takes the 64 byte rest.
        assert_eq!(count, 86);
        assert!(a.check_heap(line!()));

        for _ in 0..200 {
            a.malloc(32);
            assert_eq!((a.heap_size() - SENTINELS) % CHUNK_SIZE, 0);
        }
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn large_request_extends_by_its_own_size() {
    let mut a = SegMalloc::new();
    unsafe {
        a.malloc(16);
        let before = a.heap_size();
        let ptr = a.malloc(3 * CHUNK_SIZE);
        assert!(!ptr.is_null());
        fill(ptr, 3 * CHUNK_SIZE, 0x22);
        // The free tail of the first chunk is merged into the new region.
        assert_eq!(a.heap_size(), before + 3 * CHUNK_SIZE + 16);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn calloc_zeroes_reused_memory() {
    let mut a = SegMalloc::new();
    unsafe {
        let ptr = a.malloc(400);
        fill(ptr, 400, 0xff);
        a.free(ptr);

        let zeroed = a.calloc(10, 40);
        assert_eq!(zeroed, ptr);
        assert!(all_equal(zeroed, 400, 0));
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn calloc_overflow_allocates_nothing() {
    let mut a = SegMalloc::new();
    unsafe {
        assert!(a.init());
        let before = a.heap_size();
        assert!(a.calloc(usize::MAX, 2).is_null());
        assert!(a.calloc(2, usize::MAX / 2 + 1).is_null());
        assert!(a.calloc(0, 8).is_null());
        assert_eq!(a.heap_size(), before);

        // Nothing was taken out of the free lists either.
        let ptr = a.malloc(CHUNK_SIZE - 16);
        assert!(!ptr.is_null());
        assert_eq!(a.heap_size(), before);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn realloc_preserves_contents() {
    let mut a = SegMalloc::new();
    unsafe {
        let ptr = a.malloc(200);
        for i in 0..200 {
            *ptr.add(i) = i as u8;
        }

        let grown = a.realloc(ptr, 1000);
        assert!(!grown.is_null());
        assert_ne!(grown, ptr);
        for i in 0..200 {
            assert_eq!(*grown.add(i), i as u8);
        }

        let shrunk = a.realloc(grown, 50);
        assert!(!shrunk.is_null());
        for i in 0..50 {
            assert_eq!(*shrunk.add(i), i as u8);
        }
        a.free(shrunk);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn realloc_edge_cases() {
    let mut a = SegMalloc::new();
    unsafe {
        let ptr = a.realloc(ptr::null_mut(), 64);
        assert!(!ptr.is_null());
        assert!(a.usable_size(ptr) >= 64);

        assert!(a.realloc(ptr, 0).is_null());
        // The block went back to the free lists.
        assert_eq!(a.malloc(64), ptr);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn failed_realloc_keeps_original() {
    let mut a = SegMalloc::with_source(MemArena::with_capacity(2 * CHUNK_SIZE));
    unsafe {
        let ptr = a.malloc(1000);
        fill(ptr, 1000, 0x77);

        assert!(a.realloc(ptr, 100_000).is_null());
        assert!(all_equal(ptr, 1000, 0x77));
        assert!(a.check_heap(line!()));

        a.free(ptr);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn exhausted_source_fails_cleanly() {
    let mut a = SegMalloc::with_source(MemArena::with_capacity(2 * CHUNK_SIZE));
    unsafe {
        assert!(!a.malloc(100).is_null());
        assert!(a.malloc(3 * CHUNK_SIZE).is_null());
        assert!(a.check_heap(line!()));
        // Smaller requests are still served.
        assert!(!a.malloc(CHUNK_SIZE / 2).is_null());
        assert!(a.malloc(usize::MAX - 4).is_null());
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn init_reports_failure() {
    let mut a = SegMalloc::with_source(MemArena::with_capacity(100));
    unsafe {
        assert!(!a.init());
        assert!(a.malloc(1).is_null());
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn init_resets_heap() {
    let mut a = SegMalloc::new();
    unsafe {
        let first = a.malloc(24);
        for _ in 0..100 {
            a.malloc(500);
        }
        assert!(a.heap_size() > SENTINELS + CHUNK_SIZE);

        assert!(a.init());
        assert_eq!(a.heap_size(), SENTINELS + CHUNK_SIZE);
        assert_eq!(a.malloc(24), first);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn instances_are_independent() {
    let mut a = SegMalloc::new();
    let mut b = SegMalloc::new();
    unsafe {
        let p = a.malloc(64);
        let q = b.malloc(64);
        fill(p, 64, 1);
        fill(q, 64, 2);
        let a_range = p as usize..p as usize + a.heap_size();
        assert!(!a_range.contains(&(q as usize)));
        a.free(p);
        assert!(all_equal(q, 64, 2));
        assert_eq!(a.heap_size(), b.heap_size());
    }
    assert!(a.check_heap(line!()));
    assert!(b.check_heap(line!()));
}

#[test]
fn invalid_config_falls_back_to_defaults() {
    let config = SegConfig {
        chunk_size: 1000,
        tier_bounds: [64, 48],
    };
    let a = SegMalloc::with_config(MemArena::new(), BestFit, config);
    assert_eq!(*a.config(), SegConfig::DEFAULT);
}

/// Builds 21 free 64 byte blocks in front of one free 256 byte block in the
/// large tier, and returns the 256 byte block.
unsafe fn bury_large_block<F: segmalloc::FitPolicy>(a: &mut SegMalloc<MemArena, F>) -> *mut u8 {
    let big = a.malloc(240);
    a.malloc(16);
    let mut small = Vec::new();
    for _ in 0..21 {
        small.push(a.malloc(48));
        a.malloc(16);
    }
    a.free(big);
    for ptr in small {
        a.free(ptr);
    }
    assert!(a.check_heap(line!()));
    big
}

#[test]
fn nth_fit_misses_blocks_outside_window() {
    let mut a = SegMalloc::new();
    unsafe {
        let big = bury_large_block(&mut a);
        let before = a.heap_size();
        let ptr = a.malloc(200);
        assert!(!ptr.is_null());
        assert_ne!(ptr, big);
        assert!(a.heap_size() > before);
    }
    assert!(a.check_heap(line!()));
}

#[test]
fn best_fit_finds_blocks_outside_window() {
    let mut a = SegMalloc::with_config(MemArena::new(), BestFit, SegConfig::DEFAULT);
    unsafe {
        let big = bury_large_block(&mut a);
        let before = a.heap_size();
        assert_eq!(a.malloc(200), big);
        assert_eq!(a.heap_size(), before);
    }
    assert!(a.check_heap(line!()));
}
