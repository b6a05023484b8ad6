//! Hardening verification tests: double-free detection, red-zone stamping
//! and overrun detection, and foreign-pointer rejection. Diagnostics are
//! asserted through a capturing logger; every error is non-fatal and the
//! arena must stay serviceable afterwards.

mod common;

use common::CaptureLogger;
use fencealloc::util::{ALIGNMENT, GUARD_VALUE};
use fencealloc::{Heap, HeapConfig};

fn heap() -> Heap {
    let heap = Heap::with_config(HeapConfig {
        heap_size: 1024 * 1024,
        debug_level: 0,
    });
    heap.initialize();
    heap
}

fn ptr_label(ptr: *mut u8) -> String {
    format!("{:p}", ptr)
}

// ---------------------------------------------------------------------------
// Double free: one diagnostic, state untouched, block still reusable
// ---------------------------------------------------------------------------

#[test]
fn double_free_is_reported_once_and_block_stays_reusable() {
    let logger = CaptureLogger::install();
    let heap = heap();

    let p = heap.alloc(50);
    assert!(!p.is_null());
    heap.free(p);

    let label = ptr_label(p);
    let before = logger.count_containing(&["Double free detected", &label]);
    let frees_before = heap.stats().total_frees;

    heap.free(p);

    assert_eq!(
        logger.count_containing(&["Double free detected", &label]),
        before + 1,
        "expected exactly one double-free diagnostic"
    );
    assert_eq!(
        heap.stats().total_frees,
        frees_before,
        "double free must not count as a free"
    );
    assert!(heap.check_integrity().is_ok());

    let q = heap.alloc(50);
    assert!(!q.is_null(), "arena unusable after double free");
    heap.free(q);
}

// ---------------------------------------------------------------------------
// Red zones: stamped on allocation, checked on free
// ---------------------------------------------------------------------------

#[test]
#[cfg(feature = "memory-guards")]
fn red_zones_are_stamped_around_the_user_region() {
    let heap = heap();
    let size = 64;
    let p = heap.alloc(size);
    unsafe {
        for i in 1..=ALIGNMENT {
            assert_eq!(p.sub(i).read(), GUARD_VALUE, "leading zone byte {}", i);
        }
        for i in 0..ALIGNMENT {
            assert_eq!(p.add(size + i).read(), GUARD_VALUE, "trailing zone byte {}", i);
        }
    }
    heap.free(p);
}

#[test]
#[cfg(feature = "memory-guards")]
fn trailing_overrun_is_reported_and_block_reclaimed() {
    let logger = CaptureLogger::install();
    let heap = heap();

    let size = 100;
    let p = heap.alloc(size);
    unsafe { p.add(size).write(GUARD_VALUE - 1) };

    let label = ptr_label(p);
    let before = logger.count_containing(&["Buffer overrun detected", &label]);

    heap.free(p);

    assert_eq!(
        logger.count_containing(&["Buffer overrun detected", &label]),
        before + 1,
        "expected exactly one overrun diagnostic"
    );
    assert_eq!(
        heap.alloc_size(p),
        0,
        "overrun block must still be reclaimed"
    );
    assert!(heap.check_integrity().is_ok());
}

#[test]
#[cfg(feature = "memory-guards")]
fn leading_underrun_is_reported_on_free() {
    let logger = CaptureLogger::install();
    let heap = heap();

    let p = heap.alloc(64);
    unsafe { p.sub(1).write(GUARD_VALUE ^ 0xFF) };

    let label = ptr_label(p);
    let before = logger.count_containing(&["Buffer overrun detected", &label]);
    heap.free(p);

    assert_eq!(
        logger.count_containing(&["Buffer overrun detected", &label]),
        before + 1
    );
    assert!(heap.check_integrity().is_ok());
}

#[test]
#[cfg(feature = "memory-guards")]
fn clean_free_emits_no_overrun_diagnostic() {
    let logger = CaptureLogger::install();
    let heap = heap();

    let p = heap.alloc(100);
    unsafe { std::ptr::write_bytes(p, 0xEE, 100) };
    let label = ptr_label(p);
    let before = logger.count_containing(&["Buffer overrun detected", &label]);

    heap.free(p);

    assert_eq!(
        logger.count_containing(&["Buffer overrun detected", &label]),
        before,
        "in-bounds writes must not trip the red zones"
    );
}

// ---------------------------------------------------------------------------
// Foreign and corrupt pointers
// ---------------------------------------------------------------------------

#[test]
fn free_of_stack_pointer_is_reported_and_ignored() {
    let logger = CaptureLogger::install();
    let heap = heap();
    let before_stats = heap.stats();

    let mut stack_var = 0u64;
    let bogus = &mut stack_var as *mut u64 as *mut u8;
    let count_before = logger.count_containing(&["outside heap bounds"]);

    heap.free(bogus);

    assert!(logger.count_containing(&["outside heap bounds"]) > count_before);
    let after_stats = heap.stats();
    assert_eq!(before_stats.allocated_blocks, after_stats.allocated_blocks);
    assert_eq!(before_stats.free_bytes, after_stats.free_bytes);
    assert!(heap.check_integrity().is_ok());
}

#[test]
fn alloc_size_of_corrupted_header_is_zero() {
    let logger = CaptureLogger::install();
    let heap = heap();

    let p = heap.alloc(64);
    assert_eq!(heap.alloc_size(p), 64);

    // Smash the header's start sentinel; it sits at the very start of the
    // header, one header (plus the leading red zone) below the user pointer.
    let user_offset = if fencealloc::config::MEMORY_GUARDS {
        ALIGNMENT
    } else {
        0
    };
    unsafe {
        let header = p.sub(user_offset + fencealloc::HEADER_SIZE);
        header.write(0x00);
    }
    assert_eq!(heap.alloc_size(p), 0);

    // Freeing the corrupted block is reported and refused.
    let before = logger.count_containing(&["MEMORY CORRUPTION", "start sentinel corrupted"]);
    heap.free(p);
    assert!(logger.count_containing(&["MEMORY CORRUPTION", "start sentinel corrupted"]) > before);
}
