//! Convenience surface over a process-wide default heap. Library users who
//! want several independent arenas construct [`Heap`] instances directly.

use crate::heap::{Heap, IntegrityReport};
use crate::stats::HeapStats;
use crate::track::AllocationInfo;
use std::sync::OnceLock;

static DEFAULT_HEAP: OnceLock<Heap> = OnceLock::new();

/// The process-wide heap, created on first use from the environment
/// configuration.
pub fn default_heap() -> &'static Heap {
    DEFAULT_HEAP.get_or_init(Heap::new)
}

/// Map the default arena. Idempotent; every allocation entry point calls
/// this implicitly.
pub fn initialize() {
    default_heap().initialize();
}

/// Release the default arena. Outstanding pointers become invalid.
pub fn teardown() {
    default_heap().teardown();
}

/// Allocate zero-filled, `ALIGNMENT`-aligned storage from the default heap.
#[track_caller]
pub fn alloc(size: usize) -> *mut u8 {
    default_heap().alloc(size)
}

/// Return storage to the default heap.
pub fn free(ptr: *mut u8) {
    default_heap().free(ptr);
}

/// Resize an allocation of the default heap.
#[track_caller]
pub fn realloc(ptr: *mut u8, size: usize) -> *mut u8 {
    default_heap().realloc(ptr, size)
}

/// Allocate zeroed storage for `count` elements of `size` bytes.
#[track_caller]
pub fn calloc(count: usize, size: usize) -> *mut u8 {
    default_heap().calloc(count, size)
}

/// User-visible size of a live default-heap allocation.
pub fn alloc_size(ptr: *mut u8) -> usize {
    default_heap().alloc_size(ptr)
}

pub fn stats() -> HeapStats {
    default_heap().stats()
}

pub fn live_allocations() -> Vec<AllocationInfo> {
    default_heap().live_allocations()
}

pub fn check_integrity() -> IntegrityReport {
    default_heap().check_integrity()
}

pub fn leak_report() -> String {
    default_heap().leak_report()
}
