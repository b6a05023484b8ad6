//! Exercises the process-wide default heap through the `api` module. All
//! interaction with the shared instance happens in a single test so that
//! parallel test threads cannot race on the global arena.

use fencealloc::api;
use fencealloc::util::ALIGNMENT;

#[test]
fn default_heap_lifecycle() {
    api::initialize();
    assert!(api::default_heap().is_initialized());

    // Basic alloc/free round trip.
    let p = api::alloc(100);
    assert!(!p.is_null());
    assert_eq!(p as usize % ALIGNMENT, 0);
    assert_eq!(api::alloc_size(p), 100);

    // calloc + realloc through the convenience layer.
    let q = api::calloc(4, 64);
    assert!(!q.is_null());
    assert_eq!(api::alloc_size(q), 256);
    let q = api::realloc(q, 512);
    assert!(!q.is_null());
    assert_eq!(api::alloc_size(q), 512);

    // Tracking and stats see both live allocations.
    if fencealloc::config::LEAK_DETECTION {
        assert_eq!(api::live_allocations().len(), 2);
        assert!(api::leak_report().contains("Total: 2 leaks"));
    }
    if fencealloc::config::ENABLE_STATS {
        let stats = api::stats();
        assert_eq!(stats.allocated_blocks, 2);
        assert!(stats.total_allocations >= 3);
    }

    // The renderers run against the same published state.
    let heap = api::default_heap();
    assert!(heap.heap_map().contains("USED"));
    assert!(heap.memory_chart().contains("Legend"));
    assert!(heap.stats_summary().contains("Size class distribution"));

    assert!(api::check_integrity().is_ok());

    api::free(p);
    api::free(q);
    assert!(api::check_integrity().is_ok());
    if fencealloc::config::LEAK_DETECTION {
        assert!(api::leak_report().contains("No memory leaks detected."));
    }

    api::teardown();
    assert!(!api::default_heap().is_initialized());

    // The heap comes back on demand.
    let r = api::alloc(32);
    assert!(!r.is_null());
    api::free(r);
    api::teardown();
}
