use crate::block::{
    self, block_span, BlockHeader, FOOTER_SIZE, HEADER_SIZE, LIVE_TAG, MIN_BLOCK_SIZE,
};
use crate::config::{
    HeapConfig, BOUNDARY_TAGS, ENABLE_STATS, GUARD_PADDING, LEAK_DETECTION, MEMORY_GUARDS,
};
use crate::free_list::Registry;
use crate::guard;
use crate::platform::{self, ArenaMapping};
use crate::size_class::{class_of, NUM_SIZE_CLASSES};
use crate::stats::{HeapStats, UsageSummary};
use crate::sync::Mutex;
use crate::track::{AllocationInfo, RecordList};
use crate::util::{align_up, ALIGNMENT, FOOTER_SENTINEL, SENTINEL_VALUE};
use core::panic::Location;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// One tile of the arena, as reported by [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Byte offset of the block header from the arena base.
    pub offset: usize,
    pub payload_size: usize,
    pub free: bool,
    pub alloc_id: u64,
}

/// Result of a full-arena integrity scan.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub blocks_walked: usize,
    pub errors_found: usize,
    pub sentinel_failures: usize,
    pub footer_mismatches: usize,
    pub tiling_breaks: usize,
    pub adjacent_free_pairs: usize,
    pub registry_errors: usize,
    pub stats_mismatches: usize,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.errors_found == 0
    }
}

/// Everything the engine mutates, guarded by the heap mutex.
struct HeapState {
    base: *mut u8,
    arena_size: usize,
    mapped_size: usize,
    registry: Registry,
    next_alloc_id: u64,
    records: RecordList,
    stats: HeapStats,
}

// All raw pointers in HeapState target the arena mapping owned by the
// enclosing Heap; moving the state between threads is sound because access
// is serialized by the heap mutex.
unsafe impl Send for HeapState {}

/// A fixed-size arena allocator: segregated free lists, best-fit search,
/// boundary-tag coalescing, red-zone guards and leak tracking, all behind
/// one mutex.
pub struct Heap {
    initialized: AtomicBool,
    /// Mirror of the arena base for lock-free readers (`alloc_size`).
    base: AtomicPtr<u8>,
    state: Mutex<HeapState>,
    cfg: HeapConfig,
}

unsafe impl Send for Heap {}
unsafe impl Sync for Heap {}

impl Heap {
    /// Heap configured from the environment (`FENCEALLOC_*` variables).
    pub fn new() -> Self {
        Self::with_config(HeapConfig::from_env())
    }

    pub fn with_config(cfg: HeapConfig) -> Self {
        Heap {
            initialized: AtomicBool::new(false),
            base: AtomicPtr::new(ptr::null_mut()),
            state: Mutex::new(HeapState {
                base: ptr::null_mut(),
                arena_size: 0,
                mapped_size: 0,
                registry: Registry::new(),
                next_alloc_id: 1,
                records: RecordList::new(),
                stats: HeapStats::default(),
            }),
            cfg: cfg.sanitized(),
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.cfg
    }

    pub fn arena_size(&self) -> usize {
        self.cfg.heap_size
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Map the arena and seed it with one spanning free block. Idempotent;
    /// calling it on an initialized heap is a no-op.
    pub fn initialize(&self) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        let mut st = self.state.lock();
        if self.initialized.load(Ordering::Relaxed) {
            return;
        }

        let arena_size = self.cfg.heap_size;
        // The reservation comes back zero-filled.
        let mapping = match platform::reserve_arena(arena_size) {
            Some(mapping) => mapping,
            None => {
                log::error!("Failed to initialize heap of size {}", arena_size);
                return;
            }
        };
        let base = mapping.base;

        st.base = base;
        st.arena_size = arena_size;
        st.mapped_size = mapping.len;
        st.registry.clear();
        st.stats = HeapStats::default();

        let payload = arena_size - HEADER_SIZE - FOOTER_SIZE;
        unsafe {
            let first = block::init_free_block(base, payload);
            st.registry.insert_free(first);
        }

        if ENABLE_STATS {
            st.stats.free_bytes = payload;
            st.stats.free_blocks = 1;
            st.stats.overhead_bytes = HEADER_SIZE + FOOTER_SIZE;
            st.stats.fragmentation_count = 1;
            st.stats.largest_free_block = payload;
            st.stats.smallest_free_block = payload;
        }

        self.base.store(base, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
        if self.cfg.debug_level > 0 {
            log::info!("Memory allocator initialized with {} bytes at {:p}", arena_size, base);
        }
    }

    /// Release the arena and all tracking records. After teardown every
    /// outstanding pointer is invalid; `initialize` may be called again.
    pub fn teardown(&self) {
        let mut st = self.state.lock();
        if !self.initialized.load(Ordering::Relaxed) {
            return;
        }
        st.records.clear();
        st.registry.clear();
        self.initialized.store(false, Ordering::Release);
        self.base.store(ptr::null_mut(), Ordering::Release);
        let mapping = ArenaMapping {
            base: st.base,
            len: st.mapped_size,
        };
        st.base = ptr::null_mut();
        st.arena_size = 0;
        st.mapped_size = 0;
        unsafe { platform::release_arena(mapping) };
        if self.cfg.debug_level > 0 {
            log::info!("Memory allocator cleaned up");
        }
    }

    /// Allocate `size` bytes. The returned pointer is `ALIGNMENT`-aligned
    /// and the user region is zero-filled. Returns null when `size` is zero
    /// or no free block can satisfy the request.
    #[track_caller]
    pub fn alloc(&self, size: usize) -> *mut u8 {
        self.alloc_at(size, Location::caller())
    }

    fn alloc_at(&self, size: usize, loc: &'static Location<'static>) -> *mut u8 {
        if !self.initialized.load(Ordering::Acquire) {
            self.initialize();
        }
        if size == 0 {
            return ptr::null_mut();
        }

        let mut st = self.state.lock();
        if st.base.is_null() {
            return ptr::null_mut();
        }
        let start = Instant::now();

        if ENABLE_STATS {
            st.stats.total_allocations += 1;
            st.stats.requested_bytes += size;
        }

        let aligned = align_up(size + GUARD_PADDING, ALIGNMENT);
        if self.cfg.debug_level >= 2 {
            unsafe { st.debug_walk() };
        }

        unsafe {
            let found = st.find_best_fit(aligned);
            if found.is_null() {
                if ENABLE_STATS {
                    st.stats.failed_allocations += 1;
                }
                return ptr::null_mut();
            }

            // Unlink while the payload still matches the class the block
            // was filed under; split would change it.
            let class = class_of((*found).payload_size);
            st.registry.remove_free(found, class);

            if (*found).payload_size >= aligned + MIN_BLOCK_SIZE {
                st.split_block(found, aligned);
            }

            (*found).free = false;
            (*found).request_size = size;
            (*found).address_tag = LIVE_TAG;
            (*found).alloc_id = st.next_alloc_id;
            st.next_alloc_id += 1;
            st.registry.push_used(found);
            block::write_footer(found);

            let payload = (*found).payload_size;
            if ENABLE_STATS {
                st.stats.free_bytes -= payload;
                st.stats.free_blocks -= 1;
                st.stats.allocated_bytes += payload;
                st.stats.allocated_blocks += 1;
                st.stats.overhead_bytes += payload - size;
                st.stats.class_usage[class_of(payload)] += payload;
            }

            let user = block::user_ptr(found);
            guard::write_red_zones(user, size);
            ptr::write_bytes(user, 0, size);

            if LEAK_DETECTION {
                st.records.push(AllocationInfo {
                    ptr: user as usize,
                    size,
                    alloc_id: (*found).alloc_id,
                    file: loc.file(),
                    line: loc.line(),
                });
            }

            if ENABLE_STATS {
                st.stats.total_alloc_time += start.elapsed();
                st.update_fragmentation();
            }
            user
        }
    }

    /// Return a block to the free lists and merge it with free neighbors.
    /// Null pointers are ignored; double frees and red-zone corruption are
    /// reported through the diagnostic channel.
    pub fn free(&self, ptr: *mut u8) {
        if !self.initialized.load(Ordering::Acquire) {
            self.initialize();
        }
        if ptr.is_null() {
            return;
        }

        let mut st = self.state.lock();
        if st.base.is_null() {
            return;
        }
        let start = Instant::now();
        if self.cfg.debug_level >= 2 {
            unsafe { st.debug_walk() };
        }

        unsafe {
            let block = block::block_from_user_ptr(ptr);
            if !st.validate_block(block, "free") {
                return;
            }
            if (*block).free {
                log::error!("Double free detected at {:p} (ID {})", ptr, (*block).alloc_id);
                return;
            }
            if MEMORY_GUARDS && !guard::red_zones_intact(ptr, (*block).request_size) {
                // Report the overrun; the block is reclaimed regardless.
                log::error!("Buffer overrun detected at {:p} (ID {})", ptr, (*block).alloc_id);
            }

            let payload = (*block).payload_size;
            if ENABLE_STATS {
                st.stats.allocated_bytes -= payload;
                st.stats.allocated_blocks -= 1;
                st.stats.free_bytes += payload;
                st.stats.free_blocks += 1;
                st.stats.total_frees += 1;
                st.stats.class_usage[class_of(payload)] -= payload;
                st.stats.overhead_bytes -= payload - (*block).request_size;
            }

            (*block).free = true;
            (*block).address_tag = 0;
            st.registry.remove_used(block);
            st.registry.insert_free(block);
            block::write_footer(block);

            st.coalesce(block);

            if LEAK_DETECTION {
                st.records.remove(ptr as usize);
            }
            if ENABLE_STATS {
                st.stats.total_free_time += start.elapsed();
                st.update_fragmentation();
            }
        }
    }

    /// Resize an allocation. Shrinks happen in place (splitting off the
    /// tail when it pays for a block); growth allocates, copies and frees.
    /// On failure the original allocation is left intact and null is
    /// returned.
    #[track_caller]
    pub fn realloc(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.realloc_at(ptr, size, Location::caller())
    }

    fn realloc_at(
        &self,
        ptr: *mut u8,
        size: usize,
        loc: &'static Location<'static>,
    ) -> *mut u8 {
        if ptr.is_null() {
            return self.alloc_at(size, loc);
        }
        if size == 0 {
            self.free(ptr);
            return ptr::null_mut();
        }
        if !self.initialized.load(Ordering::Acquire) {
            return ptr::null_mut();
        }

        let current_size;
        {
            let mut st = self.state.lock();
            if st.base.is_null() {
                return ptr::null_mut();
            }
            unsafe {
                let block = block::block_from_user_ptr(ptr);
                if !st.validate_block(block, "realloc") || (*block).free {
                    return ptr::null_mut();
                }
                current_size = (*block).request_size;

                let required = align_up(size + GUARD_PADDING, ALIGNMENT);
                if required <= (*block).payload_size {
                    let original = (*block).payload_size;
                    if ENABLE_STATS {
                        st.stats.allocated_bytes -= original;
                        st.stats.class_usage[class_of(original)] -= original;
                        st.stats.overhead_bytes -= original - current_size;
                    }

                    if original >= required + MIN_BLOCK_SIZE {
                        let tail = st.split_block(block, required);
                        if !tail.is_null() {
                            // The tail may now sit against a free block that
                            // used to follow this allocation.
                            st.coalesce(tail);
                        }
                    }

                    let payload = (*block).payload_size;
                    (*block).request_size = size;
                    if ENABLE_STATS {
                        st.stats.allocated_bytes += payload;
                        st.stats.class_usage[class_of(payload)] += payload;
                        st.stats.overhead_bytes += payload - size;
                    }

                    guard::write_red_zones(ptr, size);
                    if ENABLE_STATS {
                        st.update_fragmentation();
                    }
                    return ptr;
                }
            }
        }

        // Grow path: the mutex is not recursive, so allocate and free run
        // as their own atomic steps.
        let new_ptr = self.alloc_at(size, loc);
        if new_ptr.is_null() {
            return ptr::null_mut();
        }
        unsafe {
            ptr::copy_nonoverlapping(ptr, new_ptr, current_size.min(size));
        }
        self.free(ptr);
        new_ptr
    }

    /// Allocate zeroed storage for `count` elements of `size` bytes.
    /// Returns null when the multiplication overflows.
    #[track_caller]
    pub fn calloc(&self, count: usize, size: usize) -> *mut u8 {
        if count > 0 && size > usize::MAX / count {
            return ptr::null_mut();
        }
        self.alloc_at(count * size, Location::caller())
    }

    /// User-visible size of a live allocation, or 0 for null, freed,
    /// foreign or corrupted pointers. Reads stable header fields of a
    /// presumed-live block and therefore does not take the mutex.
    pub fn alloc_size(&self, ptr: *mut u8) -> usize {
        if ptr.is_null() || !self.initialized.load(Ordering::Acquire) {
            return 0;
        }
        let base = self.base.load(Ordering::Acquire);
        if base.is_null() {
            return 0;
        }
        unsafe {
            let block = block::block_from_user_ptr(ptr);
            let addr = block as usize;
            if addr < base as usize || addr + HEADER_SIZE > base as usize + self.cfg.heap_size {
                return 0;
            }
            if (*block).start_sentinel != SENTINEL_VALUE
                || (*block).end_sentinel != SENTINEL_VALUE
                || (*block).free
            {
                return 0;
            }
            (*block).request_size
        }
    }

    /// Snapshot of the statistics counters.
    pub fn stats(&self) -> HeapStats {
        self.state.lock().stats.clone()
    }

    /// Percentage view of the current arena usage.
    pub fn usage_percentages(&self) -> UsageSummary {
        UsageSummary::from_stats(&self.stats())
    }

    /// Physical traversal of the arena, low to high address. Stops early if
    /// a corrupt header makes further walking unsafe.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        let st = self.state.lock();
        let mut out = Vec::new();
        if st.base.is_null() {
            return out;
        }
        unsafe {
            let base = st.base;
            let end = base as usize + st.arena_size;
            let mut cur = base;
            while (cur as usize) + HEADER_SIZE <= end {
                let block = cur as *mut BlockHeader;
                if (*block).start_sentinel != SENTINEL_VALUE
                    || (*block).end_sentinel != SENTINEL_VALUE
                {
                    break;
                }
                let span = block_span((*block).payload_size);
                if (cur as usize) + span > end {
                    break;
                }
                out.push(BlockInfo {
                    offset: cur as usize - base as usize,
                    payload_size: (*block).payload_size,
                    free: (*block).free,
                    alloc_id: (*block).alloc_id,
                });
                cur = cur.add(span);
            }
        }
        out
    }

    /// Snapshot of the live tracking records, newest first. Empty when leak
    /// detection is disabled.
    pub fn live_allocations(&self) -> Vec<AllocationInfo> {
        let st = self.state.lock();
        st.records.iter().copied().collect()
    }

    /// Full-arena self check: physical tiling and sentinels, footer
    /// mirrors, coalescing invariant, registry membership and, when stats
    /// are enabled, counter consistency against the walk.
    pub fn check_integrity(&self) -> IntegrityReport {
        let st = self.state.lock();
        let mut report = IntegrityReport::default();
        if st.base.is_null() {
            return report;
        }
        unsafe { st.scan(&mut report) };
        report
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl HeapState {
    /// Best-fit scan of the request's home class, falling back to the head
    /// of the first non-empty higher class (whose members are all large
    /// enough by class-bound monotonicity). Null when nothing fits.
    ///
    /// # Safety
    /// The free lists must only contain valid blocks of this arena.
    unsafe fn find_best_fit(&mut self, size: usize) -> *mut BlockHeader {
        let home = class_of(size);
        let mut best: *mut BlockHeader = ptr::null_mut();
        let mut best_slack = usize::MAX;

        let mut cur = self.registry.free_head(home);
        while !cur.is_null() {
            if !self.validate_block(cur, "find_best_fit") {
                break;
            }
            if (*cur).free && (*cur).payload_size >= size {
                let slack = (*cur).payload_size - size;
                if slack == 0 {
                    return cur;
                }
                if slack < best_slack {
                    best_slack = slack;
                    best = cur;
                }
            }
            cur = (*cur).next;
        }
        if !best.is_null() {
            return best;
        }

        for class in home + 1..NUM_SIZE_CLASSES {
            let head = self.registry.free_head(class);
            if !head.is_null() && self.validate_block(head, "find_best_fit") {
                return head;
            }
        }
        ptr::null_mut()
    }

    /// Trim `block` down to `size` payload bytes and carve the rest into a
    /// new free block, which is linked into its class list. Returns the new
    /// block, or null when the remainder would be too small to stand alone.
    ///
    /// # Safety
    /// `block` must be a valid, unlinked-or-used block of this arena and
    /// `size` an aligned payload not larger than its current payload.
    unsafe fn split_block(&mut self, block: *mut BlockHeader, size: usize) -> *mut BlockHeader {
        self.validate_block(block, "split_block");
        let original = (*block).payload_size;
        if original < size + HEADER_SIZE + FOOTER_SIZE {
            return ptr::null_mut();
        }
        let remaining = original - size - HEADER_SIZE - FOOTER_SIZE;
        if remaining < MIN_BLOCK_SIZE + GUARD_PADDING {
            return ptr::null_mut();
        }

        (*block).payload_size = size;
        block::write_footer(block);

        let tail_at = (block as *mut u8).add(block_span(size));
        let tail = block::init_free_block(tail_at, remaining);
        self.registry.insert_free(tail);

        if ENABLE_STATS {
            if (*block).free {
                self.stats.free_bytes -= original - size;
            }
            self.stats.free_bytes += remaining;
            self.stats.free_blocks += 1;
            self.stats.overhead_bytes += HEADER_SIZE + FOOTER_SIZE;
        }

        self.validate_block(block, "split_block");
        self.validate_block(tail, "split_block");
        tail
    }

    /// Merge a newly freed block with its physical neighbors: forward into
    /// `block`, then backward into the predecessor. The survivor is
    /// re-filed under a new size class only when the class changed. Returns
    /// the surviving block; after a backward merge `block` no longer
    /// exists.
    ///
    /// # Safety
    /// `block` must be free and linked in the free list of its class.
    unsafe fn coalesce(&mut self, block: *mut BlockHeader) -> *mut BlockHeader {
        if let Some(next) = block::next_physical(block, self.base, self.arena_size) {
            if self.validate_block(next, "coalesce") && (*next).free {
                self.registry.remove_free(next, class_of((*next).payload_size));
                let old_class = class_of((*block).payload_size);
                (*block).payload_size += block_span((*next).payload_size);
                block::write_footer(block);
                if ENABLE_STATS {
                    self.stats.free_blocks -= 1;
                    self.stats.free_bytes += HEADER_SIZE + FOOTER_SIZE;
                    self.stats.overhead_bytes -= HEADER_SIZE + FOOTER_SIZE;
                }
                if class_of((*block).payload_size) != old_class {
                    self.registry.remove_free(block, old_class);
                    self.registry.insert_free(block);
                }
            }
        }

        if BOUNDARY_TAGS {
            if let Some(prev) = block::prev_physical(block, self.base) {
                if (*prev).free {
                    self.registry.remove_free(block, class_of((*block).payload_size));
                    let old_class = class_of((*prev).payload_size);
                    (*prev).payload_size += block_span((*block).payload_size);
                    block::write_footer(prev);
                    if ENABLE_STATS {
                        self.stats.free_blocks -= 1;
                        self.stats.free_bytes += HEADER_SIZE + FOOTER_SIZE;
                        self.stats.overhead_bytes -= HEADER_SIZE + FOOTER_SIZE;
                    }
                    if class_of((*prev).payload_size) != old_class {
                        self.registry.remove_free(prev, old_class);
                        self.registry.insert_free(prev);
                    }
                    return prev;
                }
            }
        }
        block
    }

    /// Bounds- and sentinel-check a block pointer. Failures are reported
    /// through the diagnostic channel; the return value tells the caller
    /// whether the header is safe to use.
    ///
    /// # Safety
    /// `block` may be any pointer; it is only dereferenced after the bounds
    /// check passes.
    unsafe fn validate_block(&self, block: *mut BlockHeader, location: &str) -> bool {
        let base = self.base as usize;
        let end = base + self.arena_size;
        let addr = block as usize;
        if addr < base || addr + HEADER_SIZE > end {
            log::error!(
                "MEMORY ERROR at {}: Block {:p} is outside heap bounds",
                location,
                block
            );
            return false;
        }

        let mut ok = true;
        if (*block).start_sentinel != SENTINEL_VALUE {
            log::error!(
                "MEMORY CORRUPTION at {}: Block {:p} start sentinel corrupted",
                location,
                block
            );
            ok = false;
        }
        if (*block).end_sentinel != SENTINEL_VALUE {
            log::error!(
                "MEMORY CORRUPTION at {}: Block {:p} end sentinel corrupted",
                location,
                block
            );
            ok = false;
        }
        if !ok {
            return false;
        }

        let payload = (*block).payload_size;
        if payload > self.arena_size || addr + block_span(payload) > end {
            log::error!(
                "MEMORY ERROR at {}: Block {:p} has invalid size {}",
                location,
                block,
                payload
            );
            return false;
        }

        if BOUNDARY_TAGS && (*block::footer_of(block)).sentinel != FOOTER_SENTINEL {
            log::error!(
                "MEMORY CORRUPTION at {}: Block {:p} footer sentinel corrupted",
                location,
                block
            );
        }
        true
    }

    /// Registry walk performed on every mutating entry at debug level >= 2:
    /// validates every listed block, checks the free flags against list
    /// membership and cross-checks the stats block counts.
    ///
    /// # Safety
    /// The registries must only contain valid blocks of this arena.
    unsafe fn debug_walk(&self) {
        let mut free_count = 0usize;
        let mut used_count = 0usize;

        for class in 0..NUM_SIZE_CLASSES {
            let mut cur = self.registry.free_head(class);
            while !cur.is_null() {
                if !self.validate_block(cur, "debug_walk") {
                    break;
                }
                if !(*cur).free {
                    log::error!("HEAP ERROR: Block in free list is marked as used");
                }
                free_count += 1;
                cur = (*cur).next;
            }
        }

        let mut cur = self.registry.used_head();
        while !cur.is_null() {
            if !self.validate_block(cur, "debug_walk") {
                break;
            }
            if (*cur).free {
                log::error!("HEAP ERROR: Block in used list is marked as free");
            }
            used_count += 1;
            cur = (*cur).next;
        }

        if ENABLE_STATS
            && (self.stats.free_blocks != free_count || self.stats.allocated_blocks != used_count)
        {
            log::error!("HEAP ERROR: Stats mismatch");
        }
    }

    /// Recompute the fragmentation figures from the free lists.
    fn update_fragmentation(&mut self) {
        self.stats.fragmentation_count = 0;
        self.stats.largest_free_block = 0;
        self.stats.smallest_free_block = usize::MAX;
        for class in 0..NUM_SIZE_CLASSES {
            let mut cur = self.registry.free_head(class);
            while !cur.is_null() {
                unsafe {
                    let size = (*cur).payload_size;
                    self.stats.fragmentation_count += 1;
                    if size > self.stats.largest_free_block {
                        self.stats.largest_free_block = size;
                    }
                    if size < self.stats.smallest_free_block {
                        self.stats.smallest_free_block = size;
                    }
                    cur = (*cur).next;
                }
            }
        }
        if self.stats.fragmentation_count == 0 {
            self.stats.smallest_free_block = 0;
        }
    }

    /// Full integrity scan; see [`Heap::check_integrity`].
    ///
    /// # Safety
    /// The arena must be mapped.
    unsafe fn scan(&self, report: &mut IntegrityReport) {
        let base = self.base as usize;
        let end = base + self.arena_size;

        // Phase 1: physical walk.
        let mut by_addr: HashMap<usize, bool> = HashMap::new();
        let mut walk_free_blocks = 0usize;
        let mut walk_used_blocks = 0usize;
        let mut walk_free_bytes = 0usize;
        let mut walk_used_bytes = 0usize;
        let mut walk_overhead = 0usize;
        let mut walk_largest_free = 0usize;
        let mut walk_smallest_free = usize::MAX;
        let mut prev_free = false;
        let mut cur = base;
        loop {
            if cur == end {
                break;
            }
            if cur + HEADER_SIZE > end {
                report.tiling_breaks += 1;
                break;
            }
            let block = cur as *mut BlockHeader;
            if (*block).start_sentinel != SENTINEL_VALUE || (*block).end_sentinel != SENTINEL_VALUE
            {
                report.sentinel_failures += 1;
                report.tiling_breaks += 1;
                break;
            }
            let payload = (*block).payload_size;
            let span = block_span(payload);
            if cur + span > end {
                report.tiling_breaks += 1;
                break;
            }

            if BOUNDARY_TAGS {
                let footer = block::footer_of(block);
                if (*footer).sentinel != FOOTER_SENTINEL {
                    report.sentinel_failures += 1;
                }
                if (*footer).payload_size != payload || (*footer).free != (*block).free {
                    report.footer_mismatches += 1;
                }
            }

            report.blocks_walked += 1;
            by_addr.insert(cur, (*block).free);
            walk_overhead += HEADER_SIZE + FOOTER_SIZE;
            if (*block).free {
                if prev_free {
                    report.adjacent_free_pairs += 1;
                }
                walk_free_blocks += 1;
                walk_free_bytes += payload;
                if payload > walk_largest_free {
                    walk_largest_free = payload;
                }
                if payload < walk_smallest_free {
                    walk_smallest_free = payload;
                }
                prev_free = true;
            } else {
                walk_used_blocks += 1;
                walk_used_bytes += payload;
                walk_overhead += payload - (*block).request_size.min(payload);
                prev_free = false;
            }
            cur += span;
        }
        if walk_free_blocks == 0 {
            walk_smallest_free = 0;
        }

        // Phase 2: registry walk. Every block must be filed in exactly one
        // list, consistent with its free flag and size class.
        let mut seen: HashSet<usize> = HashSet::new();
        let mut listed_free = 0usize;
        let mut listed_used = 0usize;
        for class in 0..NUM_SIZE_CLASSES {
            let mut cur = self.registry.free_head(class);
            while !cur.is_null() {
                let addr = cur as usize;
                if !seen.insert(addr) {
                    report.registry_errors += 1;
                    break;
                }
                match by_addr.get(&addr) {
                    Some(true) => {}
                    _ => report.registry_errors += 1,
                }
                if !(*cur).free || class_of((*cur).payload_size) != class {
                    report.registry_errors += 1;
                }
                listed_free += 1;
                cur = (*cur).next;
            }
        }
        let mut cur = self.registry.used_head();
        while !cur.is_null() {
            let addr = cur as usize;
            if !seen.insert(addr) {
                report.registry_errors += 1;
                break;
            }
            match by_addr.get(&addr) {
                Some(false) => {}
                _ => report.registry_errors += 1,
            }
            if (*cur).free {
                report.registry_errors += 1;
            }
            listed_used += 1;
            cur = (*cur).next;
        }
        if listed_free != walk_free_blocks || listed_used != walk_used_blocks {
            report.registry_errors += 1;
        }

        // Phase 3: stats cross-check.
        if ENABLE_STATS {
            let s = &self.stats;
            let checks = [
                s.allocated_bytes == walk_used_bytes,
                s.free_bytes == walk_free_bytes,
                s.allocated_blocks == walk_used_blocks,
                s.free_blocks == walk_free_blocks,
                s.overhead_bytes == walk_overhead,
                s.fragmentation_count == walk_free_blocks,
                s.largest_free_block == walk_largest_free,
                s.smallest_free_block == walk_smallest_free,
            ];
            report.stats_mismatches += checks.iter().filter(|&&ok| !ok).count();
        }

        report.errors_found = report.sentinel_failures
            + report.footer_mismatches
            + report.tiling_breaks
            + report.adjacent_free_pairs
            + report.registry_errors
            + report.stats_mismatches;
    }
}
