use crate::util::{align_up, ALIGNMENT, DEFAULT_HEAP_SIZE, MIN_HEAP_SIZE};

/// Behavior toggles, fixed at build time. Each cargo feature maps to one
/// constant so that disabled paths still type-check in every combination.
pub const THREAD_SAFE: bool = cfg!(feature = "thread-safe");
pub const ENABLE_STATS: bool = cfg!(feature = "stats");
pub const MEMORY_GUARDS: bool = cfg!(feature = "memory-guards");
pub const BOUNDARY_TAGS: bool = cfg!(feature = "boundary-tags");
pub const CACHE_LOCALITY: bool = cfg!(feature = "cache-locality");
pub const LEAK_DETECTION: bool = cfg!(feature = "leak-detection");

/// Extra payload reserved for the leading and trailing red zones.
pub const GUARD_PADDING: usize = if MEMORY_GUARDS { 2 * ALIGNMENT } else { 0 };

/// Construction-time settings for one [`crate::heap::Heap`].
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Total size of the managed arena in bytes.
    pub heap_size: usize,
    /// 0 = silent, 1 = lifecycle messages, >= 2 adds a registry walk on
    /// every mutating entry.
    pub debug_level: u8,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            heap_size: DEFAULT_HEAP_SIZE,
            debug_level: 1,
        }
    }
}

impl HeapConfig {
    /// Read configuration overrides from the environment:
    /// `FENCEALLOC_HEAP_SIZE` and `FENCEALLOC_DEBUG_LEVEL`.
    pub fn from_env() -> Self {
        let mut cfg = HeapConfig::default();
        if let Some(size) = env_usize("FENCEALLOC_HEAP_SIZE") {
            cfg.heap_size = size;
        }
        if let Some(level) = env_usize("FENCEALLOC_DEBUG_LEVEL") {
            cfg.debug_level = level.min(u8::MAX as usize) as u8;
        }
        cfg.sanitized()
    }

    /// Clamp the arena size into the supported range and round it up to the
    /// engine alignment.
    pub fn sanitized(mut self) -> Self {
        if self.heap_size < MIN_HEAP_SIZE {
            self.heap_size = MIN_HEAP_SIZE;
        }
        self.heap_size = align_up(self.heap_size, ALIGNMENT);
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}
