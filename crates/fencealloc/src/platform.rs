//! Acquisition of the raw arena bytes. The arena is reserved exactly once
//! per initialize as a single anonymous mapping and handed back to the
//! kernel as one unit at teardown; a live reservation is never grown,
//! shrunk or remapped.

use crate::util::align_up;
use core::ptr;

/// A single arena reservation.
#[derive(Debug, Clone, Copy)]
pub struct ArenaMapping {
    pub base: *mut u8,
    /// Page-rounded length actually mapped; at least the requested size.
    pub len: usize,
}

/// Reserve the arena backing: one anonymous read-write mapping of `size`
/// bytes rounded up to whole pages. The kernel hands the pages back
/// zero-filled. Returns `None` when the reservation is refused.
pub fn reserve_arena(size: usize) -> Option<ArenaMapping> {
    debug_assert!(size > 0);
    let len = align_up(size, page_size());
    let base = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        None
    } else {
        Some(ArenaMapping {
            base: base as *mut u8,
            len,
        })
    }
}

/// Return a reservation to the kernel as one unit.
///
/// # Safety
/// `mapping` must have come from [`reserve_arena`] and no pointer into the
/// arena may be dereferenced afterwards.
pub unsafe fn release_arena(mapping: ArenaMapping) {
    libc::munmap(mapping.base as *mut libc::c_void, mapping.len);
}

/// System page size, the granularity of the reservation.
pub fn page_size() -> usize {
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw < 1 {
        4096
    } else {
        raw as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_is_page_rounded_and_zeroed() {
        let mapping = reserve_arena(10_000).expect("reservation failed");
        assert_eq!(mapping.len % page_size(), 0);
        assert!(mapping.len >= 10_000);
        unsafe {
            let slice = std::slice::from_raw_parts(mapping.base, mapping.len);
            assert!(slice.iter().all(|&b| b == 0));
            release_arena(mapping);
        }
    }
}
