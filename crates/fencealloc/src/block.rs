use crate::config::{BOUNDARY_TAGS, MEMORY_GUARDS};
use crate::util::{align_up, ALIGNMENT, FOOTER_SENTINEL, SENTINEL_VALUE};
use core::mem::size_of;
use core::ptr;

/// Per-block metadata at the low edge of every tile in the arena.
/// Field order matches the on-heap layout; the payload begins at
/// `HEADER_SIZE` bytes past the header address so that user pointers stay
/// `ALIGNMENT`-aligned.
#[repr(C)]
pub struct BlockHeader {
    pub start_sentinel: u32,
    /// Bytes between header and footer, always a multiple of `ALIGNMENT`.
    pub payload_size: usize,
    pub free: bool,
    /// Doubly linked list links owned by whichever registry currently
    /// holds the block.
    pub prev: *mut BlockHeader,
    pub next: *mut BlockHeader,
    /// User-visible size of the last allocation served from this block.
    pub request_size: usize,
    /// `LIVE_TAG` while allocated, 0 while free.
    pub address_tag: usize,
    pub alloc_id: u64,
    pub end_sentinel: u32,
}

/// Boundary tag mirroring the header at the block's high edge.
#[repr(C)]
pub struct BlockFooter {
    pub payload_size: usize,
    pub free: bool,
    pub sentinel: u32,
}

/// Opaque marker stored in `address_tag` while a block is live.
pub const LIVE_TAG: usize = 0xDEAD_BEEF;

/// Header size as laid out in the arena, padded so payloads stay aligned.
pub const HEADER_SIZE: usize = align_up(size_of::<BlockHeader>(), ALIGNMENT);

/// Footer size as laid out in the arena; zero when boundary tags are off.
pub const FOOTER_SIZE: usize = if BOUNDARY_TAGS {
    align_up(size_of::<BlockFooter>(), ALIGNMENT)
} else {
    0
};

/// Smallest payload a block may carry.
pub const MIN_BLOCK_SIZE: usize = align_up(HEADER_SIZE + 16, ALIGNMENT);

/// Bytes a block occupies in the arena: header, payload, footer.
#[inline(always)]
pub const fn block_span(payload_size: usize) -> usize {
    HEADER_SIZE + payload_size + FOOTER_SIZE
}

/// Offset of the user region within the payload.
#[inline(always)]
pub const fn user_offset() -> usize {
    if MEMORY_GUARDS {
        ALIGNMENT
    } else {
        0
    }
}

/// Start of the payload region.
///
/// # Safety
/// `block` must point to a header inside the arena.
#[inline(always)]
pub unsafe fn payload_ptr(block: *mut BlockHeader) -> *mut u8 {
    (block as *mut u8).add(HEADER_SIZE)
}

/// Pointer handed to the user: past the leading red zone when guards are on.
///
/// # Safety
/// `block` must point to a header inside the arena.
#[inline(always)]
pub unsafe fn user_ptr(block: *mut BlockHeader) -> *mut u8 {
    payload_ptr(block).add(user_offset())
}

/// Recover the block header from a pointer previously returned to the user.
///
/// # Safety
/// The result is only meaningful for pointers produced by `user_ptr`; the
/// caller must bounds- and sentinel-check it before dereferencing fields.
#[inline(always)]
pub unsafe fn block_from_user_ptr(ptr: *mut u8) -> *mut BlockHeader {
    // Wrapping arithmetic: the input may be an arbitrary foreign pointer
    // and the result is bounds-checked before any dereference.
    ptr.wrapping_sub(user_offset() + HEADER_SIZE) as *mut BlockHeader
}

/// Footer address of a block, or null when boundary tags are disabled.
///
/// # Safety
/// `block` must point to a valid header whose `payload_size` is in range.
#[inline(always)]
pub unsafe fn footer_of(block: *mut BlockHeader) -> *mut BlockFooter {
    if !BOUNDARY_TAGS {
        return ptr::null_mut();
    }
    (block as *mut u8).add(HEADER_SIZE + (*block).payload_size) as *mut BlockFooter
}

/// Rewrite a block's footer from its header.
///
/// # Safety
/// `block` must point to a valid header whose span lies inside the arena.
pub unsafe fn write_footer(block: *mut BlockHeader) {
    if !BOUNDARY_TAGS {
        return;
    }
    let footer = footer_of(block);
    (*footer).payload_size = (*block).payload_size;
    (*footer).free = (*block).free;
    (*footer).sentinel = FOOTER_SENTINEL;
}

/// The physically following block, or `None` when `block` is the last tile.
///
/// # Safety
/// `block` must point to a valid header inside `[base, base + arena_size)`.
pub unsafe fn next_physical(
    block: *mut BlockHeader,
    base: *mut u8,
    arena_size: usize,
) -> Option<*mut BlockHeader> {
    let next = (block as *mut u8).add(block_span((*block).payload_size));
    let end = base.add(arena_size);
    if next.add(HEADER_SIZE) <= end {
        Some(next as *mut BlockHeader)
    } else {
        None
    }
}

/// The physically preceding block, found through the preceding footer.
/// Returns `None` at the arena base, when boundary tags are disabled, or
/// when either the footer or the recovered header fails its sentinel check
/// (corruption is treated as "no neighbor", never as fatal).
///
/// # Safety
/// `block` must point to a valid header inside the arena starting at `base`.
pub unsafe fn prev_physical(block: *mut BlockHeader, base: *mut u8) -> Option<*mut BlockHeader> {
    if !BOUNDARY_TAGS {
        return None;
    }
    if (block as *mut u8) < base.add(FOOTER_SIZE + HEADER_SIZE) {
        return None;
    }
    let prev_footer = (block as *mut u8).sub(FOOTER_SIZE) as *mut BlockFooter;
    if (*prev_footer).sentinel != FOOTER_SENTINEL {
        return None;
    }
    let span = block_span((*prev_footer).payload_size);
    if (block as usize).checked_sub(span)? < base as usize {
        return None;
    }
    let prev = (block as *mut u8).sub(span) as *mut BlockHeader;
    if (*prev).start_sentinel != SENTINEL_VALUE || (*prev).end_sentinel != SENTINEL_VALUE {
        return None;
    }
    Some(prev)
}

/// Write a fresh free block at `at` with the given payload, including its
/// footer. The block is not linked into any registry.
///
/// # Safety
/// `at` must be `ALIGNMENT`-aligned and `block_span(payload_size)` bytes of
/// it must lie inside the arena.
pub unsafe fn init_free_block(at: *mut u8, payload_size: usize) -> *mut BlockHeader {
    let block = at as *mut BlockHeader;
    (*block).start_sentinel = SENTINEL_VALUE;
    (*block).payload_size = payload_size;
    (*block).free = true;
    (*block).prev = ptr::null_mut();
    (*block).next = ptr::null_mut();
    (*block).request_size = 0;
    (*block).address_tag = 0;
    (*block).alloc_id = 0;
    (*block).end_sentinel = SENTINEL_VALUE;
    write_footer(block);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::is_aligned;

    #[test]
    fn layout_keeps_user_pointers_aligned() {
        // Every per-block offset the tiling invariant depends on must be a
        // multiple of the engine alignment.
        assert!(is_aligned(HEADER_SIZE, ALIGNMENT));
        assert!(is_aligned(FOOTER_SIZE, ALIGNMENT));
        assert!(is_aligned(MIN_BLOCK_SIZE, ALIGNMENT));
        assert!(is_aligned(block_span(0), ALIGNMENT));
        assert!(is_aligned(user_offset(), ALIGNMENT));
    }

    #[test]
    fn min_block_covers_overhead() {
        // Split relies on any remainder of at least MIN_BLOCK_SIZE paying
        // for its own header and footer.
        assert!(MIN_BLOCK_SIZE >= HEADER_SIZE + FOOTER_SIZE || !BOUNDARY_TAGS);
    }
}
