use crate::config::MEMORY_GUARDS;
use crate::util::{ALIGNMENT, GUARD_VALUE};

/// Stamp the leading and trailing red zones around a live user region.
/// The leading zone is the `ALIGNMENT` bytes below `user`, the trailing
/// zone the `ALIGNMENT` bytes starting at `user + size`.
///
/// # Safety
/// Both zones must lie inside the block's payload.
pub unsafe fn write_red_zones(user: *mut u8, size: usize) {
    if !MEMORY_GUARDS {
        return;
    }
    let leading = user.sub(ALIGNMENT);
    let trailing = user.add(size);
    for i in 0..ALIGNMENT {
        leading.add(i).write(GUARD_VALUE);
        trailing.add(i).write(GUARD_VALUE);
    }
}

/// Check that both red zones still carry `GUARD_VALUE`.
///
/// # Safety
/// Same requirements as `write_red_zones`.
pub unsafe fn red_zones_intact(user: *const u8, size: usize) -> bool {
    if !MEMORY_GUARDS {
        return true;
    }
    let leading = user.sub(ALIGNMENT);
    let trailing = user.add(size);
    for i in 0..ALIGNMENT {
        if leading.add(i).read() != GUARD_VALUE {
            return false;
        }
        if trailing.add(i).read() != GUARD_VALUE {
            return false;
        }
    }
    true
}
