use crate::block::BlockHeader;
use crate::config::CACHE_LOCALITY;
use crate::size_class::{class_of, NUM_SIZE_CLASSES};
use core::ptr;

/// Size classes that keep their free list sorted by address when the
/// `cache-locality` feature is on. Small classes churn the most, so forward
/// scans there benefit from landing on physically nearby blocks.
const ADDRESS_ORDERED_CLASSES: usize = 4;

/// The two block registries: one doubly linked free list per size class,
/// plus a single doubly linked list of live blocks. Links are embedded in
/// the block headers; the registry only stores the heads.
pub struct Registry {
    free_lists: [*mut BlockHeader; NUM_SIZE_CLASSES],
    used_list: *mut BlockHeader,
}

impl Registry {
    pub const fn new() -> Self {
        Registry {
            free_lists: [ptr::null_mut(); NUM_SIZE_CLASSES],
            used_list: ptr::null_mut(),
        }
    }

    pub fn clear(&mut self) {
        self.free_lists = [ptr::null_mut(); NUM_SIZE_CLASSES];
        self.used_list = ptr::null_mut();
    }

    #[inline]
    pub fn free_head(&self, class: usize) -> *mut BlockHeader {
        self.free_lists[class]
    }

    #[inline]
    pub fn used_head(&self) -> *mut BlockHeader {
        self.used_list
    }

    /// Link a block into the free list of its payload's size class and mark
    /// it free. Head insertion by default; small classes are kept in
    /// ascending address order under `cache-locality`.
    ///
    /// # Safety
    /// `block` must point to a valid header that is not linked anywhere.
    pub unsafe fn insert_free(&mut self, block: *mut BlockHeader) {
        (*block).free = true;
        let class = class_of((*block).payload_size);

        if CACHE_LOCALITY && class < ADDRESS_ORDERED_CLASSES {
            let mut prev: *mut BlockHeader = ptr::null_mut();
            let mut cur = self.free_lists[class];
            while !cur.is_null() && (cur as usize) < (block as usize) {
                prev = cur;
                cur = (*cur).next;
            }
            (*block).prev = prev;
            (*block).next = cur;
            if !cur.is_null() {
                (*cur).prev = block;
            }
            if prev.is_null() {
                self.free_lists[class] = block;
            } else {
                (*prev).next = block;
            }
            return;
        }

        (*block).prev = ptr::null_mut();
        (*block).next = self.free_lists[class];
        if !self.free_lists[class].is_null() {
            (*self.free_lists[class]).prev = block;
        }
        self.free_lists[class] = block;
    }

    /// Unlink a block from the free list it is filed under. `class` is the
    /// class the block was inserted with; callers must pass it explicitly
    /// because the payload size may already have been rewritten.
    ///
    /// # Safety
    /// `block` must currently be linked in `free_lists[class]`.
    pub unsafe fn remove_free(&mut self, block: *mut BlockHeader, class: usize) {
        if !(*block).prev.is_null() {
            (*(*block).prev).next = (*block).next;
        }
        if !(*block).next.is_null() {
            (*(*block).next).prev = (*block).prev;
        }
        if self.free_lists[class] == block {
            self.free_lists[class] = (*block).next;
        }
        (*block).prev = ptr::null_mut();
        (*block).next = ptr::null_mut();
    }

    /// Link a block at the head of the used list and mark it live.
    ///
    /// # Safety
    /// `block` must point to a valid header that is not linked anywhere.
    pub unsafe fn push_used(&mut self, block: *mut BlockHeader) {
        (*block).free = false;
        (*block).prev = ptr::null_mut();
        (*block).next = self.used_list;
        if !self.used_list.is_null() {
            (*self.used_list).prev = block;
        }
        self.used_list = block;
    }

    /// Unlink a block from the used list.
    ///
    /// # Safety
    /// `block` must currently be linked in the used list.
    pub unsafe fn remove_used(&mut self, block: *mut BlockHeader) {
        if !(*block).prev.is_null() {
            (*(*block).prev).next = (*block).next;
        }
        if !(*block).next.is_null() {
            (*(*block).next).prev = (*block).prev;
        }
        if self.used_list == block {
            self.used_list = (*block).next;
        }
        (*block).prev = ptr::null_mut();
        (*block).next = ptr::null_mut();
    }
}
