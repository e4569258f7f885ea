//! Slotted page format used by [`super::TableHeap`].
//!
//! Layout within a `[u8; PAGE_SIZE]` page buffer:
//!
//! ```text
//! [0..4)   prev_page_id
//! [4..8)   next_page_id
//! [8..12)  free_space_pointer  (offset where tuple bytes begin; grows down)
//! [12..16) tuple_count
//! [16..)   slot array: tuple_count entries of (offset: u32, size: u32)
//!          tuple bytes, growing backward from PAGE_SIZE
//! ```
//!
//! A slot's high bit of `size` is a tombstone: set when the tuple at that
//! slot has been deleted. Grounded on the slotted-page contract described
//! for `src/storage/table_heap.cpp`'s `TablePage`.

use crate::config::{INVALID_PAGE_ID, PAGE_SIZE};
use crate::disk::PageId;

const HEADER_SIZE: usize = 16;
const SLOT_SIZE: usize = 8;
const TOMBSTONE_BIT: u32 = 1 << 31;

pub(crate) struct TablePage<'a> {
    bytes: &'a mut [u8; PAGE_SIZE],
}

impl<'a> TablePage<'a> {
    pub fn new(bytes: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn init(bytes: &'a mut [u8; PAGE_SIZE], prev_page_id: PageId) -> Self {
        bytes.fill(0);
        let mut page = Self { bytes };
        page.set_prev_page_id(prev_page_id);
        page.set_next_page_id(INVALID_PAGE_ID);
        page.set_free_space_pointer(PAGE_SIZE as u32);
        page.set_tuple_count(0);
        page
    }

    fn read_u32(&self, off: usize) -> u32 {
        u32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap())
    }

    fn write_u32(&mut self, off: usize, v: u32) {
        self.bytes[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn prev_page_id(&self) -> PageId {
        self.read_u32(0) as PageId
    }

    pub fn set_prev_page_id(&mut self, id: PageId) {
        self.write_u32(0, id as u32);
    }

    pub fn next_page_id(&self) -> PageId {
        self.read_u32(4) as PageId
    }

    pub fn set_next_page_id(&mut self, id: PageId) {
        self.write_u32(4, id as u32);
    }

    fn free_space_pointer(&self) -> u32 {
        self.read_u32(8)
    }

    fn set_free_space_pointer(&mut self, v: u32) {
        self.write_u32(8, v);
    }

    pub fn tuple_count(&self) -> u32 {
        self.read_u32(12)
    }

    fn set_tuple_count(&mut self, v: u32) {
        self.write_u32(12, v);
    }

    fn slot_offset(&self, slot: u32) -> usize {
        HEADER_SIZE + slot as usize * SLOT_SIZE
    }

    fn slot_raw(&self, slot: u32) -> (u32, u32) {
        let off = self.slot_offset(slot);
        (self.read_u32(off), self.read_u32(off + 4))
    }

    fn set_slot_raw(&mut self, slot: u32, offset: u32, size: u32) {
        let off = self.slot_offset(slot);
        self.write_u32(off, offset);
        self.write_u32(off + 4, size);
    }

    fn is_tombstoned(size: u32) -> bool {
        size & TOMBSTONE_BIT != 0
    }

    /// Bytes available for a new tuple of `len` bytes, accounting for the
    /// slot array's growth by one more entry.
    fn free_space(&self) -> usize {
        let slot_array_end = self.slot_offset(self.tuple_count());
        (self.free_space_pointer() as usize).saturating_sub(slot_array_end + SLOT_SIZE)
    }

    /// Try to append `data` as a new tuple. Returns its slot number, or
    /// `None` if the page has insufficient free space.
    pub fn insert_tuple(&mut self, data: &[u8]) -> Option<u32> {
        if data.len() > self.free_space() {
            return None;
        }
        let new_fsp = self.free_space_pointer() - data.len() as u32;
        self.bytes[new_fsp as usize..new_fsp as usize + data.len()].copy_from_slice(data);
        self.set_free_space_pointer(new_fsp);

        let slot = self.tuple_count();
        self.set_slot_raw(slot, new_fsp, data.len() as u32);
        self.set_tuple_count(slot + 1);
        Some(slot)
    }

    /// Set a slot's tombstone bit without reclaiming its bytes.
    pub fn mark_delete(&mut self, slot: u32) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = self.slot_raw(slot);
        if Self::is_tombstoned(size) {
            return false;
        }
        self.set_slot_raw(slot, offset, size | TOMBSTONE_BIT);
        true
    }

    /// Clear a slot's tombstone bit (undo a not-yet-applied delete).
    pub fn rollback_delete(&mut self, slot: u32) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = self.slot_raw(slot);
        if !Self::is_tombstoned(size) {
            return false;
        }
        self.set_slot_raw(slot, offset, size & !TOMBSTONE_BIT);
        true
    }

    /// Permanently discard a tombstoned slot's bytes (its slot stays but is
    /// reported empty forever after).
    pub fn apply_delete(&mut self, slot: u32) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = self.slot_raw(slot);
        let _ = offset;
        self.set_slot_raw(slot, 0, TOMBSTONE_BIT);
        let _ = size;
        true
    }

    /// Overwrite a tuple in place if `data` fits within its existing slot
    /// size; returns `false` (leaving the page untouched) if it would grow.
    pub fn update_tuple(&mut self, slot: u32, data: &[u8]) -> bool {
        if slot >= self.tuple_count() {
            return false;
        }
        let (offset, size) = self.slot_raw(slot);
        if Self::is_tombstoned(size) {
            return false;
        }
        if data.len() as u32 > size {
            return false;
        }
        self.bytes[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        self.set_slot_raw(slot, offset, data.len() as u32);
        true
    }

    /// Borrow a live (non-tombstoned) tuple's bytes.
    pub fn get_tuple(&self, slot: u32) -> Option<&[u8]> {
        if slot >= self.tuple_count() {
            return None;
        }
        let (offset, size) = self.slot_raw(slot);
        if Self::is_tombstoned(size) {
            return None;
        }
        Some(&self.bytes[offset as usize..offset as usize + size as usize])
    }

    /// First live slot on this page, if any.
    pub fn first_tuple_slot(&self) -> Option<u32> {
        (0..self.tuple_count()).find(|&s| !Self::is_tombstoned(self.slot_raw(s).1))
    }

    /// Next live slot after `slot` on this page, if any.
    pub fn next_tuple_slot(&self, slot: u32) -> Option<u32> {
        ((slot + 1)..self.tuple_count()).find(|&s| !Self::is_tombstoned(self.slot_raw(s).1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_roundtrip() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut buf, INVALID_PAGE_ID);
        let slot = page.insert_tuple(b"hello").unwrap();
        assert_eq!(page.get_tuple(slot).unwrap(), b"hello");
    }

    #[test]
    fn mark_delete_hides_tuple_but_apply_delete_is_permanent() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut buf, INVALID_PAGE_ID);
        let slot = page.insert_tuple(b"x").unwrap();
        assert!(page.mark_delete(slot));
        assert!(page.get_tuple(slot).is_none());
        assert!(page.rollback_delete(slot));
        assert!(page.get_tuple(slot).is_some());
        assert!(page.mark_delete(slot));
        assert!(page.apply_delete(slot));
        assert!(page.get_tuple(slot).is_none());
        assert!(!page.rollback_delete(slot));
    }

    #[test]
    fn update_in_place_only_when_not_larger() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut buf, INVALID_PAGE_ID);
        let slot = page.insert_tuple(b"abcd").unwrap();
        assert!(page.update_tuple(slot, b"ab"));
        assert_eq!(page.get_tuple(slot).unwrap(), b"ab");
        assert!(!page.update_tuple(slot, b"abcdef"));
    }

    #[test]
    fn insert_fails_once_page_is_full() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut buf, INVALID_PAGE_ID);
        let big = vec![0u8; 200];
        let mut count = 0;
        while page.insert_tuple(&big).is_some() {
            count += 1;
        }
        assert!(count > 0);
        assert!(page.insert_tuple(&big).is_none());
    }

    #[test]
    fn iteration_skips_tombstoned_slots() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = TablePage::init(&mut buf, INVALID_PAGE_ID);
        let a = page.insert_tuple(b"a").unwrap();
        let b = page.insert_tuple(b"b").unwrap();
        let c = page.insert_tuple(b"c").unwrap();
        page.mark_delete(b);
        assert_eq!(page.first_tuple_slot(), Some(a));
        assert_eq!(page.next_tuple_slot(a), Some(c));
        assert_eq!(page.next_tuple_slot(c), None);
    }
}
