//! A table's rows as a singly/doubly linked chain of slotted pages.
//!
//! Grounded on `src/storage/table_heap.cpp`: insert walks the page chain
//! looking for one with enough free space before allocating a new tail
//! page; update/delete/get all operate through the row's `RowId`'s page.

use log::trace;

use super::table_page::TablePage;
use crate::buffer::BufferPoolManager;
use crate::config::{INVALID_PAGE_ID, PAGE_SIZE};
use crate::disk::PageId;
use crate::error::{Error, Result};
use crate::record::{Row, RowId, Schema};

/// Capacity left in an empty page once the 16-byte header and one slot
/// entry are accounted for.
const USABLE_CAPACITY: usize = PAGE_SIZE - 16 - 8;

/// An unordered collection of rows, physically stored as a chain of
/// [`TablePage`]s starting at `first_page_id`.
pub struct TableHeap {
    first_page_id: PageId,
}

impl TableHeap {
    /// Allocate the heap's first page and return a handle to it.
    pub fn create(bpm: &mut BufferPoolManager) -> Result<Self> {
        let (page_id, frame) = bpm.new_page()?;
        TablePage::init(bpm.frame_data_mut(frame), INVALID_PAGE_ID);
        bpm.unpin_page(page_id, true)?;
        Ok(Self { first_page_id: page_id })
    }

    /// Wrap a heap whose first page is already known (loaded from the
    /// catalog).
    pub fn from_first_page_id(first_page_id: PageId) -> Self {
        Self { first_page_id }
    }

    /// Logical page id of the heap's first page, as persisted in a
    /// table's catalog metadata.
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Insert `row` (mutating its `rid`), walking the page chain for the
    /// first page with enough free space, else appending a new tail page.
    /// Rejects tuples too large to ever fit on an empty page.
    pub fn insert(&self, bpm: &mut BufferPoolManager, schema: &Schema, row: &mut Row) -> Result<()> {
        let bytes = row.serialize_to(schema);
        if bytes.len() > USABLE_CAPACITY {
            return Err(Error::TupleTooLarge { size: bytes.len(), capacity: USABLE_CAPACITY });
        }

        let mut cur = self.first_page_id;
        let mut last = cur;
        loop {
            let frame = bpm.fetch_page(cur)?;
            let mut page = TablePage::new(bpm.frame_data_mut(frame));
            if let Some(slot) = page.insert_tuple(&bytes) {
                bpm.unpin_page(cur, true)?;
                row.set_rid(RowId::new(cur, slot));
                trace!("insert into page {cur} slot {slot}");
                return Ok(());
            }
            let next = page.next_page_id();
            bpm.unpin_page(cur, false)?;
            last = cur;
            if next == INVALID_PAGE_ID {
                break;
            }
            cur = next;
        }

        let (new_page_id, frame) = bpm.new_page()?;
        {
            let mut new_page = TablePage::init(bpm.frame_data_mut(frame), last);
            let slot = new_page
                .insert_tuple(&bytes)
                .expect("tuple already checked to fit an empty page");
            row.set_rid(RowId::new(new_page_id, slot));
        }
        bpm.unpin_page(new_page_id, true)?;

        let last_frame = bpm.fetch_page(last)?;
        TablePage::new(bpm.frame_data_mut(last_frame)).set_next_page_id(new_page_id);
        bpm.unpin_page(last, true)?;
        Ok(())
    }

    /// Overwrite `rid`'s row in place. Returns `false` (leaving the old row
    /// untouched) if the new encoding no longer fits in its existing slot;
    /// callers should fall back to `mark_delete` + `insert` in that case.
    pub fn update(&self, bpm: &mut BufferPoolManager, schema: &Schema, rid: RowId, row: &Row) -> Result<bool> {
        let bytes = row.serialize_to(schema);
        let frame = bpm.fetch_page(rid.page_id())?;
        let ok = TablePage::new(bpm.frame_data_mut(frame)).update_tuple(rid.slot_num(), &bytes);
        bpm.unpin_page(rid.page_id(), ok)?;
        Ok(ok)
    }

    /// Logically delete `rid` (reversible via `rollback_delete` until
    /// `apply_delete` is called).
    pub fn mark_delete(&self, bpm: &mut BufferPoolManager, rid: RowId) -> Result<()> {
        let frame = bpm.fetch_page(rid.page_id())?;
        TablePage::new(bpm.frame_data_mut(frame)).mark_delete(rid.slot_num());
        bpm.unpin_page(rid.page_id(), true)
    }

    /// Permanently discard a previously `mark_delete`d row's bytes.
    pub fn apply_delete(&self, bpm: &mut BufferPoolManager, rid: RowId) -> Result<()> {
        let frame = bpm.fetch_page(rid.page_id())?;
        TablePage::new(bpm.frame_data_mut(frame)).apply_delete(rid.slot_num());
        bpm.unpin_page(rid.page_id(), true)
    }

    /// Undo a `mark_delete` that has not yet been applied.
    pub fn rollback_delete(&self, bpm: &mut BufferPoolManager, rid: RowId) -> Result<()> {
        let frame = bpm.fetch_page(rid.page_id())?;
        TablePage::new(bpm.frame_data_mut(frame)).rollback_delete(rid.slot_num());
        bpm.unpin_page(rid.page_id(), true)
    }

    /// Fetch and decode the row at `rid`.
    pub fn get(&self, bpm: &mut BufferPoolManager, schema: &Schema, rid: RowId) -> Result<Row> {
        let frame = bpm.fetch_page(rid.page_id())?;
        let bytes = {
            let page = TablePage::new(bpm.frame_data_mut(frame));
            page.get_tuple(rid.slot_num()).map(|b| b.to_vec())
        };
        bpm.unpin_page(rid.page_id(), false)?;
        let bytes = bytes.ok_or(Error::KeyNotFound)?;
        Row::deserialize_from(&bytes, schema)
    }

    /// First live row's id, or `RowId::INVALID` if the heap is empty.
    pub fn first_rid(&self, bpm: &mut BufferPoolManager) -> Result<RowId> {
        let mut cur = self.first_page_id;
        loop {
            let frame = bpm.fetch_page(cur)?;
            let (slot, next) = {
                let page = TablePage::new(bpm.frame_data_mut(frame));
                (page.first_tuple_slot(), page.next_page_id())
            };
            bpm.unpin_page(cur, false)?;
            if let Some(slot) = slot {
                return Ok(RowId::new(cur, slot));
            }
            if next == INVALID_PAGE_ID {
                return Ok(RowId::INVALID);
            }
            cur = next;
        }
    }

    /// Delete every page in this heap's chain. The heap must not be used
    /// afterward.
    pub fn destroy(&self, bpm: &mut BufferPoolManager) -> Result<()> {
        let mut cur = self.first_page_id;
        while cur != INVALID_PAGE_ID {
            let frame = bpm.fetch_page(cur)?;
            let next = TablePage::new(bpm.frame_data_mut(frame)).next_page_id();
            bpm.unpin_page(cur, false)?;
            bpm.delete_page(cur)?;
            cur = next;
        }
        Ok(())
    }

    /// Next live row's id after `rid`, or `RowId::INVALID` at the end of
    /// the heap.
    pub fn next_rid(&self, bpm: &mut BufferPoolManager, rid: RowId) -> Result<RowId> {
        let frame = bpm.fetch_page(rid.page_id())?;
        let (next_slot, mut next_page) = {
            let page = TablePage::new(bpm.frame_data_mut(frame));
            (page.next_tuple_slot(rid.slot_num()), page.next_page_id())
        };
        bpm.unpin_page(rid.page_id(), false)?;
        if let Some(slot) = next_slot {
            return Ok(RowId::new(rid.page_id(), slot));
        }
        while next_page != INVALID_PAGE_ID {
            let frame = bpm.fetch_page(next_page)?;
            let (slot, following) = {
                let page = TablePage::new(bpm.frame_data_mut(frame));
                (page.first_tuple_slot(), page.next_page_id())
            };
            bpm.unpin_page(next_page, false)?;
            if let Some(slot) = slot {
                return Ok(RowId::new(next_page, slot));
            }
            next_page = following;
        }
        Ok(RowId::INVALID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use crate::record::{Column, DataType, Field};
    use tempfile::tempdir;

    fn setup() -> (BufferPoolManager, Schema, TableHeap) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::open(dir.path().join("db")).unwrap();
        std::mem::forget(dir);
        let mut bpm = BufferPoolManager::new(16, dm);
        let heap = TableHeap::create(&mut bpm).unwrap();
        let schema = Schema::new(vec![Column::new("v", DataType::Int, 0, false, false)]);
        (bpm, schema, heap)
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let (mut bpm, schema, heap) = setup();
        let mut row = Row::new(vec![Field::Int(5)]);
        heap.insert(&mut bpm, &schema, &mut row).unwrap();
        let back = heap.get(&mut bpm, &schema, row.rid()).unwrap();
        assert_eq!(back.field(0), &Field::Int(5));
    }

    #[test]
    fn tombstones_hide_rows_from_iteration_but_rollback_restores_them() {
        let (mut bpm, schema, heap) = setup();
        let mut rows = Vec::new();
        for i in 0..5 {
            let mut row = Row::new(vec![Field::Int(i)]);
            heap.insert(&mut bpm, &schema, &mut row).unwrap();
            rows.push(row);
        }
        heap.mark_delete(&mut bpm, rows[2].rid()).unwrap();

        let mut count = 0;
        let mut rid = heap.first_rid(&mut bpm).unwrap();
        while rid != RowId::INVALID {
            count += 1;
            rid = heap.next_rid(&mut bpm, rid).unwrap();
        }
        assert_eq!(count, 4);

        heap.rollback_delete(&mut bpm, rows[2].rid()).unwrap();
        let mut count = 0;
        let mut rid = heap.first_rid(&mut bpm).unwrap();
        while rid != RowId::INVALID {
            count += 1;
            rid = heap.next_rid(&mut bpm, rid).unwrap();
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn heap_spans_multiple_pages_when_data_overflows_one() {
        let (mut bpm, schema, heap) = setup();
        for i in 0..2000 {
            let mut row = Row::new(vec![Field::Int(i)]);
            heap.insert(&mut bpm, &schema, &mut row).unwrap();
        }
        let mut count = 0;
        let mut rid = heap.first_rid(&mut bpm).unwrap();
        while rid != RowId::INVALID {
            count += 1;
            rid = heap.next_rid(&mut bpm, rid).unwrap();
        }
        assert_eq!(count, 2000);
    }
}
