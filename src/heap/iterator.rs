//! Non-restartable forward cursor over a [`TableHeap`]'s live rows.
//!
//! Grounded on `src/storage/table_iterator.cpp`: advancing walks the
//! current page's remaining slots, then follows `next_page_id` links until
//! a page with a live tuple is found or the chain ends.

use crate::buffer::BufferPoolManager;
use crate::error::Result;
use crate::record::{Row, RowId, Schema};

use super::TableHeap;

/// A single forward pass over a table heap's rows. Each step re-fetches the
/// underlying page, so the iterator stays correct across intervening
/// mutations to pages it has not yet visited, but it cannot be rewound.
pub struct TableIterator {
    rid: RowId,
}

impl TableIterator {
    /// Position at the heap's first live row.
    pub fn begin(heap: &TableHeap, bpm: &mut BufferPoolManager) -> Result<Self> {
        Ok(Self { rid: heap.first_rid(bpm)? })
    }

    /// The one-past-the-end sentinel position.
    pub fn end() -> Self {
        Self { rid: RowId::INVALID }
    }

    /// Whether this cursor has run off the end of the heap.
    pub fn is_end(&self) -> bool {
        self.rid == RowId::INVALID
    }

    /// The row id currently under the cursor.
    pub fn rid(&self) -> RowId {
        self.rid
    }

    /// Fetch and decode the row currently under the cursor.
    pub fn current(&self, heap: &TableHeap, bpm: &mut BufferPoolManager, schema: &Schema) -> Result<Row> {
        heap.get(bpm, schema, self.rid)
    }

    /// Advance to the next live row, becoming the end sentinel if none
    /// remain.
    pub fn advance(&mut self, heap: &TableHeap, bpm: &mut BufferPoolManager) -> Result<()> {
        self.rid = heap.next_rid(bpm, self.rid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use crate::record::{Column, DataType, Field};
    use tempfile::tempdir;

    #[test]
    fn iterates_every_live_row_once() {
        let dir = tempdir().unwrap();
        let dm = DiskManager::open(dir.path().join("db")).unwrap();
        std::mem::forget(dir);
        let mut bpm = BufferPoolManager::new(8, dm);
        let heap = TableHeap::create(&mut bpm).unwrap();
        let schema = Schema::new(vec![Column::new("v", DataType::Int, 0, false, false)]);

        let mut expected = Vec::new();
        for i in 0..50 {
            let mut row = Row::new(vec![Field::Int(i)]);
            heap.insert(&mut bpm, &schema, &mut row).unwrap();
            if i % 3 != 0 {
                expected.push(i);
            } else {
                heap.mark_delete(&mut bpm, row.rid()).unwrap();
            }
        }

        let mut seen = Vec::new();
        let mut it = TableIterator::begin(&heap, &mut bpm).unwrap();
        while !it.is_end() {
            let row = it.current(&heap, &mut bpm, &schema).unwrap();
            if let Field::Int(v) = row.field(0) {
                seen.push(*v);
            }
            it.advance(&heap, &mut bpm).unwrap();
        }
        assert_eq!(seen, expected);
    }
}
