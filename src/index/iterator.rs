//! Forward cursor over a [`BPlusTree`]'s leaves in key order, used for
//! range scans (`WHERE key >= x`) and full index scans.
//!
//! Grounded on `src/index/index_iterator.cpp`: each step re-derives its
//! position from the current leaf's `next_page_id` rather than holding a
//! pinned page across calls.

use crate::buffer::BufferPoolManager;
use crate::config::{INVALID_PAGE_ID, PAGE_SIZE};
use crate::disk::PageId;
use crate::error::Result;
use crate::record::RowId;

use super::leaf_page::LeafPage;
use super::BPlusTree;

/// A position within a B+ tree's leaf chain.
pub struct IndexIterator {
    leaf_pid: PageId,
    slot: u32,
}

impl IndexIterator {
    /// Position at the tree's first (smallest-key) entry.
    pub fn begin(tree: &BPlusTree, bpm: &mut BufferPoolManager) -> Result<Self> {
        match tree.leftmost_leaf(bpm)? {
            Some(leaf_pid) => Self { leaf_pid, slot: 0 }.skip_to_nonempty_leaf(tree, bpm),
            None => Ok(Self::end()),
        }
    }

    /// Position at the first entry whose key is `>= key`.
    pub fn begin_at(tree: &BPlusTree, bpm: &mut BufferPoolManager, key: &[u8]) -> Result<Self> {
        match tree.locate(bpm, key)? {
            Some((leaf_pid, slot)) => Self { leaf_pid, slot }.skip_to_nonempty_leaf(tree, bpm),
            None => Ok(Self::end()),
        }
    }

    /// The one-past-the-end sentinel position.
    pub fn end() -> Self {
        Self { leaf_pid: INVALID_PAGE_ID, slot: 0 }
    }

    /// Whether this cursor has run off the end of the tree.
    pub fn is_end(&self) -> bool {
        self.leaf_pid == INVALID_PAGE_ID
    }

    /// The `(key, row id)` currently under the cursor.
    pub fn current(&self, tree: &BPlusTree, bpm: &mut BufferPoolManager) -> Result<(Vec<u8>, RowId)> {
        let frame = bpm.fetch_page(self.leaf_pid)?;
        let mut buf = *bpm.frame_data(frame);
        bpm.unpin_page(self.leaf_pid, false)?;
        let page = LeafPage::new(&mut buf, tree.key_size());
        Ok((page.key_at(self.slot).to_vec(), page.value_at(self.slot)))
    }

    /// Advance to the next entry, becoming the end sentinel once the chain
    /// is exhausted.
    pub fn advance(mut self, tree: &BPlusTree, bpm: &mut BufferPoolManager) -> Result<Self> {
        self.slot += 1;
        self.skip_to_nonempty_leaf(tree, bpm)
    }

    /// If `slot` has run past the current leaf's entries, follow
    /// `next_page_id` links until a leaf with a live slot is found (or the
    /// chain ends).
    fn skip_to_nonempty_leaf(mut self, tree: &BPlusTree, bpm: &mut BufferPoolManager) -> Result<Self> {
        loop {
            if self.leaf_pid == INVALID_PAGE_ID {
                return Ok(Self::end());
            }
            let frame = bpm.fetch_page(self.leaf_pid)?;
            let mut buf = *bpm.frame_data(frame);
            bpm.unpin_page(self.leaf_pid, false)?;
            let page = LeafPage::new(&mut buf, tree.key_size());
            if self.slot < page.size() {
                return Ok(self);
            }
            self.leaf_pid = page.next_page_id();
            self.slot = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use tempfile::tempdir;

    fn bootstrap() -> BufferPoolManager {
        let dir = tempdir().unwrap();
        let dm = DiskManager::open(dir.path().join("db")).unwrap();
        std::mem::forget(dir);
        let mut bpm = BufferPoolManager::new(32, dm);
        let (p0, _) = bpm.new_page().unwrap();
        bpm.unpin_page(p0, false).unwrap();
        let (p1, _) = bpm.new_page().unwrap();
        bpm.unpin_page(p1, false).unwrap();
        bpm
    }

    fn key(n: i32) -> Vec<u8> {
        ((n as u32) ^ 0x8000_0000).to_be_bytes().to_vec()
    }

    #[test]
    fn full_scan_visits_keys_in_order() {
        let mut bpm = bootstrap();
        let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
        let mut order: Vec<i32> = (0..60).collect();
        // insert out of order to make sure the scan still comes back sorted
        let mut shuffled = order.clone();
        shuffled.rotate_left(23);
        for &i in &shuffled {
            tree.insert(&mut bpm, &key(i), RowId::new(i, 0)).unwrap();
        }
        order.sort();

        let mut seen = Vec::new();
        let mut it = IndexIterator::begin(&tree, &mut bpm).unwrap();
        while !it.is_end() {
            let (_, rid) = it.current(&tree, &mut bpm).unwrap();
            seen.push(rid.page_id());
            it = it.advance(&tree, &mut bpm).unwrap();
        }
        assert_eq!(seen, order);
    }

    #[test]
    fn begin_at_skips_smaller_keys() {
        let mut bpm = bootstrap();
        let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
        for i in 0..40 {
            tree.insert(&mut bpm, &key(i), RowId::new(i, 0)).unwrap();
        }
        let it = IndexIterator::begin_at(&tree, &mut bpm, &key(25)).unwrap();
        let (_, rid) = it.current(&tree, &mut bpm).unwrap();
        assert_eq!(rid.page_id(), 25);
    }
}
