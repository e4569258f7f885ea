//! The B+ tree algorithm: lookup, insert-with-split, and remove-with-
//! coalesce/redistribute, driven against [`InternalPage`]/[`LeafPage`]
//! wrappers over buffers borrowed from the buffer pool one at a time.
//!
//! Grounded on `src/index/b_plus_tree.cpp`. Two fixes relative to that
//! original are applied here, both recorded in `DESIGN.md`:
//!
//! - Every internal-page key (including index 0) is kept equal to its
//!   child's leftmost key at all times, so split/redistribute/coalesce never
//!   need to thread a separate `middle_key` parameter (see the module doc on
//!   [`super::internal_page`]).
//! - `coalesce_or_redistribute` always operates with the node and its
//!   sibling passed explicitly by page id, rather than through aliased
//!   pointers that could (in the original) refer to the same underlying
//!   node when `index == 0`.
//!
//! Rather than holding two live mutable borrows into the buffer pool's
//! frame array at once (which the original's raw-pointer style allows but
//! Rust's borrow checker does not), every step here copies a page's bytes
//! into a local `[u8; PAGE_SIZE]`, mutates it through the page wrapper
//! types, and writes it back before moving on to the next page.

use crate::buffer::BufferPoolManager;
use crate::config::{INVALID_PAGE_ID, PAGE_SIZE};
use crate::disk::PageId;
use crate::error::{Error, Result};
use crate::record::RowId;

use super::internal_page::InternalPage;
use super::leaf_page::LeafPage;
use super::page::{read_page_type_raw, write_parent_id_raw, PageType, HEADER_SIZE, LEAF_HEADER_SIZE};
use super::roots;

fn entries_capacity(header: usize, key_size: usize, entry_extra: usize) -> u32 {
    ((PAGE_SIZE - header) / (key_size + entry_extra)) as u32
}

/// A B+ tree index over a fixed-width encoded key, rooted wherever
/// [`roots`] says `index_id`'s root currently lives.
pub struct BPlusTree {
    index_id: u32,
    key_size: usize,
    leaf_max_size: u32,
    internal_max_size: u32,
    root_page_id: PageId,
}

impl BPlusTree {
    /// Open (creating an empty directory entry if none exists yet) the tree
    /// for `index_id`, sizing node capacities from `key_size`.
    pub fn new(bpm: &mut BufferPoolManager, index_id: u32, key_size: usize) -> Result<Self> {
        let leaf_max_size = entries_capacity(LEAF_HEADER_SIZE, key_size, 8).max(3);
        let internal_max_size = entries_capacity(HEADER_SIZE, key_size, 4).max(3);
        Self::with_max_sizes(bpm, index_id, key_size, leaf_max_size, internal_max_size)
    }

    /// As [`Self::new`], but with explicit node capacities (used by tests to
    /// exercise splits/merges without inserting thousands of keys).
    pub fn with_max_sizes(
        bpm: &mut BufferPoolManager,
        index_id: u32,
        key_size: usize,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        let root_page_id = match roots::get_root(bpm, index_id)? {
            Some(pid) => pid,
            None => {
                roots::update_root(bpm, index_id, INVALID_PAGE_ID)?;
                INVALID_PAGE_ID
            }
        };
        Ok(Self { index_id, key_size, leaf_max_size, internal_max_size, root_page_id })
    }

    /// Whether the tree currently has no entries.
    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    /// Current root page id, or `INVALID_PAGE_ID` if the tree is empty.
    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Encoded key width this tree was built with.
    pub(crate) fn key_size(&self) -> usize {
        self.key_size
    }

    fn load_buf(&self, bpm: &mut BufferPoolManager, pid: PageId) -> Result<[u8; PAGE_SIZE]> {
        let frame = bpm.fetch_page(pid)?;
        let buf = *bpm.frame_data(frame);
        bpm.unpin_page(pid, false)?;
        Ok(buf)
    }

    fn store_buf(&self, bpm: &mut BufferPoolManager, pid: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let frame = bpm.fetch_page(pid)?;
        *bpm.frame_data_mut(frame) = *buf;
        bpm.unpin_page(pid, true)?;
        Ok(())
    }

    fn set_parent(&self, bpm: &mut BufferPoolManager, child: PageId, parent: PageId) -> Result<()> {
        let mut buf = self.load_buf(bpm, child)?;
        write_parent_id_raw(&mut buf, parent);
        self.store_buf(bpm, child, &buf)
    }

    fn find_leaf(&self, bpm: &mut BufferPoolManager, key: &[u8]) -> Result<PageId> {
        let mut cur = self.root_page_id;
        loop {
            let buf = self.load_buf(bpm, cur)?;
            if read_page_type_raw(&buf) != PageType::Internal {
                return Ok(cur);
            }
            let mut buf = buf;
            let page = InternalPage::new(&mut buf, self.key_size);
            cur = page.lookup(key);
        }
    }

    /// The row id stored under `key`, if present.
    pub fn get_value(&self, bpm: &mut BufferPoolManager, key: &[u8]) -> Result<Option<RowId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_pid = self.find_leaf(bpm, key)?;
        let mut buf = self.load_buf(bpm, leaf_pid)?;
        Ok(LeafPage::new(&mut buf, self.key_size).lookup(key))
    }

    /// Insert `(key, value)`. Fails with [`Error::DuplicateKey`] if `key` is
    /// already present.
    pub fn insert(&mut self, bpm: &mut BufferPoolManager, key: &[u8], value: RowId) -> Result<()> {
        if self.is_empty() {
            return self.start_new_tree(bpm, key, value);
        }
        self.insert_into_leaf(bpm, key, value)
    }

    fn start_new_tree(&mut self, bpm: &mut BufferPoolManager, key: &[u8], value: RowId) -> Result<()> {
        let (pid, frame) = bpm.new_page()?;
        {
            let buf = bpm.frame_data_mut(frame);
            let mut leaf = LeafPage::init(buf, self.key_size, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value);
        }
        bpm.unpin_page(pid, true)?;
        self.root_page_id = pid;
        roots::update_root(bpm, self.index_id, pid)?;
        Ok(())
    }

    fn insert_into_leaf(&mut self, bpm: &mut BufferPoolManager, key: &[u8], value: RowId) -> Result<()> {
        let leaf_pid = self.find_leaf(bpm, key)?;
        let mut buf = self.load_buf(bpm, leaf_pid)?;

        if LeafPage::new(&mut buf, self.key_size).lookup(key).is_some() {
            return Err(Error::DuplicateKey);
        }

        let new_size = LeafPage::new(&mut buf, self.key_size).insert(key, value);

        let mut merge_right: Option<(Vec<u8>, PageId)> = None;
        if new_size > self.leaf_max_size {
            let (new_pid, frame) = bpm.new_page()?;
            let parent_of_leaf = LeafPage::new(&mut buf, self.key_size).parent_page_id();
            {
                let new_buf = bpm.frame_data_mut(frame);
                let mut new_leaf = LeafPage::init(new_buf, self.key_size, parent_of_leaf, self.leaf_max_size);
                LeafPage::new(&mut buf, self.key_size).move_half_to(&mut new_leaf);
                new_leaf.set_next_page_id(LeafPage::new(&mut buf, self.key_size).next_page_id());
                let right_key = new_leaf.key_at(0).to_vec();
                merge_right = Some((right_key, new_pid));
            }
            bpm.unpin_page(new_pid, true)?;
            LeafPage::new(&mut buf, self.key_size).set_next_page_id(new_pid);
        }

        let mut left_key = LeafPage::new(&mut buf, self.key_size).key_at(0).to_vec();
        let mut merge_left = leaf_pid;
        let mut cur_parent = LeafPage::new(&mut buf, self.key_size).parent_page_id();
        self.store_buf(bpm, leaf_pid, &buf)?;

        self.propagate_insert(bpm, cur_parent, &mut merge_left, &mut left_key, &mut merge_right)
    }

    /// Walk up from a just-split (or just-updated) child, rewriting the
    /// parent's boundary key and inserting/propagating a split sibling as
    /// needed, until no ancestor needs to change.
    fn propagate_insert(
        &mut self,
        bpm: &mut BufferPoolManager,
        mut cur_parent: PageId,
        merge_left: &mut PageId,
        left_key: &mut Vec<u8>,
        merge_right: &mut Option<(Vec<u8>, PageId)>,
    ) -> Result<()> {
        loop {
            if cur_parent == INVALID_PAGE_ID {
                if let Some((right_key, right_pid)) = merge_right.take() {
                    let (new_root_pid, frame) = bpm.new_page()?;
                    {
                        let buf = bpm.frame_data_mut(frame);
                        let mut root = InternalPage::init(buf, self.key_size, INVALID_PAGE_ID, self.internal_max_size);
                        root.populate_new_root(left_key, *merge_left, &right_key, right_pid);
                    }
                    bpm.unpin_page(new_root_pid, true)?;
                    self.set_parent(bpm, *merge_left, new_root_pid)?;
                    self.set_parent(bpm, right_pid, new_root_pid)?;
                    self.root_page_id = new_root_pid;
                    roots::update_root(bpm, self.index_id, new_root_pid)?;
                }
                return Ok(());
            }

            let mut buf = self.load_buf(bpm, cur_parent)?;
            let idx = InternalPage::new(&mut buf, self.key_size)
                .value_index(*merge_left)
                .expect("node must be a child of its recorded parent");
            InternalPage::new(&mut buf, self.key_size).set_key_at(idx, left_key);

            if let Some((right_key, right_pid)) = merge_right.take() {
                let new_size = InternalPage::new(&mut buf, self.key_size).insert_node_after(*merge_left, &right_key, right_pid);
                self.set_parent(bpm, right_pid, cur_parent)?;

                if new_size > self.internal_max_size {
                    let (sibling_pid, frame) = bpm.new_page()?;
                    let parent_of_parent = InternalPage::new(&mut buf, self.key_size).parent_page_id();
                    let moved;
                    {
                        let sib_buf = bpm.frame_data_mut(frame);
                        let mut sibling = InternalPage::init(sib_buf, self.key_size, parent_of_parent, self.internal_max_size);
                        moved = InternalPage::new(&mut buf, self.key_size).move_half_to(&mut sibling);
                        *merge_right = Some((sibling.key_at(0).to_vec(), sibling_pid));
                    }
                    bpm.unpin_page(sibling_pid, true)?;
                    for child in moved {
                        self.set_parent(bpm, child, sibling_pid)?;
                    }
                } else {
                    *merge_right = None;
                }
            }

            *left_key = InternalPage::new(&mut buf, self.key_size).key_at(0).to_vec();
            let next_parent = InternalPage::new(&mut buf, self.key_size).parent_page_id();
            *merge_left = cur_parent;
            self.store_buf(bpm, cur_parent, &buf)?;
            cur_parent = next_parent;
        }
    }

    /// Remove `key`. A no-op (not an error) if `key` is absent, matching the
    /// original's silent-ignore behavior.
    pub fn remove(&mut self, bpm: &mut BufferPoolManager, key: &[u8]) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let leaf_pid = self.find_leaf(bpm, key)?;
        let mut buf = self.load_buf(bpm, leaf_pid)?;
        if !LeafPage::new(&mut buf, self.key_size).remove_and_delete_record(key) {
            return Ok(());
        }
        self.store_buf(bpm, leaf_pid, &buf)?;

        if self.coalesce_or_redistribute_leaf(bpm, leaf_pid)? {
            bpm.delete_page(leaf_pid)?;
        }
        Ok(())
    }

    fn coalesce_or_redistribute_leaf(&mut self, bpm: &mut BufferPoolManager, pid: PageId) -> Result<bool> {
        let mut buf = self.load_buf(bpm, pid)?;
        let parent_pid = LeafPage::new(&mut buf, self.key_size).parent_page_id();

        if parent_pid == INVALID_PAGE_ID {
            return if LeafPage::new(&mut buf, self.key_size).size() == 0 {
                self.root_page_id = INVALID_PAGE_ID;
                roots::update_root(bpm, self.index_id, INVALID_PAGE_ID)?;
                Ok(true)
            } else {
                Ok(false)
            };
        }

        let min_size = (self.leaf_max_size / 2).max(1);
        let size = LeafPage::new(&mut buf, self.key_size).size();
        let node_key0 = LeafPage::new(&mut buf, self.key_size).key_at(0).to_vec();

        let mut parent_buf = self.load_buf(bpm, parent_pid)?;
        let idx = InternalPage::new(&mut parent_buf, self.key_size)
            .value_index(pid)
            .expect("node must be a child of its recorded parent");
        InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx, &node_key0);
        let parent_size = InternalPage::new(&mut parent_buf, self.key_size).size();

        if size >= min_size {
            self.store_buf(bpm, parent_pid, &parent_buf)?;
            if idx == 0 {
                return self.propagate_rewrite(bpm, parent_pid);
            }
            return Ok(false);
        }

        if idx + 1 < parent_size {
            let right_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx + 1);
            let mut right_buf = self.load_buf(bpm, right_pid)?;
            let right_size = LeafPage::new(&mut right_buf, self.key_size).size();

            if (size + right_size) / 2 >= min_size {
                LeafPage::new(&mut right_buf, self.key_size).move_first_to_end_of(&mut LeafPage::new(&mut buf, self.key_size));
                let new_right_key0 = LeafPage::new(&mut right_buf, self.key_size).key_at(0).to_vec();
                InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx + 1, &new_right_key0);
                self.store_buf(bpm, pid, &buf)?;
                self.store_buf(bpm, right_pid, &right_buf)?;
                self.store_buf(bpm, parent_pid, &parent_buf)?;
                if idx == 0 {
                    return self.propagate_rewrite(bpm, parent_pid);
                }
                return Ok(false);
            }
        }

        if idx > 0 {
            let left_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx - 1);
            let mut left_buf = self.load_buf(bpm, left_pid)?;
            let left_size = LeafPage::new(&mut left_buf, self.key_size).size();

            if (size + left_size) / 2 >= min_size {
                LeafPage::new(&mut left_buf, self.key_size).move_last_to_front_of(&mut LeafPage::new(&mut buf, self.key_size));
                let new_node_key0 = LeafPage::new(&mut buf, self.key_size).key_at(0).to_vec();
                InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx, &new_node_key0);
                self.store_buf(bpm, pid, &buf)?;
                self.store_buf(bpm, left_pid, &left_buf)?;
                self.store_buf(bpm, parent_pid, &parent_buf)?;
                return Ok(false);
            }
        }

        if idx + 1 < parent_size {
            let right_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx + 1);
            let mut right_buf = self.load_buf(bpm, right_pid)?;
            {
                let next = LeafPage::new(&mut right_buf, self.key_size).next_page_id();
                let mut node = LeafPage::new(&mut buf, self.key_size);
                LeafPage::new(&mut right_buf, self.key_size).move_all_to(&mut node);
                node.set_next_page_id(next);
            }
            InternalPage::new(&mut parent_buf, self.key_size).remove(idx + 1);
            self.store_buf(bpm, pid, &buf)?;
            self.store_buf(bpm, parent_pid, &parent_buf)?;
            bpm.delete_page(right_pid)?;

            if self.coalesce_or_redistribute_internal(bpm, parent_pid)? {
                bpm.delete_page(parent_pid)?;
            }
            return Ok(false);
        }

        debug_assert!(idx > 0, "a leaf with no right sibling must have a left one if it is not the root's only child");
        let left_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx - 1);
        let mut left_buf = self.load_buf(bpm, left_pid)?;
        {
            let next = LeafPage::new(&mut buf, self.key_size).next_page_id();
            let mut left = LeafPage::new(&mut left_buf, self.key_size);
            LeafPage::new(&mut buf, self.key_size).move_all_to(&mut left);
            left.set_next_page_id(next);
        }
        InternalPage::new(&mut parent_buf, self.key_size).remove(idx);
        self.store_buf(bpm, left_pid, &left_buf)?;
        self.store_buf(bpm, parent_pid, &parent_buf)?;

        if self.coalesce_or_redistribute_internal(bpm, parent_pid)? {
            bpm.delete_page(parent_pid)?;
        }
        Ok(true)
    }

    fn propagate_rewrite(&mut self, bpm: &mut BufferPoolManager, pid: PageId) -> Result<bool> {
        // The node at `pid` did not underflow, but its own leftmost key may
        // have just changed (it was index 0 of its parent); that parent's
        // boundary key in turn needs rewriting all the way up, with no
        // splitting or merging involved.
        let buf = self.load_buf(bpm, pid)?;
        let parent_pid = read_parent_id(&buf);
        if parent_pid == INVALID_PAGE_ID {
            return Ok(false);
        }
        let key0 = {
            let mut buf = buf;
            match read_page_type_raw(&buf) {
                PageType::Leaf => LeafPage::new(&mut buf, self.key_size).key_at(0).to_vec(),
                _ => InternalPage::new(&mut buf, self.key_size).key_at(0).to_vec(),
            }
        };
        let mut parent_buf = self.load_buf(bpm, parent_pid)?;
        let idx = InternalPage::new(&mut parent_buf, self.key_size)
            .value_index(pid)
            .expect("node must be a child of its recorded parent");
        InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx, &key0);
        self.store_buf(bpm, parent_pid, &parent_buf)?;
        if idx == 0 {
            return self.propagate_rewrite(bpm, parent_pid);
        }
        Ok(false)
    }

    fn coalesce_or_redistribute_internal(&mut self, bpm: &mut BufferPoolManager, pid: PageId) -> Result<bool> {
        let mut buf = self.load_buf(bpm, pid)?;
        let parent_pid = InternalPage::new(&mut buf, self.key_size).parent_page_id();

        if parent_pid == INVALID_PAGE_ID {
            let size = InternalPage::new(&mut buf, self.key_size).size();
            if size == 1 {
                let only_child = InternalPage::new(&mut buf, self.key_size).remove_and_return_only_child();
                self.set_parent(bpm, only_child, INVALID_PAGE_ID)?;
                self.root_page_id = only_child;
                roots::update_root(bpm, self.index_id, only_child)?;
                return Ok(true);
            }
            return Ok(false);
        }

        let min_size = (self.internal_max_size / 2).max(2);
        let size = InternalPage::new(&mut buf, self.key_size).size();
        let node_key0 = InternalPage::new(&mut buf, self.key_size).key_at(0).to_vec();

        let mut parent_buf = self.load_buf(bpm, parent_pid)?;
        let idx = InternalPage::new(&mut parent_buf, self.key_size)
            .value_index(pid)
            .expect("node must be a child of its recorded parent");
        InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx, &node_key0);
        let parent_size = InternalPage::new(&mut parent_buf, self.key_size).size();

        if size >= min_size {
            self.store_buf(bpm, parent_pid, &parent_buf)?;
            if idx == 0 {
                return self.propagate_rewrite(bpm, parent_pid);
            }
            return Ok(false);
        }

        if idx + 1 < parent_size {
            let right_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx + 1);
            let mut right_buf = self.load_buf(bpm, right_pid)?;
            let right_size = InternalPage::new(&mut right_buf, self.key_size).size();

            if (size + right_size) / 2 >= min_size {
                let moved = InternalPage::new(&mut right_buf, self.key_size).move_first_to_end_of(&mut InternalPage::new(&mut buf, self.key_size));
                self.set_parent(bpm, moved, pid)?;
                let new_right_key0 = InternalPage::new(&mut right_buf, self.key_size).key_at(0).to_vec();
                InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx + 1, &new_right_key0);
                self.store_buf(bpm, pid, &buf)?;
                self.store_buf(bpm, right_pid, &right_buf)?;
                self.store_buf(bpm, parent_pid, &parent_buf)?;
                if idx == 0 {
                    return self.propagate_rewrite(bpm, parent_pid);
                }
                return Ok(false);
            }
        }

        if idx > 0 {
            let left_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx - 1);
            let mut left_buf = self.load_buf(bpm, left_pid)?;
            let left_size = InternalPage::new(&mut left_buf, self.key_size).size();

            if (size + left_size) / 2 >= min_size {
                let moved = InternalPage::new(&mut left_buf, self.key_size).move_last_to_front_of(&mut InternalPage::new(&mut buf, self.key_size));
                self.set_parent(bpm, moved, pid)?;
                let new_node_key0 = InternalPage::new(&mut buf, self.key_size).key_at(0).to_vec();
                InternalPage::new(&mut parent_buf, self.key_size).set_key_at(idx, &new_node_key0);
                self.store_buf(bpm, pid, &buf)?;
                self.store_buf(bpm, left_pid, &left_buf)?;
                self.store_buf(bpm, parent_pid, &parent_buf)?;
                return Ok(false);
            }
        }

        if idx + 1 < parent_size {
            let right_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx + 1);
            let mut right_buf = self.load_buf(bpm, right_pid)?;
            let moved = {
                let mut node = InternalPage::new(&mut buf, self.key_size);
                InternalPage::new(&mut right_buf, self.key_size).move_all_to(&mut node)
            };
            for child in moved {
                self.set_parent(bpm, child, pid)?;
            }
            InternalPage::new(&mut parent_buf, self.key_size).remove(idx + 1);
            self.store_buf(bpm, pid, &buf)?;
            self.store_buf(bpm, parent_pid, &parent_buf)?;
            bpm.delete_page(right_pid)?;

            if self.coalesce_or_redistribute_internal(bpm, parent_pid)? {
                bpm.delete_page(parent_pid)?;
            }
            return Ok(false);
        }

        let left_pid = InternalPage::new(&mut parent_buf, self.key_size).value_at(idx - 1);
        let mut left_buf = self.load_buf(bpm, left_pid)?;
        let moved = {
            let mut left = InternalPage::new(&mut left_buf, self.key_size);
            InternalPage::new(&mut buf, self.key_size).move_all_to(&mut left)
        };
        for child in moved {
            self.set_parent(bpm, child, left_pid)?;
        }
        InternalPage::new(&mut parent_buf, self.key_size).remove(idx);
        self.store_buf(bpm, left_pid, &left_buf)?;
        self.store_buf(bpm, parent_pid, &parent_buf)?;

        if self.coalesce_or_redistribute_internal(bpm, parent_pid)? {
            bpm.delete_page(parent_pid)?;
        }
        Ok(true)
    }

    /// Leaf page id holding the smallest key in the tree, or `None` if empty.
    pub(crate) fn leftmost_leaf(&self, bpm: &mut BufferPoolManager) -> Result<Option<PageId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut cur = self.root_page_id;
        loop {
            let mut buf = self.load_buf(bpm, cur)?;
            if read_page_type_raw(&buf) != PageType::Internal {
                return Ok(Some(cur));
            }
            cur = InternalPage::new(&mut buf, self.key_size).value_at(0);
        }
    }

    /// Leaf page id and slot that would hold `key`, used to position a range
    /// scan cursor.
    pub(crate) fn locate(&self, bpm: &mut BufferPoolManager, key: &[u8]) -> Result<Option<(PageId, u32)>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_pid = self.find_leaf(bpm, key)?;
        let mut buf = self.load_buf(bpm, leaf_pid)?;
        let slot = LeafPage::new(&mut buf, self.key_size).key_index(key);
        Ok(Some((leaf_pid, slot)))
    }

    /// Delete every page belonging to this tree and drop its directory
    /// entry. The tree must not be used afterward.
    pub fn destroy(&mut self, bpm: &mut BufferPoolManager) -> Result<()> {
        if !self.is_empty() {
            self.destroy_subtree(bpm, self.root_page_id)?;
        }
        roots::delete_root(bpm, self.index_id)?;
        self.root_page_id = INVALID_PAGE_ID;
        Ok(())
    }

    fn destroy_subtree(&self, bpm: &mut BufferPoolManager, pid: PageId) -> Result<()> {
        let mut buf = self.load_buf(bpm, pid)?;
        if read_page_type_raw(&buf) == PageType::Internal {
            let page = InternalPage::new(&mut buf, self.key_size);
            let children: Vec<PageId> = (0..page.size()).map(|i| page.value_at(i)).collect();
            for child in children {
                self.destroy_subtree(bpm, child)?;
            }
        }
        bpm.delete_page(pid)?;
        Ok(())
    }
}

fn read_parent_id(buf: &[u8; PAGE_SIZE]) -> PageId {
    super::page::read_parent_id_raw(buf)
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
        let v = (n as u32) ^ 0x8000_0000;
        v.to_be_bytes().to_vec()
    }

    #[test]
    fn insert_and_get_value_small_tree() {
        let mut bpm = bootstrap();
        let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
        for i in 0..30 {
            tree.insert(&mut bpm, &key(i), RowId::new(i, 0)).unwrap();
        }
        for i in 0..30 {
            assert_eq!(tree.get_value(&mut bpm, &key(i)).unwrap(), Some(RowId::new(i, 0)));
        }
        assert_eq!(tree.get_value(&mut bpm, &key(999)).unwrap(), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut bpm = bootstrap();
        let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
        tree.insert(&mut bpm, &key(1), RowId::new(1, 0)).unwrap();
        assert!(matches!(tree.insert(&mut bpm, &key(1), RowId::new(2, 0)), Err(Error::DuplicateKey)));
    }

    #[test]
    fn insert_then_remove_every_key_empties_tree() {
        let mut bpm = bootstrap();
        let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
        let n = 200;
        for i in 0..n {
            tree.insert(&mut bpm, &key(i), RowId::new(i, 0)).unwrap();
        }
        for i in 0..n {
            assert_eq!(tree.get_value(&mut bpm, &key(i)).unwrap(), Some(RowId::new(i, 0)));
        }
        for i in 0..n {
            tree.remove(&mut bpm, &key(i)).unwrap();
            assert_eq!(tree.get_value(&mut bpm, &key(i)).unwrap(), None);
            for j in i + 1..n {
                assert_eq!(tree.get_value(&mut bpm, &key(j)).unwrap(), Some(RowId::new(j, 0)), "key {j} lost after removing {i}");
            }
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn removing_missing_key_is_a_silent_no_op() {
        let mut bpm = bootstrap();
        let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
        tree.insert(&mut bpm, &key(1), RowId::new(1, 0)).unwrap();
        tree.remove(&mut bpm, &key(999)).unwrap();
        assert_eq!(tree.get_value(&mut bpm, &key(1)).unwrap(), Some(RowId::new(1, 0)));
    }

    #[test]
    fn reopening_tree_resumes_at_persisted_root() {
        let mut bpm = bootstrap();
        {
            let mut tree = BPlusTree::with_max_sizes(&mut bpm, 3, 4, 4, 4).unwrap();
            for i in 0..40 {
                tree.insert(&mut bpm, &key(i), RowId::new(i, 0)).unwrap();
            }
        }
        let tree = BPlusTree::with_max_sizes(&mut bpm, 3, 4, 4, 4).unwrap();
        assert!(!tree.is_empty());
        assert_eq!(tree.get_value(&mut bpm, &key(10)).unwrap(), Some(RowId::new(10, 0)));
    }
}
