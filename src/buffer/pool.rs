//! Pin-counted, LRU-backed page cache sitting in front of [`DiskManager`].
//!
//! Grounded on `src/buffer/buffer_pool_manager.cpp`. Two fragile points
//! documented there are preserved deliberately:
//!
//! - [`BufferPoolManager::new_page`] returns a frame whose pin count is
//!   `0`, not `1`. Callers that just created a page must still issue the
//!   matching `unpin_page` they would for a fetched page, even though the
//!   frame briefly looks unpinned right after creation; see the doc comment
//!   on that method.
//! - [`BufferPoolManager::fetch_page`]'s victim path flushes the evicted
//!   frame's *old* page id (while the frame still holds the old content),
//!   only then resets the frame's memory and loads the new page's bytes.
//!   Flushing after the reset would silently write zeroed garbage over the
//!   evicted page.

use std::collections::HashMap;

use log::{debug, trace, warn};

use super::replacer::LruReplacer;
use super::FrameId;
use crate::config::PAGE_SIZE;
use crate::disk::{DiskManager, PageId};
use crate::error::{Error, Result};

struct Frame {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Frame {
    fn new() -> Self {
        Self {
            page_id: crate::config::INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }
}

/// Fixed-size pool of page frames backed by a [`DiskManager`].
pub struct BufferPoolManager {
    disk_manager: DiskManager,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    replacer: LruReplacer,
}

impl BufferPoolManager {
    /// Build a pool of `pool_size` frames over `disk_manager`.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..pool_size).collect();
        Self {
            disk_manager,
            frames,
            page_table: HashMap::new(),
            free_list,
            replacer: LruReplacer::new(pool_size),
        }
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    fn pick_victim(&mut self) -> Option<FrameId> {
        if let Some(f) = self.free_list.pop() {
            return Some(f);
        }
        self.replacer.victim()
    }

    /// Flush the content of `frame_id` to disk if dirty, under its current
    /// page id, then clear its page-table entry. Leaves the frame's memory
    /// untouched; the caller resets it next.
    fn evict(&mut self, frame_id: FrameId) -> Result<()> {
        let old_page_id = self.frames[frame_id].page_id;
        if old_page_id != crate::config::INVALID_PAGE_ID {
            if self.frames[frame_id].is_dirty {
                self.disk_manager.write_page(old_page_id, &self.frames[frame_id].data)?;
            }
            self.page_table.remove(&old_page_id);
        }
        Ok(())
    }

    /// Fetch `page_id` into the pool, pinning it, and return its frame id.
    pub fn fetch_page(&mut self, page_id: PageId) -> Result<FrameId> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin_count += 1;
            self.replacer.pin(frame_id);
            trace!("fetch_page {page_id} hit frame {frame_id}");
            return Ok(frame_id);
        }

        let frame_id = self.pick_victim().ok_or(Error::BufferPoolExhausted)?;
        self.replacer.pin(frame_id);
        self.evict(frame_id)?;

        self.frames[frame_id].data.fill(0);
        self.disk_manager.read_page(page_id, &mut self.frames[frame_id].data)?;
        self.frames[frame_id].page_id = page_id;
        self.frames[frame_id].pin_count = 1;
        self.frames[frame_id].is_dirty = false;
        self.page_table.insert(page_id, frame_id);
        trace!("fetch_page {page_id} loaded into frame {frame_id}");
        Ok(frame_id)
    }

    /// Allocate a brand-new page on disk and bring it into the pool.
    ///
    /// The returned frame's pin count is `0`, matching the original's
    /// documented quirk. Callers must still balance this with exactly one
    /// `unpin_page` call once they are done writing the new page, the same
    /// as they would for a page obtained via `fetch_page`.
    pub fn new_page(&mut self) -> Result<(PageId, FrameId)> {
        let frame_id = self.pick_victim().ok_or(Error::BufferPoolExhausted)?;
        self.replacer.pin(frame_id);
        self.evict(frame_id)?;

        let page_id = self.disk_manager.allocate_page()?;
        self.frames[frame_id].data.fill(0);
        self.frames[frame_id].page_id = page_id;
        self.frames[frame_id].pin_count = 0;
        self.frames[frame_id].is_dirty = false;
        self.page_table.insert(page_id, frame_id);
        debug!("new_page -> {page_id} in frame {frame_id}");
        Ok((page_id, frame_id))
    }

    /// Borrow the raw content of a frame previously obtained from
    /// `fetch_page`/`new_page`.
    pub fn frame_data(&self, frame_id: FrameId) -> &[u8; PAGE_SIZE] {
        &self.frames[frame_id].data
    }

    /// Mutably borrow the raw content of a frame.
    pub fn frame_data_mut(&mut self, frame_id: FrameId) -> &mut [u8; PAGE_SIZE] {
        &mut self.frames[frame_id].data
    }

    /// Decrement the pin count of `page_id`, marking it dirty if `is_dirty`
    /// is set. Once the pin count reaches zero the frame becomes eligible
    /// for eviction.
    pub fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            return Ok(());
        };
        let frame = &mut self.frames[frame_id];
        frame.is_dirty |= is_dirty;
        if frame.pin_count > 0 {
            frame.pin_count -= 1;
            if frame.pin_count == 0 {
                self.replacer.unpin(frame_id);
            }
        }
        Ok(())
    }

    /// Write `page_id`'s frame through to disk if present, leaving it
    /// cached. Returns `false` if the page is not currently in the pool.
    pub fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.disk_manager.write_page(page_id, &self.frames[frame_id].data)?;
        self.frames[frame_id].is_dirty = false;
        Ok(true)
    }

    /// Remove `page_id` from the pool and deallocate it on disk. Refuses
    /// (returns `false`) if the page is currently pinned.
    pub fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            self.disk_manager.deallocate_page(page_id)?;
            return Ok(true);
        };
        if self.frames[frame_id].pin_count > 0 {
            return Ok(false);
        }
        self.replacer.pin(frame_id);
        self.page_table.remove(&page_id);
        self.disk_manager.deallocate_page(page_id)?;
        self.frames[frame_id] = Frame::new();
        self.free_list.push(frame_id);
        Ok(true)
    }

    /// Debug helper: log every frame that is still pinned. Used by tests
    /// asserting that a scenario leaves the pool fully unpinned.
    pub fn check_all_unpinned(&self) -> bool {
        let mut ok = true;
        for (frame_id, frame) in self.frames.iter().enumerate() {
            if frame.pin_count > 0 {
                warn!("frame {frame_id} (page {}) still pinned: count={}", frame.page_id, frame.pin_count);
                ok = false;
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use tempfile::tempdir;

    fn pool(size: usize) -> BufferPoolManager {
        let dir = tempdir().unwrap();
        let dm = DiskManager::open(dir.path().join("db")).unwrap();
        // keep the tempdir alive for the duration of the test by leaking it;
        // acceptable in a test helper.
        std::mem::forget(dir);
        BufferPoolManager::new(size, dm)
    }

    #[test]
    fn new_page_then_fetch_roundtrips_data() {
        let mut bpm = pool(4);
        let (pid, frame) = bpm.new_page().unwrap();
        bpm.frame_data_mut(frame)[0] = 7;
        bpm.unpin_page(pid, true).unwrap();
        bpm.flush_page(pid).unwrap();

        let frame2 = bpm.fetch_page(pid).unwrap();
        assert_eq!(bpm.frame_data(frame2)[0], 7);
        bpm.unpin_page(pid, false).unwrap();
    }

    #[test]
    fn exhausting_pool_with_all_pages_pinned_fails() {
        let mut bpm = pool(2);
        let (_p1, _f1) = bpm.new_page().unwrap();
        bpm.unpin_page(_p1, false).unwrap();
        let (p1, _) = bpm.fetch_page(_p1).map(|f| (_p1, f)).unwrap();
        let _ = p1;
        let (_p2, _f2) = bpm.new_page().unwrap();
        // both frames now pinned (p1 via fetch above, p2 via new_page convention)
        assert!(bpm.new_page().is_err());
    }

    #[test]
    fn churn_through_more_pages_than_frames_evicts_lru() {
        let mut bpm = pool(2);
        let mut pages = Vec::new();
        for i in 0..10 {
            let (pid, frame) = bpm.new_page().unwrap();
            bpm.frame_data_mut(frame)[0] = i as u8;
            bpm.unpin_page(pid, true).unwrap();
            pages.push(pid);
        }
        assert!(bpm.check_all_unpinned());
        let last = *pages.last().unwrap();
        let frame = bpm.fetch_page(last).unwrap();
        assert_eq!(bpm.frame_data(frame)[0], 9);
        bpm.unpin_page(last, false).unwrap();
    }

    #[test]
    fn delete_page_refuses_while_pinned() {
        let mut bpm = pool(2);
        let (pid, _frame) = bpm.new_page().unwrap();
        let _f2 = bpm.fetch_page(pid).unwrap();
        assert!(!bpm.delete_page(pid).unwrap());
        bpm.unpin_page(pid, false).unwrap();
        bpm.unpin_page(pid, false).unwrap();
        assert!(bpm.delete_page(pid).unwrap());
    }
}
