//! LRU victim selection among unpinned frames.
//!
//! Grounded on `src/buffer/lru_replacer.cpp`: a list of unpinned frame ids
//! with the most-recently-unpinned frame at the front and the victim popped
//! from the back.

use std::collections::VecDeque;

use super::FrameId;

/// Tracks which frames are eligible for eviction, in recency order.
pub struct LruReplacer {
    list: VecDeque<FrameId>,
    capacity: usize,
}

impl LruReplacer {
    /// Create a replacer that will never track more than `capacity` frames
    /// (the buffer pool's frame count).
    pub fn new(capacity: usize) -> Self {
        Self { list: VecDeque::with_capacity(capacity), capacity }
    }

    /// Pick and remove the least-recently-used frame, if any are unpinned.
    pub fn victim(&mut self) -> Option<FrameId> {
        self.list.pop_back()
    }

    /// Mark `frame_id` unpinned and eligible for eviction, most-recent first.
    pub fn unpin(&mut self, frame_id: FrameId) {
        if self.list.contains(&frame_id) {
            return;
        }
        if self.list.len() >= self.capacity {
            self.list.pop_back();
        }
        self.list.push_front(frame_id);
    }

    /// Remove `frame_id` from eviction eligibility (it has been pinned).
    pub fn pin(&mut self, frame_id: FrameId) {
        if let Some(pos) = self.list.iter().position(|&f| f == frame_id) {
            self.list.remove(pos);
        }
    }

    /// Number of frames currently eligible for eviction.
    pub fn size(&self) -> usize {
        self.list.len()
    }
}
