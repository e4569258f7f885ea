//! The index-roots directory: a single fixed page (`INDEX_ROOTS_PAGE_ID`)
//! mapping every index's id to its current root page id, so a [`super::BPlusTree`]
//! can be reopened after a restart without scanning the whole catalog.
//!
//! Grounded on the original's `IndexRootsPage`, which plays the same role
//! for its template-instantiated B+ tree indexes.

use crate::buffer::BufferPoolManager;
use crate::config::{INDEX_ROOTS_PAGE_ID, PAGE_SIZE};
use crate::disk::PageId;
use crate::error::Result;

const ROOTS_MAGIC: u32 = 0x524f_4f54; // "ROOT"
const HEADER: usize = 8;
const ENTRY: usize = 8;

fn load(bpm: &mut BufferPoolManager) -> Result<Vec<(u32, PageId)>> {
    let frame = bpm.fetch_page(INDEX_ROOTS_PAGE_ID)?;
    let buf = *bpm.frame_data(frame);
    bpm.unpin_page(INDEX_ROOTS_PAGE_ID, false)?;

    let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    if magic != ROOTS_MAGIC {
        return Ok(Vec::new());
    }
    let count = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let off = HEADER + i * ENTRY;
        let index_id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let root = PageId::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
        out.push((index_id, root));
    }
    Ok(out)
}

fn store(bpm: &mut BufferPoolManager, entries: &[(u32, PageId)]) -> Result<()> {
    let frame = bpm.fetch_page(INDEX_ROOTS_PAGE_ID)?;
    let buf = bpm.frame_data_mut(frame);
    buf.fill(0);
    buf[0..4].copy_from_slice(&ROOTS_MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&(entries.len() as u32).to_le_bytes());
    for (i, (index_id, root)) in entries.iter().enumerate() {
        let off = HEADER + i * ENTRY;
        assert!(off + ENTRY <= PAGE_SIZE, "index-roots page full");
        buf[off..off + 4].copy_from_slice(&index_id.to_le_bytes());
        buf[off + 4..off + 8].copy_from_slice(&root.to_le_bytes());
    }
    bpm.unpin_page(INDEX_ROOTS_PAGE_ID, true)?;
    Ok(())
}

/// This index's current root page id, if it has ever been recorded.
pub(crate) fn get_root(bpm: &mut BufferPoolManager, index_id: u32) -> Result<Option<PageId>> {
    Ok(load(bpm)?.into_iter().find(|&(id, _)| id == index_id).map(|(_, root)| root))
}

/// Record `index_id`'s root page id, inserting a new entry if none existed.
pub(crate) fn update_root(bpm: &mut BufferPoolManager, index_id: u32, root: PageId) -> Result<()> {
    let mut entries = load(bpm)?;
    match entries.iter_mut().find(|(id, _)| *id == index_id) {
        Some(entry) => entry.1 = root,
        None => entries.push((index_id, root)),
    }
    store(bpm, &entries)
}

/// Drop `index_id`'s entry entirely (used when an index is dropped).
pub(crate) fn delete_root(bpm: &mut BufferPoolManager, index_id: u32) -> Result<()> {
    let mut entries = load(bpm)?;
    entries.retain(|(id, _)| *id != index_id);
    store(bpm, &entries)
}
