//! The catalog's top-level directory: id counters plus `table_id ->
//! meta_page_id` and `index_id -> meta_page_id` maps, stored on the single
//! fixed page `CATALOG_META_PAGE_ID`.
//!
//! Grounded on `src/catalog/catalog.cpp`'s `CatalogMeta`. One deliberate fix
//! relative to that original (spec-documented fragile point): `next_index_id`
//! is tracked as its own counter here, not derived from the table id
//! counter, so creating tables and creating indexes can never collide on an
//! id.

use crate::buffer::BufferPoolManager;
use crate::config::{CATALOG_META_PAGE_ID, PAGE_SIZE};
use crate::disk::PageId;
use crate::error::Result;

const CATALOG_META_MAGIC: u32 = 0x4341_544c; // "CATL"

pub(crate) struct CatalogMeta {
    pub(crate) next_table_id: u32,
    pub(crate) next_index_id: u32,
    pub(crate) tables: Vec<(u32, PageId)>,
    pub(crate) indexes: Vec<(u32, PageId)>,
}

impl CatalogMeta {
    pub(crate) fn empty() -> Self {
        Self { next_table_id: 0, next_index_id: 0, tables: Vec::new(), indexes: Vec::new() }
    }

    fn encode(&self) -> [u8; PAGE_SIZE] {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&CATALOG_META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.next_table_id.to_le_bytes());
        buf.extend_from_slice(&self.next_index_id.to_le_bytes());
        buf.extend_from_slice(&(self.tables.len() as u32).to_le_bytes());
        for (id, page) in &self.tables {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&page.to_le_bytes());
        }
        buf.extend_from_slice(&(self.indexes.len() as u32).to_le_bytes());
        for (id, page) in &self.indexes {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&page.to_le_bytes());
        }
        assert!(buf.len() <= PAGE_SIZE, "catalog directory overflowed one page");
        let mut out = [0u8; PAGE_SIZE];
        out[..buf.len()].copy_from_slice(&buf);
        out
    }

    fn decode(buf: &[u8; PAGE_SIZE]) -> Option<Self> {
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        if magic != CATALOG_META_MAGIC {
            return None;
        }
        off += 4;
        let next_table_id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let next_index_id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let table_count = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        let mut tables = Vec::with_capacity(table_count);
        for _ in 0..table_count {
            let id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            let page = PageId::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
            tables.push((id, page));
            off += 8;
        }
        let index_count = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        let mut indexes = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            let id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            let page = PageId::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
            indexes.push((id, page));
            off += 8;
        }
        Some(Self { next_table_id, next_index_id, tables, indexes })
    }

    /// Load the directory, or `None` if the database file is brand new and
    /// this page has never been written.
    pub(crate) fn load(bpm: &mut BufferPoolManager) -> Result<Option<Self>> {
        let frame = bpm.fetch_page(CATALOG_META_PAGE_ID)?;
        let buf = *bpm.frame_data(frame);
        bpm.unpin_page(CATALOG_META_PAGE_ID, false)?;
        Ok(Self::decode(&buf))
    }

    pub(crate) fn store(&self, bpm: &mut BufferPoolManager) -> Result<()> {
        let frame = bpm.fetch_page(CATALOG_META_PAGE_ID)?;
        *bpm.frame_data_mut(frame) = self.encode();
        bpm.unpin_page(CATALOG_META_PAGE_ID, true)?;
        Ok(())
    }
}
