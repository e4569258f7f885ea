//! A single index's persisted metadata: which table and columns it covers.
//!
//! Grounded on `src/catalog/indexes.cpp`'s `IndexMetadata`.

use crate::config::PAGE_SIZE;
use crate::error::{Error, Result};

const INDEX_META_MAGIC: u32 = 0x4958_4944; // "IXID"

/// An index's durable metadata, as stored on its own dedicated page. The
/// key's encoded width is not persisted here; it is recomputed from the
/// table's current schema and `key_columns` whenever the index is loaded,
/// so the two always agree.
pub(crate) struct IndexMetadata {
    pub(crate) index_id: u32,
    pub(crate) name: String,
    pub(crate) table_id: u32,
    pub(crate) key_columns: Vec<String>,
}

impl IndexMetadata {
    pub(crate) fn encode(&self) -> Result<[u8; PAGE_SIZE]> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&INDEX_META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.index_id.to_le_bytes());
        buf.extend_from_slice(&self.table_id.to_le_bytes());
        buf.extend_from_slice(&(self.name.len() as u64).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&(self.key_columns.len() as u64).to_le_bytes());
        for col in &self.key_columns {
            buf.extend_from_slice(&(col.len() as u64).to_le_bytes());
            buf.extend_from_slice(col.as_bytes());
        }
        if buf.len() > PAGE_SIZE {
            return Err(Error::Corrupt(format!("index metadata for {} exceeds one page", self.name)));
        }
        let mut page = [0u8; PAGE_SIZE];
        page[..buf.len()].copy_from_slice(&buf);
        Ok(page)
    }

    pub(crate) fn decode(buf: &[u8; PAGE_SIZE]) -> Result<Self> {
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        if magic != INDEX_META_MAGIC {
            return Err(Error::InvalidMagic { what: "index metadata" });
        }
        off += 4;
        let index_id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let table_id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let name_len = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
        off += 8;
        let name = String::from_utf8_lossy(&buf[off..off + name_len]).into_owned();
        off += name_len;
        let col_count = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
        off += 8;
        let mut key_columns = Vec::with_capacity(col_count);
        for _ in 0..col_count {
            let len = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
            off += 8;
            key_columns.push(String::from_utf8_lossy(&buf[off..off + len]).into_owned());
            off += len;
        }
        Ok(Self { index_id, name, table_id, key_columns })
    }
}
