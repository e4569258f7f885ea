//! A single table's persisted metadata: its name, schema, and the page id
//! where its row heap begins.
//!
//! Grounded on `src/catalog/table.cpp`'s `TableMetadata`.

use crate::config::PAGE_SIZE;
use crate::disk::PageId;
use crate::error::{Error, Result};
use crate::record::Schema;

const TABLE_META_MAGIC: u32 = 0x5441_424c; // "TABL"

/// A table's durable metadata, as stored on its own dedicated page.
pub(crate) struct TableMetadata {
    pub(crate) table_id: u32,
    pub(crate) name: String,
    pub(crate) root_page_id: PageId,
    pub(crate) schema: Schema,
}

impl TableMetadata {
    pub(crate) fn encode(&self) -> Result<[u8; PAGE_SIZE]> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&TABLE_META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.table_id.to_le_bytes());
        buf.extend_from_slice(&self.root_page_id.to_le_bytes());
        buf.extend_from_slice(&(self.name.len() as u64).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        self.schema.serialize_to(&mut buf);
        if buf.len() > PAGE_SIZE {
            return Err(Error::Corrupt(format!("table metadata for {} exceeds one page", self.name)));
        }
        let mut page = [0u8; PAGE_SIZE];
        page[..buf.len()].copy_from_slice(&buf);
        Ok(page)
    }

    pub(crate) fn decode(buf: &[u8; PAGE_SIZE]) -> Result<Self> {
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        if magic != TABLE_META_MAGIC {
            return Err(Error::InvalidMagic { what: "table metadata" });
        }
        off += 4;
        let table_id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let root_page_id = PageId::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let name_len = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
        off += 8;
        let name = String::from_utf8_lossy(&buf[off..off + name_len]).into_owned();
        off += name_len;
        let (schema, _) = Schema::deserialize_from(&buf[off..])?;
        Ok(Self { table_id, name, root_page_id, schema })
    }
}
