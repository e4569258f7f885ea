//! A tuple: an ordered list of [`Field`]s plus the [`RowId`] identifying its
//! physical slot.
//!
//! Grounded on `src/record/row.cpp`: `magic, field_count, rid, null_bitmap,
//! fields...`, where the null bitmap's bit is *set* when the field is
//! **not** null (the original's inverted convention, preserved here).

use crate::error::{Error, Result};
use crate::record::{Field, RowId, Schema};

const ROW_MAGIC: u32 = 0x524f_5721; // "ROW!"

/// A tuple's values, interpreted against a [`Schema`] supplied by the
/// caller (table heap or B+ tree key codec) at (de)serialize time.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<Field>,
    rid: RowId,
}

impl Row {
    /// Build a row from its field values; `rid` defaults to
    /// [`RowId::INVALID`] until the row is actually inserted.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, rid: RowId::INVALID }
    }

    /// The row's field values, in schema order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Value at `index`.
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// This row's physical location.
    pub fn rid(&self) -> RowId {
        self.rid
    }

    /// Set this row's physical location, e.g. once assigned by `TableHeap::insert`.
    pub fn set_rid(&mut self, rid: RowId) {
        self.rid = rid;
    }

    /// Serialized size in bytes, given the schema describing `self.fields`.
    pub fn serialized_size(&self, schema: &Schema) -> usize {
        let bitmap_bytes = self.fields.len().div_ceil(8);
        let field_bytes: usize = self
            .fields
            .iter()
            .zip(schema.columns())
            .map(|(f, c)| if f.is_null() { 0 } else { Field::serialized_size(c.data_type()) as usize })
            .sum();
        4 + 8 + 8 + bitmap_bytes + field_bytes
    }

    /// Encode this row against `schema`.
    pub fn serialize_to(&self, schema: &Schema) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size(schema));
        buf.extend_from_slice(&ROW_MAGIC.to_le_bytes());
        buf.extend_from_slice(&(self.fields.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.rid.encode());

        let bitmap_bytes = self.fields.len().div_ceil(8);
        let mut bitmap = vec![0u8; bitmap_bytes];
        for (i, f) in self.fields.iter().enumerate() {
            if !f.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        buf.extend_from_slice(&bitmap);

        for (f, c) in self.fields.iter().zip(schema.columns()) {
            f.serialize_to(c.data_type().width(), &mut buf);
        }
        buf
    }

    /// Decode a row from `buf` against `schema`.
    pub fn deserialize_from(buf: &[u8], schema: &Schema) -> Result<Self> {
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        if magic != ROW_MAGIC {
            return Err(Error::InvalidMagic { what: "row" });
        }
        off += 4;
        let count = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
        off += 8;
        let rid = RowId::decode(&buf[off..off + 8]);
        off += 8;

        let bitmap_bytes = count.div_ceil(8);
        let bitmap = &buf[off..off + bitmap_bytes];
        off += bitmap_bytes;

        let mut fields = Vec::with_capacity(count);
        for (i, col) in schema.columns().iter().enumerate().take(count) {
            let is_null = bitmap[i / 8] & (1 << (i % 8)) == 0;
            let field = Field::deserialize_from(&buf[off..], col.data_type(), is_null)?;
            if !is_null {
                off += Field::serialized_size(col.data_type()) as usize;
            }
            fields.push(field);
        }

        let mut row = Row::new(fields);
        row.set_rid(rid);
        Ok(row)
    }
}
