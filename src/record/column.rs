//! A single column definition within a [`crate::record::Schema`].
//!
//! Grounded on `src/record/column.cpp`'s magic-prefixed manual layout:
//! `magic, len, table_ind, type, nullable, unique, name_len, name_bytes`.

use crate::error::{Error, Result};
use crate::record::DataType;

const COLUMN_MAGIC: u32 = 0x434f_4c4e; // "COLN"

/// One column of a table or index-key schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    table_index: u32,
    nullable: bool,
    unique: bool,
}

impl Column {
    /// Define a non-`Char` column; its width is derived from `data_type`.
    pub fn new(name: impl Into<String>, data_type: DataType, table_index: u32, nullable: bool, unique: bool) -> Self {
        Self { name: name.into(), data_type, table_index, nullable, unique }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type (and, for `Char`, capacity).
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Position of this column within its owning schema.
    pub fn table_index(&self) -> u32 {
        self.table_index
    }

    /// Whether `NULL` is a legal value for this column.
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Whether this column is declared unique.
    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Serialized size in bytes of this column's own definition (not any
    /// field value stored under it).
    pub fn serialized_size(&self) -> u32 {
        3 * 4 + 1 + 1 + 8 + self.name.len() as u32
    }

    pub(crate) fn serialize_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&COLUMN_MAGIC.to_le_bytes());
        let (len, type_tag) = match self.data_type {
            DataType::Int => (4u32, 0u32),
            DataType::Float => (4u32, 1u32),
            DataType::Char(n) => (n, 2u32),
        };
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&self.table_index.to_le_bytes());
        buf.extend_from_slice(&type_tag.to_le_bytes());
        buf.push(self.nullable as u8);
        buf.push(self.unique as u8);
        buf.extend_from_slice(&(self.name.len() as u64).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
    }

    pub(crate) fn deserialize_from(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        if magic != COLUMN_MAGIC {
            return Err(Error::InvalidMagic { what: "column" });
        }
        off += 4;
        let len = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let table_index = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let type_tag = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let nullable = buf[off] != 0;
        off += 1;
        let unique = buf[off] != 0;
        off += 1;
        let name_len = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
        off += 8;
        let name = String::from_utf8_lossy(&buf[off..off + name_len]).into_owned();
        off += name_len;

        let data_type = match type_tag {
            0 => DataType::Int,
            1 => DataType::Float,
            2 => DataType::Char(len),
            _ => return Err(Error::Corrupt(format!("unknown column type tag {type_tag}"))),
        };

        Ok((Self { name, data_type, table_index, nullable, unique }, off))
    }
}
