//! Ordered list of [`Column`]s making up a table or index-key tuple shape.
//!
//! Grounded on `src/record/schema.cpp`: `magic, column_count, columns...`.

use crate::error::{Error, Result};
use crate::record::Column;

const SCHEMA_MAGIC: u32 = 0x5343_4845; // "SCHE"

/// The column layout shared by every row of a table, or by an index key.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema from its columns, in table order.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// The schema's columns, in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Look up a column's position by name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Build the sub-schema consisting of the named columns, in the given
    /// order (used to derive an index's key schema from its table schema).
    pub fn project(&self, names: &[String]) -> Result<Schema> {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let idx = self.column_index(name)?;
            let mut col = self.columns[idx].clone();
            col = Column::new(col.name().to_string(), col.data_type(), i as u32, col.nullable(), col.unique());
            columns.push(col);
        }
        Ok(Schema::new(columns))
    }

    /// Serialized size in bytes.
    pub fn serialized_size(&self) -> u32 {
        4 + 8 + self.columns.iter().map(Column::serialized_size).sum::<u32>()
    }

    pub(crate) fn serialize_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&SCHEMA_MAGIC.to_le_bytes());
        buf.extend_from_slice(&(self.columns.len() as u64).to_le_bytes());
        for c in &self.columns {
            c.serialize_to(buf);
        }
    }

    pub(crate) fn deserialize_from(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        if magic != SCHEMA_MAGIC {
            return Err(Error::InvalidMagic { what: "schema" });
        }
        off += 4;
        let count = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap()) as usize;
        off += 8;
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let (col, consumed) = Column::deserialize_from(&buf[off..])?;
            off += consumed;
            columns.push(col);
        }
        Ok((Self { columns }, off))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataType;

    fn sample() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int, 0, false, true),
            Column::new("name", DataType::Char(16), 1, true, false),
        ])
    }

    #[test]
    fn schema_roundtrips() {
        let s = sample();
        let mut buf = Vec::new();
        s.serialize_to(&mut buf);
        assert_eq!(buf.len(), s.serialized_size() as usize);
        let (back, consumed) = Schema::deserialize_from(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(back, s);
    }

    #[test]
    fn project_builds_key_schema_in_requested_order() {
        let s = sample();
        let key_schema = s.project(&["name".to_string(), "id".to_string()]).unwrap();
        assert_eq!(key_schema.columns()[0].name(), "name");
        assert_eq!(key_schema.columns()[1].name(), "id");
    }
}
