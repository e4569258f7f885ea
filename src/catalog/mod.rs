//! The catalog: durable tracking of tables, their schemas and row heaps,
//! and the secondary indexes built over them.

mod engine;
mod index_info;
mod meta;
mod table_info;

pub use engine::{Catalog, IndexInfo, TableInfo};
