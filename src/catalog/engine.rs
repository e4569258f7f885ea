//! In-memory catalog of tables and indexes, backed by the on-disk directory
//! in [`super::meta::CatalogMeta`] and one dedicated metadata page per table
//! and per index.
//!
//! Grounded on `src/catalog/catalog.cpp`'s `CatalogManager`.

use std::collections::HashMap;

use log::info;

use crate::buffer::BufferPoolManager;
use crate::disk::PageId;
use crate::error::{Error, Result};
use crate::heap::{TableHeap, TableIterator};
use crate::index::{BPlusTree, IndexIterator, IndexKey};
use crate::record::Schema;

use super::index_info::IndexMetadata;
use super::meta::CatalogMeta;
use super::table_info::TableMetadata;

struct TableEntry {
    meta_page_id: PageId,
    name: String,
    schema: Schema,
    heap: TableHeap,
}

struct IndexEntry {
    meta_page_id: PageId,
    name: String,
    table_id: u32,
    key_columns: Vec<String>,
    tree: BPlusTree,
}

/// The database's directory of tables and indexes: name/id lookups, schema
/// storage, and index population, all kept consistent with their on-disk
/// metadata pages.
pub struct Catalog {
    meta: CatalogMeta,
    tables: HashMap<u32, TableEntry>,
    table_names: HashMap<String, u32>,
    indexes: HashMap<u32, IndexEntry>,
    index_names: HashMap<(u32, String), u32>,
}

/// A table's public identity: its id, name and schema.
pub struct TableInfo<'a> {
    pub table_id: u32,
    pub name: &'a str,
    pub schema: &'a Schema,
}

/// An index's public identity: its id, name and covering columns.
pub struct IndexInfo<'a> {
    pub index_id: u32,
    pub name: &'a str,
    pub table_id: u32,
    pub key_columns: &'a [String],
}

impl Catalog {
    /// Open the catalog, bootstrapping an empty one (and reserving the
    /// fixed catalog-meta / index-roots pages) if this is a brand-new
    /// database file.
    pub fn open(bpm: &mut BufferPoolManager) -> Result<Self> {
        let meta = match CatalogMeta::load(bpm)? {
            Some(meta) => meta,
            None => Self::bootstrap(bpm)?,
        };

        let mut tables = HashMap::new();
        let mut table_names = HashMap::new();
        for &(table_id, meta_page_id) in &meta.tables {
            let info = Self::load_table(bpm, meta_page_id)?;
            table_names.insert(info.name.clone(), table_id);
            tables.insert(
                table_id,
                TableEntry { meta_page_id, name: info.name, schema: info.schema, heap: TableHeap::from_first_page_id(info.root_page_id) },
            );
        }

        let mut indexes = HashMap::new();
        let mut index_names = HashMap::new();
        for &(index_id, meta_page_id) in &meta.indexes {
            let info = Self::load_index(bpm, meta_page_id)?;
            let table_schema = &tables.get(&info.table_id).ok_or_else(|| Error::Corrupt(format!("index {index_id} refers to missing table {}", info.table_id)))?.schema;
            let key_size = key_width(table_schema, &info.key_columns)?;
            let tree = BPlusTree::new(bpm, index_id, key_size)?;
            index_names.insert((info.table_id, info.name.clone()), index_id);
            indexes.insert(index_id, IndexEntry { meta_page_id, name: info.name, table_id: info.table_id, key_columns: info.key_columns, tree });
        }

        Ok(Self { meta, tables, table_names, indexes, index_names })
    }

    fn bootstrap(bpm: &mut BufferPoolManager) -> Result<CatalogMeta> {
        let (catalog_pid, frame) = bpm.new_page()?;
        bpm.frame_data_mut(frame).fill(0);
        bpm.unpin_page(catalog_pid, true)?;
        debug_assert_eq!(catalog_pid, crate::config::CATALOG_META_PAGE_ID, "catalog meta page must be the first page a fresh database allocates");

        let (roots_pid, frame) = bpm.new_page()?;
        bpm.frame_data_mut(frame).fill(0);
        bpm.unpin_page(roots_pid, true)?;
        debug_assert_eq!(roots_pid, crate::config::INDEX_ROOTS_PAGE_ID, "index-roots page must be the second page a fresh database allocates");

        let meta = CatalogMeta::empty();
        meta.store(bpm)?;
        info!("bootstrapped a fresh catalog");
        Ok(meta)
    }

    fn load_table(bpm: &mut BufferPoolManager, meta_page_id: PageId) -> Result<TableMetadata> {
        let frame = bpm.fetch_page(meta_page_id)?;
        let buf = *bpm.frame_data(frame);
        bpm.unpin_page(meta_page_id, false)?;
        TableMetadata::decode(&buf)
    }

    fn load_index(bpm: &mut BufferPoolManager, meta_page_id: PageId) -> Result<IndexMetadata> {
        let frame = bpm.fetch_page(meta_page_id)?;
        let buf = *bpm.frame_data(frame);
        bpm.unpin_page(meta_page_id, false)?;
        IndexMetadata::decode(&buf)
    }

    fn flush_meta(&self, bpm: &mut BufferPoolManager) -> Result<()> {
        self.meta.store(bpm)
    }

    /// Every table currently in the catalog.
    pub fn tables(&self) -> impl Iterator<Item = TableInfo<'_>> {
        self.tables.iter().map(|(&table_id, t)| TableInfo { table_id, name: &t.name, schema: &t.schema })
    }

    /// Look up a table by name.
    pub fn get_table(&self, name: &str) -> Result<TableInfo<'_>> {
        let &table_id = self.table_names.get(name).ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        let t = &self.tables[&table_id];
        Ok(TableInfo { table_id, name: &t.name, schema: &t.schema })
    }

    fn table_entry(&self, table_id: u32) -> Result<&TableEntry> {
        self.tables.get(&table_id).ok_or_else(|| Error::Corrupt(format!("table id {table_id} missing from catalog")))
    }

    /// A handle for scanning/mutating `table_name`'s rows.
    pub fn table_heap(&self, table_name: &str) -> Result<&TableHeap> {
        let &table_id = self.table_names.get(table_name).ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        Ok(&self.table_entry(table_id)?.heap)
    }

    /// Register a new table, allocating its row heap and metadata page.
    pub fn create_table(&mut self, bpm: &mut BufferPoolManager, name: &str, schema: Schema) -> Result<u32> {
        if self.table_names.contains_key(name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }

        let heap = TableHeap::create(bpm)?;
        let table_id = self.meta.next_table_id;
        self.meta.next_table_id += 1;

        let metadata = TableMetadata { table_id, name: name.to_string(), root_page_id: heap.first_page_id(), schema: schema.clone() };
        let (meta_page_id, frame) = bpm.new_page()?;
        *bpm.frame_data_mut(frame) = metadata.encode()?;
        bpm.unpin_page(meta_page_id, true)?;

        self.meta.tables.push((table_id, meta_page_id));
        self.table_names.insert(name.to_string(), table_id);
        self.tables.insert(table_id, TableEntry { meta_page_id, name: name.to_string(), schema, heap });
        self.flush_meta(bpm)?;
        Ok(table_id)
    }

    /// Drop a table and every index built on it.
    pub fn drop_table(&mut self, bpm: &mut BufferPoolManager, name: &str) -> Result<()> {
        let &table_id = self.table_names.get(name).ok_or_else(|| Error::TableNotFound(name.to_string()))?;

        let index_names: Vec<String> = self.indexes.values().filter(|e| e.table_id == table_id).map(|e| e.name.clone()).collect();
        for index_name in index_names {
            self.drop_index(bpm, name, &index_name)?;
        }

        let entry = self.tables.remove(&table_id).expect("table present in table_names must be present in tables");
        entry.heap.destroy(bpm)?;
        bpm.delete_page(entry.meta_page_id)?;

        self.table_names.remove(name);
        self.meta.tables.retain(|&(id, _)| id != table_id);
        self.flush_meta(bpm)
    }

    /// An index's public identity.
    pub fn get_index(&self, table_name: &str, index_name: &str) -> Result<IndexInfo<'_>> {
        let table_id = self.table_names.get(table_name).copied().ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        let &index_id = self.index_names.get(&(table_id, index_name.to_string())).ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;
        let e = &self.indexes[&index_id];
        Ok(IndexInfo { index_id, name: &e.name, table_id: e.table_id, key_columns: &e.key_columns })
    }

    /// Every index built on `table_name`.
    pub fn table_indexes(&self, table_name: &str) -> Result<Vec<IndexInfo<'_>>> {
        let table_id = self.table_names.get(table_name).copied().ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        Ok(self
            .indexes
            .values()
            .filter(|e| e.table_id == table_id)
            .map(|e| IndexInfo { index_id: self.index_names[&(e.table_id, e.name.clone())], name: &e.name, table_id: e.table_id, key_columns: &e.key_columns })
            .collect())
    }

    /// The index id and its tree, for a lookup/insert/remove against it.
    fn index_entry(&self, table_name: &str, index_name: &str) -> Result<&IndexEntry> {
        let table_id = self.table_names.get(table_name).copied().ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        let &index_id = self.index_names.get(&(table_id, index_name.to_string())).ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;
        Ok(&self.indexes[&index_id])
    }

    fn index_entry_mut(&mut self, table_name: &str, index_name: &str) -> Result<&mut IndexEntry> {
        let table_id = self.table_names.get(table_name).copied().ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        let &index_id = self.index_names.get(&(table_id, index_name.to_string())).ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;
        Ok(self.indexes.get_mut(&index_id).expect("index present in index_names must be present in indexes"))
    }

    /// Build a new B+ tree index over `key_columns`, scanning and inserting
    /// every existing row. If a duplicate key is found partway through (the
    /// index is implicitly unique), the partially built tree is destroyed
    /// and the error is returned.
    pub fn create_index(&mut self, bpm: &mut BufferPoolManager, table_name: &str, index_name: &str, key_columns: &[String]) -> Result<u32> {
        let table_id = self.table_names.get(table_name).copied().ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        if self.index_names.contains_key(&(table_id, index_name.to_string())) {
            return Err(Error::IndexAlreadyExists(index_name.to_string()));
        }

        let table = self.table_entry(table_id)?;
        let key_size = key_width(&table.schema, key_columns)?;

        let index_id = self.meta.next_index_id;
        self.meta.next_index_id += 1;

        let mut tree = BPlusTree::new(bpm, index_id, key_size)?;

        let populate_result = self.populate_index(bpm, table_id, key_columns, key_size, &mut tree);
        if let Err(err) = populate_result {
            tree.destroy(bpm)?;
            self.meta.next_index_id -= 1;
            return Err(err);
        }

        let metadata = IndexMetadata { index_id, name: index_name.to_string(), table_id, key_columns: key_columns.to_vec() };
        let (meta_page_id, frame) = bpm.new_page()?;
        *bpm.frame_data_mut(frame) = metadata.encode()?;
        bpm.unpin_page(meta_page_id, true)?;

        self.meta.indexes.push((index_id, meta_page_id));
        self.index_names.insert((table_id, index_name.to_string()), index_id);
        self.indexes.insert(index_id, IndexEntry { meta_page_id, name: index_name.to_string(), table_id, key_columns: key_columns.to_vec(), tree });
        self.flush_meta(bpm)?;
        Ok(index_id)
    }

    fn populate_index(
        &self,
        bpm: &mut BufferPoolManager,
        table_id: u32,
        key_columns: &[String],
        key_size: usize,
        tree: &mut BPlusTree,
    ) -> Result<()> {
        let table = self.table_entry(table_id)?;
        let indices: Vec<usize> = key_columns.iter().map(|c| table.schema.column_index(c)).collect::<Result<_>>()?;

        let mut it = TableIterator::begin(&table.heap, bpm)?;
        while !it.is_end() {
            let row = it.current(&table.heap, bpm, &table.schema)?;
            let fields: Vec<_> = indices.iter().map(|&i| row.field(i).clone()).collect();
            let key = IndexKey::encode(&fields, key_size);
            tree.insert(bpm, key.as_bytes(), row.rid())?;
            it.advance(&table.heap, bpm)?;
        }
        Ok(())
    }

    /// Drop an index.
    pub fn drop_index(&mut self, bpm: &mut BufferPoolManager, table_name: &str, index_name: &str) -> Result<()> {
        let table_id = self.table_names.get(table_name).copied().ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        let index_id = *self.index_names.get(&(table_id, index_name.to_string())).ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;

        let mut entry = self.indexes.remove(&index_id).expect("index present in index_names must be present in indexes");
        entry.tree.destroy(bpm)?;
        bpm.delete_page(entry.meta_page_id)?;

        self.index_names.remove(&(table_id, index_name.to_string()));
        self.meta.indexes.retain(|&(id, _)| id != index_id);
        self.flush_meta(bpm)
    }

    /// Look up `key_columns`' values through `index_name`, returning the
    /// matching row id if present.
    pub fn index_lookup(&self, bpm: &mut BufferPoolManager, table_name: &str, index_name: &str, fields: &[crate::record::Field]) -> Result<Option<crate::record::RowId>> {
        let entry = self.index_entry(table_name, index_name)?;
        let key = IndexKey::encode(fields, key_size_of(&entry.tree));
        entry.tree.get_value(bpm, key.as_bytes())
    }

    /// Insert a new `(key, rid)` pair into `index_name`, e.g. after
    /// inserting the underlying row.
    pub fn index_insert(&mut self, bpm: &mut BufferPoolManager, table_name: &str, index_name: &str, fields: &[crate::record::Field], rid: crate::record::RowId) -> Result<()> {
        let entry = self.index_entry_mut(table_name, index_name)?;
        let width = key_size_of(&entry.tree);
        let key = IndexKey::encode(fields, width);
        entry.tree.insert(bpm, key.as_bytes(), rid)
    }

    /// Remove a `(key, rid)` pair from `index_name`, e.g. after deleting the
    /// underlying row.
    pub fn index_remove(&mut self, bpm: &mut BufferPoolManager, table_name: &str, index_name: &str, fields: &[crate::record::Field]) -> Result<()> {
        let entry = self.index_entry_mut(table_name, index_name)?;
        let width = key_size_of(&entry.tree);
        let key = IndexKey::encode(fields, width);
        entry.tree.remove(bpm, key.as_bytes())
    }

    /// A forward cursor over `index_name`'s entries in key order.
    pub fn index_scan(&self, bpm: &mut BufferPoolManager, table_name: &str, index_name: &str) -> Result<IndexIterator> {
        let entry = self.index_entry(table_name, index_name)?;
        IndexIterator::begin(&entry.tree, bpm)
    }
}

fn key_size_of(tree: &BPlusTree) -> usize {
    tree.key_size()
}

fn key_width(schema: &Schema, key_columns: &[String]) -> Result<usize> {
    let key_schema = schema.project(key_columns)?;
    let needed: u32 = key_schema.columns().iter().map(|c| c.data_type().width()).sum();
    Ok(IndexKey::width_for(needed as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskManager;
    use crate::record::{Column, DataType, Field, Row};
    use tempfile::tempdir;

    fn bootstrap() -> BufferPoolManager {
        let dir = tempdir().unwrap();
        let dm = DiskManager::open(dir.path().join("db")).unwrap();
        std::mem::forget(dir);
        BufferPoolManager::new(32, dm)
    }

    fn user_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int, 0, false, true),
            Column::new("name", DataType::Char(16), 1, true, false),
        ])
    }

    #[test]
    fn create_table_then_get() {
        let mut bpm = bootstrap();
        let mut cat = Catalog::open(&mut bpm).unwrap();
        cat.create_table(&mut bpm, "users", user_schema()).unwrap();
        let info = cat.get_table("users").unwrap();
        assert_eq!(info.name, "users");
        assert_eq!(info.schema.column_count(), 2);
    }

    #[test]
    fn duplicate_table_name_is_rejected() {
        let mut bpm = bootstrap();
        let mut cat = Catalog::open(&mut bpm).unwrap();
        cat.create_table(&mut bpm, "users", user_schema()).unwrap();
        assert!(matches!(cat.create_table(&mut bpm, "users", user_schema()), Err(Error::TableAlreadyExists(_))));
    }

    #[test]
    fn create_index_populates_existing_rows_and_supports_lookup() {
        let mut bpm = bootstrap();
        let mut cat = Catalog::open(&mut bpm).unwrap();
        cat.create_table(&mut bpm, "users", user_schema()).unwrap();

        let schema = user_schema();
        for i in 0..20 {
            let mut row = Row::new(vec![Field::Int(i), Field::Char(format!("user{i}"))]);
            cat.table_heap("users").unwrap().insert(&mut bpm, &schema, &mut row).unwrap();
        }

        cat.create_index(&mut bpm, "users", "by_id", &["id".to_string()]).unwrap();

        let rid = cat.index_lookup(&mut bpm, "users", "by_id", &[Field::Int(7)]).unwrap();
        assert_eq!(rid.unwrap().page_id(), cat.table_heap("users").unwrap().first_page_id());
        assert!(cat.index_lookup(&mut bpm, "users", "by_id", &[Field::Int(999)]).unwrap().is_none());
    }

    #[test]
    fn duplicate_key_during_index_build_rolls_back() {
        let mut bpm = bootstrap();
        let mut cat = Catalog::open(&mut bpm).unwrap();
        cat.create_table(&mut bpm, "users", user_schema()).unwrap();

        let schema = user_schema();
        for i in [1, 2, 1, 3] {
            let mut row = Row::new(vec![Field::Int(i), Field::Char("x".to_string())]);
            cat.table_heap("users").unwrap().insert(&mut bpm, &schema, &mut row).unwrap();
        }

        let next_index_id_before = cat.meta.next_index_id;
        let err = cat.create_index(&mut bpm, "users", "by_id", &["id".to_string()]).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey));
        assert!(cat.get_index("users", "by_id").is_err());
        assert_eq!(cat.meta.next_index_id, next_index_id_before);
    }

    #[test]
    fn drop_table_drops_its_indexes_too() {
        let mut bpm = bootstrap();
        let mut cat = Catalog::open(&mut bpm).unwrap();
        cat.create_table(&mut bpm, "users", user_schema()).unwrap();
        cat.create_index(&mut bpm, "users", "by_id", &["id".to_string()]).unwrap();

        cat.drop_table(&mut bpm, "users").unwrap();
        assert!(cat.get_table("users").is_err());
        assert!(matches!(cat.get_index("users", "by_id"), Err(Error::TableNotFound(_))));
    }

    #[test]
    fn reopening_catalog_after_restart_preserves_tables_and_indexes() {
        let mut bpm = bootstrap();
        {
            let mut cat = Catalog::open(&mut bpm).unwrap();
            cat.create_table(&mut bpm, "users", user_schema()).unwrap();
            let schema = user_schema();
            let mut row = Row::new(vec![Field::Int(5), Field::Char("five".to_string())]);
            cat.table_heap("users").unwrap().insert(&mut bpm, &schema, &mut row).unwrap();
            cat.create_index(&mut bpm, "users", "by_id", &["id".to_string()]).unwrap();
        }

        let cat = Catalog::open(&mut bpm).unwrap();
        assert_eq!(cat.get_table("users").unwrap().schema.column_count(), 2);
        let rid = cat.index_lookup(&mut bpm, "users", "by_id", &[Field::Int(5)]).unwrap();
        assert!(rid.is_some());
    }
}
