//! End-to-end scenarios exercising the full stack (disk, buffer pool, table
//! heap, B+ tree, catalog) together through the crate's public API.

use tempfile::tempdir;

use tinydb_storage::{BufferPoolManager, Catalog, Column, DataType, DiskManager, Field, Row};

fn open_bpm(path: &std::path::Path, pool_size: usize) -> BufferPoolManager {
    let dm = DiskManager::open(path).unwrap();
    BufferPoolManager::new(pool_size, dm)
}

/// (a) Buffer pool churn: filling every frame then asking for one more must
/// evict the LRU victim, flushing its content through before reuse.
#[test]
fn buffer_pool_churn_evicts_lru_and_flushes() {
    let dir = tempdir().unwrap();
    let mut bpm = open_bpm(&dir.path().join("db"), 10);

    let mut pages = Vec::new();
    for i in 0..10 {
        let (pid, frame) = bpm.new_page().unwrap();
        bpm.frame_data_mut(frame)[0] = i as u8;
        bpm.unpin_page(pid, true).unwrap();
        pages.push(pid);
    }
    assert!(bpm.check_all_unpinned());

    let victim_content = pages[0];
    let (new_pid, frame) = bpm.new_page().unwrap();
    bpm.frame_data_mut(frame)[0] = 99;
    bpm.unpin_page(new_pid, true).unwrap();

    let frame = bpm.fetch_page(victim_content).unwrap();
    assert_eq!(bpm.frame_data(frame)[0], 0);
    bpm.unpin_page(victim_content, false).unwrap();
}

/// (b) B+ tree round-trip: insert a few thousand sequential keys, verify
/// every lookup, then remove them all in the same order, checking that
/// removed keys disappear and surviving keys stay correct at each step.
#[test]
fn b_plus_tree_bulk_insert_then_remove_round_trip() {
    use tinydb_storage::index::BPlusTree;
    use tinydb_storage::RowId;

    let dir = tempdir().unwrap();
    let mut bpm = open_bpm(&dir.path().join("db"), 64);
    let (p0, _) = bpm.new_page().unwrap();
    bpm.unpin_page(p0, false).unwrap();
    let (p1, _) = bpm.new_page().unwrap();
    bpm.unpin_page(p1, false).unwrap();

    let mut tree = BPlusTree::with_max_sizes(&mut bpm, 1, 4, 4, 4).unwrap();
    let n = 3000;
    let key = |i: i32| ((i as u32) ^ 0x8000_0000).to_be_bytes();

    for i in 0..n {
        tree.insert(&mut bpm, &key(i), RowId::new(i, 0)).unwrap();
    }
    for i in 0..n {
        assert_eq!(tree.get_value(&mut bpm, &key(i)).unwrap(), Some(RowId::new(i, 0)));
    }

    for i in 0..n {
        tree.remove(&mut bpm, &key(i)).unwrap();
        assert_eq!(tree.get_value(&mut bpm, &key(i)).unwrap(), None);
    }
    assert!(tree.is_empty());
}

/// (d) Table heap with tombstones: insert 500 rows, delete every third one,
/// and confirm the iterator yields exactly the remaining 334 in order.
#[test]
fn table_heap_tombstones_leave_exactly_the_surviving_rows() {
    use tinydb_storage::TableIterator;

    let dir = tempdir().unwrap();
    let mut bpm = open_bpm(&dir.path().join("db"), 16);
    let heap = tinydb_storage::TableHeap::create(&mut bpm).unwrap();
    let schema = tinydb_storage::Schema::new(vec![Column::new("v", DataType::Int, 0, false, false)]);

    let mut expected = Vec::new();
    for i in 0..500 {
        let mut row = Row::new(vec![Field::Int(i)]);
        heap.insert(&mut bpm, &schema, &mut row).unwrap();
        if i % 3 == 2 {
            heap.mark_delete(&mut bpm, row.rid()).unwrap();
            heap.apply_delete(&mut bpm, row.rid()).unwrap();
        } else {
            expected.push(i);
        }
    }
    assert_eq!(expected.len(), 334);

    let mut seen = Vec::new();
    let mut it = TableIterator::begin(&heap, &mut bpm).unwrap();
    while !it.is_end() {
        let row = it.current(&heap, &mut bpm, &schema).unwrap();
        if let Field::Int(v) = row.field(0) {
            seen.push(*v);
        }
        it.advance(&heap, &mut bpm).unwrap();
    }
    assert_eq!(seen, expected);
}

/// (e) Catalog persistence: create a table, insert rows, drop everything in
/// scope (simulating a close), reopen against the same file, and confirm
/// both the table's rows and its primary-key index survive.
#[test]
fn catalog_persists_tables_rows_and_indexes_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let schema = tinydb_storage::Schema::new(vec![
        Column::new("a", DataType::Int, 0, false, true),
        Column::new("b", DataType::Char(8), 1, false, false),
    ]);

    {
        let mut bpm = open_bpm(&path, 64);
        let mut cat = Catalog::open(&mut bpm).unwrap();
        cat.create_table(&mut bpm, "t", schema.clone()).unwrap();
        for i in 0..100 {
            let mut row = Row::new(vec![Field::Int(i), Field::Char(format!("r{i}"))]);
            cat.table_heap("t").unwrap().insert(&mut bpm, &schema, &mut row).unwrap();
        }
        cat.create_index(&mut bpm, "t", "pk", &["a".to_string()]).unwrap();
    }

    {
        let mut bpm = open_bpm(&path, 64);
        let cat = Catalog::open(&mut bpm).unwrap();

        let heap = cat.table_heap("t").unwrap();
        let mut count = 0;
        let mut it = tinydb_storage::TableIterator::begin(heap, &mut bpm).unwrap();
        while !it.is_end() {
            it.current(heap, &mut bpm, &cat.get_table("t").unwrap().schema.clone()).unwrap();
            count += 1;
            it.advance(heap, &mut bpm).unwrap();
        }
        assert_eq!(count, 100);

        let rid = cat.index_lookup(&mut bpm, "t", "pk", &[Field::Int(42)]).unwrap();
        assert!(rid.is_some());
    }
}

/// (f) Duplicate index build: building an index over a column with existing
/// duplicate values must fail cleanly, leaving no partial index behind.
#[test]
fn duplicate_index_build_leaves_no_partial_index() {
    let dir = tempdir().unwrap();
    let mut bpm = open_bpm(&dir.path().join("db"), 32);
    let mut cat = Catalog::open(&mut bpm).unwrap();
    let schema = tinydb_storage::Schema::new(vec![Column::new("a", DataType::Int, 0, false, false)]);
    cat.create_table(&mut bpm, "t", schema.clone()).unwrap();

    for v in [1, 2, 2, 3] {
        let mut row = Row::new(vec![Field::Int(v)]);
        cat.table_heap("t").unwrap().insert(&mut bpm, &schema, &mut row).unwrap();
    }

    let err = cat.create_index(&mut bpm, "t", "dup_idx", &["a".to_string()]).unwrap_err();
    assert!(matches!(err, tinydb_storage::Error::DuplicateKey));
    assert!(cat.get_index("t", "dup_idx").is_err());
    assert!(cat.table_indexes("t").unwrap().is_empty());
}
