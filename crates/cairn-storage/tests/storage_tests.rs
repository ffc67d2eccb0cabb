//! Storage foundation validation tests.
//!
//! Integration tests across the storage components working together:
//! - Table load, pagination, and row accounting
//! - Cursor physical ordering and the pointer-from-cursor contract
//! - B+ tree maintenance through append / rewrite workloads
//! - Catalog lifecycle

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;

use cairn_buffer::BufferManager;
use cairn_common::RecordPointer;
use cairn_storage::{BTree, Catalog, Table};

fn create_test_env() -> (BufferManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let buffer = BufferManager::new(dir.path().join("temp"), 10).unwrap();
    (buffer, dir)
}

fn load_table(
    dir: &std::path::Path,
    buffer: &BufferManager,
    name: &str,
    csv: &str,
    block_size: usize,
) -> Table {
    let path = dir.join(format!("{name}.csv"));
    fs::write(&path, csv).unwrap();
    let mut table = Table::from_csv(name, path);
    table.load(buffer, block_size).unwrap();
    table
}

#[test]
fn test_row_accounting_invariant_through_mutations() {
    let (buffer, dir) = create_test_env();
    let mut csv = String::from("a,b\n");
    for i in 0..50 {
        csv.push_str(&format!("{i},{}\n", i * 2));
    }
    // 2 columns at 64 bytes per block => 4 rows per page
    let mut table = load_table(dir.path(), &buffer, "T", &csv, 64);
    assert_eq!(table.max_rows_per_block, 4);

    for round in 0..20 {
        if round % 3 == 0 {
            table.append_row(&buffer, vec![1000 + round, 0]).unwrap();
        } else {
            let page = round as usize % table.block_count;
            let loaded = buffer
                .get_page("T", page, table.rows_per_block[page], 2)
                .unwrap();
            let mut rows = loaded.rows().to_vec();
            rows.pop();
            table.rewrite_page(&buffer, page, rows).unwrap();
        }
        // The accounting invariants hold after every mutation
        assert_eq!(
            table.row_count,
            table.rows_per_block.iter().sum::<usize>(),
            "round {round}"
        );
        assert_eq!(table.block_count, table.rows_per_block.len());
        assert!(table
            .rows_per_block
            .iter()
            .all(|&n| n <= table.max_rows_per_block));
    }
}

#[test]
fn test_cursor_pointer_contract_addresses_every_row() {
    let (buffer, dir) = create_test_env();
    let mut csv = String::from("v\n");
    for i in 0..23 {
        csv.push_str(&format!("{i}\n"));
    }
    let table = load_table(dir.path(), &buffer, "T", &csv, 32); // 4 rows/page

    let mut cursor = table.cursor(&buffer);
    let mut seen = Vec::new();
    while let Some(row) = cursor.next() {
        let pointer = cursor.position().unwrap();
        // Fetching through the pointer yields the same row
        let fetched = table.fetch_row(&buffer, pointer).unwrap().unwrap();
        assert_eq!(fetched, row);
        seen.push(pointer);
    }
    assert_eq!(seen.len(), 23);
    // Physical order: pages ascending, rows ascending within a page
    let mut sorted = seen.clone();
    sorted.sort_by_key(|p| (p.page, p.row));
    assert_eq!(seen, sorted);
}

#[test]
fn test_index_tracks_random_append_workload() {
    let (buffer, dir) = create_test_env();
    let table_csv = "k,v\n";
    let mut table = load_table(dir.path(), &buffer, "T", table_csv, 64);

    let mut rng = StdRng::seed_from_u64(99);
    let mut tree = BTree::with_orders("T", "k", 0, 4, 3);
    let mut expected: HashMap<i64, Vec<RecordPointer>> = HashMap::new();

    for i in 0..300 {
        let key = rng.gen_range(-20..20);
        let pointer = table.append_row(&buffer, vec![key, i]).unwrap();
        tree.insert(&buffer, key, pointer).unwrap();
        expected.entry(key).or_default().push(pointer);
    }

    for (key, pointers) in &expected {
        assert_eq!(&tree.search_key(&buffer, *key).unwrap(), pointers);
    }
    // Full range scan covers exactly the live entries in key order
    let all = tree.search_range(&buffer, i64::MIN, i64::MAX).unwrap();
    assert_eq!(all.len(), 300);
}

#[test]
fn test_index_rebuild_matches_incremental_build() {
    let (buffer, dir) = create_test_env();
    let mut csv = String::from("k\n");
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..120 {
        csv.push_str(&format!("{}\n", rng.gen_range(0..15)));
    }
    let mut table = load_table(dir.path(), &buffer, "T", &csv, 32);

    let mut tree = BTree::with_orders("T", "k", 0, 4, 3);
    tree.build(&buffer, table.column_count, &table.rows_per_block)
        .unwrap();
    table.add_index("k", tree);

    // Every key the table holds is reachable through the index
    let mut cursor = table.cursor(&buffer);
    let mut by_key: HashMap<i64, usize> = HashMap::new();
    while let Some(row) = cursor.next() {
        *by_key.entry(row[0]).or_default() += 1;
    }
    let tree = table.index_for("k").unwrap();
    for (key, count) in by_key {
        let pointers = tree.search_key(&buffer, key).unwrap();
        assert_eq!(pointers.len(), count, "key {key}");
        for pointer in pointers {
            let row = table.fetch_row(&buffer, pointer).unwrap().unwrap();
            assert_eq!(row[0], key);
        }
    }
}

#[test]
fn test_reload_rebuilds_indexes() {
    let (buffer, dir) = create_test_env();
    let table_csv = "k,v\n5,1\n7,2\n5,3\n";
    let mut table = load_table(dir.path(), &buffer, "T", table_csv, 1024);

    let mut tree = BTree::with_orders("T", "k", 0, 4, 3);
    tree.build(&buffer, table.column_count, &table.rows_per_block)
        .unwrap();
    table.add_index("k", tree);

    table.reload(&buffer).unwrap();
    assert_eq!(table.row_count, 3);

    let tree = table.index_for("k").unwrap();
    let pointers = tree.search_key(&buffer, 5).unwrap();
    assert_eq!(pointers.len(), 2);
    for pointer in pointers {
        assert_eq!(table.fetch_row(&buffer, pointer).unwrap().unwrap()[0], 5);
    }
}

#[test]
fn test_catalog_owns_table_lifecycle() {
    let (buffer, dir) = create_test_env();
    let table = load_table(dir.path(), &buffer, "T", "a\n1\n2\n", 1024);

    let mut catalog = Catalog::new();
    catalog.insert(table).unwrap();

    // An index registered on the table is torn down with it
    {
        let table = catalog.get_mut("T").unwrap();
        let mut tree = BTree::with_orders("T", "a", 0, 4, 3);
        tree.build(&buffer, table.column_count, &table.rows_per_block)
            .unwrap();
        table.add_index("a", tree);
    }
    let node0 = buffer.node_path("T_a_index", 0);
    assert!(node0.exists());
    let page0 = buffer.page_path("T", 0);
    assert!(page0.exists());

    assert!(catalog.remove("T", &buffer));
    assert!(!node0.exists());
    assert!(!page0.exists());
}

#[test]
fn test_export_load_round_trip_multiset() {
    let (buffer, dir) = create_test_env();
    let mut table = load_table(dir.path(), &buffer, "T", "a,b\n1,1\n2,2\n1,1\n", 64);
    table.append_row(&buffer, vec![9, 9]).unwrap();

    let out = dir.path().join("exported.csv");
    table.export(&buffer, &out).unwrap();

    let mut reloaded = Table::from_csv("T2", out);
    reloaded.load(&buffer, 64).unwrap();

    let collect = |table: &Table| {
        let mut rows = Vec::new();
        let mut cursor = table.cursor(&buffer);
        while let Some(row) = cursor.next() {
            rows.push(row);
        }
        rows.sort();
        rows
    };
    assert_eq!(collect(&table), collect(&reloaded));
}
