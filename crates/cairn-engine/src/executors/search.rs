//! SEARCH: point and range lookups answered entirely from the index.
//!
//! If the target table is not yet indexed on the condition column, a B+
//! tree is built on it first (implicit INDEX). Every operator maps to a
//! pointer set; pointers are validated against the table's pagination
//! metadata, and stale ones are dropped and logged rather than followed.

use crate::executors::{column_index_of, finalize_result, make_result_table, require_absent};
use crate::query::Condition;
use cairn_buffer::BufferManager;
use cairn_common::{BinaryOperator, CairnError, EngineConfig, RecordPointer, Result};
use cairn_storage::{BTree, Catalog};
use log::{info, warn};

fn pointer_set(
    tree: &BTree,
    buffer: &BufferManager,
    op: BinaryOperator,
    value: i64,
) -> Result<Vec<RecordPointer>> {
    match op {
        BinaryOperator::Equal => tree.search_key(buffer, value),
        BinaryOperator::LessThan => {
            if value == i64::MIN {
                Ok(Vec::new())
            } else {
                tree.search_range(buffer, i64::MIN, value - 1)
            }
        }
        BinaryOperator::GreaterThan => {
            if value == i64::MAX {
                Ok(Vec::new())
            } else {
                tree.search_range(buffer, value + 1, i64::MAX)
            }
        }
        BinaryOperator::LessEqual => tree.search_range(buffer, i64::MIN, value),
        BinaryOperator::GreaterEqual => tree.search_range(buffer, value, i64::MAX),
        BinaryOperator::NotEqual => {
            let mut pointers = if value == i64::MIN {
                Vec::new()
            } else {
                tree.search_range(buffer, i64::MIN, value - 1)?
            };
            if value != i64::MAX {
                pointers.extend(tree.search_range(buffer, value + 1, i64::MAX)?);
            }
            Ok(pointers)
        }
    }
}

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    source: &str,
    condition: &Condition,
) -> Result<String> {
    require_absent(catalog, result)?;

    // Implicit INDEX: build a B+ tree on the condition column if missing.
    let built = {
        let table = catalog.require_mut(source)?;
        let column_idx = column_index_of(table, &condition.column)?;
        if table.has_index(&condition.column) {
            false
        } else {
            info!(
                "search on '{source}.{}': building implicit index",
                condition.column
            );
            let mut tree = BTree::new(source, &condition.column, column_idx, config.block_size);
            tree.build(buffer, table.column_count, &table.rows_per_block)?;
            table.add_index(&condition.column, tree);
            true
        }
    };

    let table = catalog.require(source)?;
    let tree = table.index_for(&condition.column).ok_or_else(|| {
        CairnError::InternalInvariant(format!(
            "index on '{source}.{}' vanished after build",
            condition.column
        ))
    })?;
    let pointers = pointer_set(tree, buffer, condition.op, condition.value)?;

    let out = make_result_table(config, result, table.columns.clone())?;
    let mut added = 0usize;
    let mut dropped = 0usize;
    for &pointer in &pointers {
        if !table.pointer_valid(pointer) {
            warn!(
                "search on '{source}': {}",
                CairnError::IndexStale {
                    table: source.to_string(),
                    pointer,
                }
            );
            dropped += 1;
            continue;
        }
        match table.fetch_row(buffer, pointer)? {
            Some(row) => {
                out.append_csv_row(&row)?;
                added += 1;
            }
            None => {
                warn!("search on '{source}': pointer {pointer} addressed no row");
                dropped += 1;
            }
        }
    }
    finalize_result(catalog, buffer, out)?;

    let index_note = if built { "built index, " } else { "index reused, " };
    let stale_note = if dropped > 0 {
        format!(", {dropped} stale pointer(s) dropped")
    } else {
        String::new()
    };
    Ok(format!(
        "Search on '{source}' ({index_note}{} pointer(s)) added {added} row(s) to '{result}'{stale_note}",
        pointers.len()
    ))
}
