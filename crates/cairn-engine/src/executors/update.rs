//! UPDATE: in-place page rewrites with index key maintenance.
//!
//! Matching rows are grouped by page so each affected page is loaded,
//! modified, and rewritten once. Rows never move, so only the indexed
//! columns whose value actually changed need their entries swapped.

use crate::executors::{column_index_of, matching_pointers};
use crate::query::Condition;
use cairn_buffer::BufferManager;
use cairn_common::{RecordPointer, Result};
use cairn_storage::Catalog;
use log::warn;
use std::collections::BTreeMap;

pub fn execute(
    buffer: &BufferManager,
    catalog: &mut Catalog,
    table_name: &str,
    condition: &Condition,
    target_column: &str,
    value: i64,
) -> Result<String> {
    let table = catalog.require_mut(table_name)?;
    let condition_idx = column_index_of(table, &condition.column)?;
    let target_idx = column_index_of(table, target_column)?;

    let pointers = matching_pointers(table, buffer, condition, condition_idx)?;
    let mut by_page: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for pointer in pointers {
        by_page.entry(pointer.page).or_default().push(pointer.row);
    }

    let indexed: Vec<(String, usize)> = table
        .indexed_columns()
        .into_iter()
        .filter_map(|column| {
            table
                .index_for(&column)
                .map(|tree| (column.clone(), tree.column_index()))
        })
        .collect();

    let mut rows_touched = 0usize;
    // (column, old key, new key, pointer) swaps applied after the rewrites
    let mut key_swaps: Vec<(String, i64, i64, RecordPointer)> = Vec::new();

    for (page, mut row_ids) in by_page {
        row_ids.sort_unstable();
        row_ids.dedup();

        let loaded = match buffer.get_page(
            table_name,
            page,
            table.rows_per_block[page],
            table.column_count,
        ) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("update of '{table_name}': page {page} unreadable, skipped: {e}");
                continue;
            }
        };
        let mut rows = loaded.rows().to_vec();

        for &row_id in &row_ids {
            let Some(target_row) = rows.get_mut(row_id) else {
                warn!("update of '{table_name}': row {page}:{row_id} out of range, skipped");
                continue;
            };
            let old_row = target_row.clone();
            target_row[target_idx] = value;
            rows_touched += 1;

            let pointer = RecordPointer::new(page, row_id);
            for (column, column_idx) in &indexed {
                let old_key = old_row[*column_idx];
                let new_key = target_row[*column_idx];
                if old_key != new_key {
                    key_swaps.push((column.clone(), old_key, new_key, pointer));
                }
            }
        }

        if let Err(e) = table.rewrite_page(buffer, page, rows) {
            warn!("update of '{table_name}': page {page} not rewritten: {e}");
        }
    }

    for (column, old_key, new_key, pointer) in key_swaps {
        let Some(tree) = table.index_for_mut(&column) else {
            continue;
        };
        if let Err(e) = tree.remove_entry(buffer, old_key, pointer) {
            warn!("update of '{table_name}': index '{column}' old key not removed: {e}");
        }
        if let Err(e) = tree.insert(buffer, new_key, pointer) {
            warn!("update of '{table_name}': index '{column}' new key not inserted: {e}");
        }
    }

    Ok(format!("{rows_touched} row(s) updated in '{table_name}'"))
}
