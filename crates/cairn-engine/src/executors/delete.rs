//! DELETE: page compaction rewrites with index maintenance.
//!
//! Matching pointers are grouped by page and each affected page is
//! rewritten with its surviving rows in order. Compaction moves survivors
//! to lower slots, which invalidates their index pointers; when that
//! happens the table's indexes are rebuilt from the data pages instead of
//! patched entry by entry. Pages only ever shrink; `block_count` never
//! decreases.

use crate::executors::{column_index_of, matching_pointers};
use crate::query::Condition;
use cairn_buffer::BufferManager;
use cairn_common::{RecordPointer, Result, Row};
use cairn_storage::Catalog;
use log::warn;
use std::collections::{BTreeMap, HashSet};

pub fn execute(
    buffer: &BufferManager,
    catalog: &mut Catalog,
    table_name: &str,
    condition: &Condition,
) -> Result<String> {
    let table = catalog.require_mut(table_name)?;
    let condition_idx = column_index_of(table, &condition.column)?;

    let pointers = matching_pointers(table, buffer, condition, condition_idx)?;
    let mut by_page: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for pointer in pointers {
        by_page.entry(pointer.page).or_default().push(pointer.row);
    }

    let has_indexes = !table.indexed_columns().is_empty();
    let mut deleted: Vec<(Row, RecordPointer)> = Vec::new();
    let mut survivors_displaced = false;

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
                warn!("delete from '{table_name}': page {page} unreadable, skipped: {e}");
                continue;
            }
        };
        let page_rows = loaded.rows().to_vec();

        let doomed: HashSet<usize> = row_ids.iter().copied().collect();
        let mut surviving: Vec<Row> = Vec::with_capacity(page_rows.len());
        for (row_id, row) in page_rows.iter().enumerate() {
            if doomed.contains(&row_id) {
                deleted.push((row.clone(), RecordPointer::new(page, row_id)));
            } else {
                surviving.push(row.clone());
            }
        }

        // A deletion before the last surviving slot shifts rows down.
        if let Some(&first) = row_ids.first() {
            if first < surviving.len() {
                survivors_displaced = true;
            }
        }

        if let Err(e) = table.rewrite_page(buffer, page, surviving) {
            warn!("delete from '{table_name}': page {page} not rewritten: {e}");
            // Drop the bookkeeping for this page; its rows are still live.
            deleted.retain(|(_, pointer)| pointer.page != page);
        }
    }

    let deleted_count = deleted.len();
    if has_indexes {
        if survivors_displaced {
            // Surviving rows changed address; patching entries one by one
            // cannot fix pointers we no longer know the old values of.
            table.rebuild_indexes(buffer)?;
        } else {
            for (column, tree) in table.indexes_mut() {
                let column_idx = tree.column_index();
                for (row, pointer) in &deleted {
                    let key = row[column_idx];
                    if let Err(e) = tree.remove_entry(buffer, key, *pointer) {
                        warn!(
                            "delete from '{table_name}': index '{column}' entry {key} not removed: {e}"
                        );
                    }
                }
            }
        }
    }

    Ok(format!("{deleted_count} row(s) deleted from '{table_name}'"))
}
