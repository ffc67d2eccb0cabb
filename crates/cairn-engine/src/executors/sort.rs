//! SORT: two-phase external merge sort, in place.
//!
//! Phase 1 generates sorted runs of at most `block_count ×
//! max_rows_per_block` rows, each registered in the catalog as a temporary
//! table. Phase 2 merges `block_count - 1` runs at a time (one buffer slot
//! reserved for output) until one remains, which is streamed back into the
//! target table's pages. Ties are stable: the earliest input wins.

use crate::executors::{column_index_of, finalize_result, make_result_table, unique_temp_name};
use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result, Row, SortOrder};
use cairn_storage::{Catalog, Cursor};
use log::debug;
use std::cmp::Ordering;

/// Composite comparison over `(column_index, direction)` sort keys.
pub(crate) fn compare_rows(a: &[i64], b: &[i64], keys: &[(usize, SortOrder)]) -> Ordering {
    for &(idx, order) in keys {
        let ord = a[idx].cmp(&b[idx]);
        if ord != Ordering::Equal {
            return match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
        }
    }
    Ordering::Equal
}

fn min_head(heads: &[Option<Row>], keys: &[(usize, SortOrder)]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (j, head) in heads.iter().enumerate() {
        let Some(candidate) = head else { continue };
        best = match best {
            None => Some(j),
            Some(current) => {
                let smaller = match &heads[current] {
                    Some(row) => compare_rows(candidate, row, keys) == Ordering::Less,
                    None => true,
                };
                if smaller {
                    Some(j)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    table_name: &str,
    keys: &[(String, SortOrder)],
) -> Result<String> {
    let (columns, column_count, rows_per_block, max_rows, key_indices) = {
        let table = catalog.require(table_name)?;
        let mut resolved: Vec<(usize, SortOrder)> = Vec::with_capacity(keys.len());
        for (column, order) in keys {
            resolved.push((column_index_of(table, column)?, *order));
        }
        (
            table.columns.clone(),
            table.column_count,
            table.rows_per_block.clone(),
            table.max_rows_per_block,
            resolved,
        )
    };

    // Phase 1: generate sorted runs under the memory budget.
    let budget = (config.block_count * max_rows).max(1);
    let mut run_counter = 0usize;
    let mut runs: Vec<String> = Vec::new();
    let mut source_cursor = Cursor::new(buffer, table_name, column_count, rows_per_block);
    loop {
        let mut chunk: Vec<Row> = Vec::new();
        while chunk.len() < budget {
            match source_cursor.next() {
                Some(row) => chunk.push(row),
                None => break,
            }
        }
        if chunk.is_empty() {
            break;
        }
        chunk.sort_by(|a, b| compare_rows(a, b, &key_indices));

        let run_name = unique_temp_name(catalog, &format!("{table_name}_run_{run_counter}"));
        run_counter += 1;
        let run = make_result_table(config, &run_name, columns.clone())?;
        for row in &chunk {
            run.append_csv_row(row)?;
        }
        finalize_result(catalog, buffer, run)?;
        runs.push(run_name);
    }

    if runs.is_empty() {
        return Ok(format!("Relation '{table_name}' is empty; nothing to sort"));
    }
    debug!("sort '{table_name}': {} initial run(s)", runs.len());

    // Phase 2: merge block_count - 1 runs per pass, one output reserved.
    let fan_in = (config.block_count.saturating_sub(1)).max(2);
    while runs.len() > 1 {
        let mut next_runs = Vec::new();
        for group in runs.chunks(fan_in) {
            if group.len() == 1 {
                next_runs.push(group[0].clone());
                continue;
            }

            let mut cursors = Vec::with_capacity(group.len());
            for run in group {
                let run_table = catalog.require(run)?;
                cursors.push(Cursor::new(
                    buffer,
                    run,
                    run_table.column_count,
                    run_table.rows_per_block.clone(),
                ));
            }

            let merged_name = unique_temp_name(catalog, &format!("{table_name}_run_{run_counter}"));
            run_counter += 1;
            let merged = make_result_table(config, &merged_name, columns.clone())?;

            let mut heads: Vec<Option<Row>> = cursors.iter_mut().map(|c| c.next()).collect();
            while let Some(winner) = min_head(&heads, &key_indices) {
                if let Some(row) = heads[winner].take() {
                    merged.append_csv_row(&row)?;
                }
                heads[winner] = cursors[winner].next();
            }

            finalize_result(catalog, buffer, merged)?;
            next_runs.push(merged_name);
            for run in group {
                catalog.remove(run, buffer);
            }
        }
        runs = next_runs;
    }

    // Write-back: stream the surviving run into the target's pages.
    let final_run = runs.remove(0);
    let (run_columns, run_blocks) = {
        let run_table = catalog.require(&final_run)?;
        (run_table.column_count, run_table.rows_per_block.clone())
    };
    let mut final_cursor = Cursor::new(buffer, &final_run, run_columns, run_blocks);
    {
        let table = catalog.require_mut(table_name)?;
        table.replace_rows(buffer, std::iter::from_fn(|| final_cursor.next()))?;
        // Every row moved; any index pointers are stale.
        table.rebuild_indexes(buffer)?;
    }
    catalog.remove(&final_run, buffer);

    Ok(format!("Relation '{table_name}' sorted"))
}
