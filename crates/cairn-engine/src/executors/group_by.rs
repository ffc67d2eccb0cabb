//! GROUP BY ... HAVING ... RETURN: sort-based grouping with aggregates.
//!
//! The source table is first sorted ascending on the grouping attribute
//! (in place), then a single pass accumulates the HAVING and RETURN
//! aggregates per group. At each boundary the group row
//! `(group_value, return_aggregate)` is emitted when the HAVING
//! comparison holds.

use crate::executors::{column_index_of, finalize_result, make_result_table, require_absent, sort};
use crate::query::AggregateSpec;
use cairn_buffer::BufferManager;
use cairn_common::{BinaryOperator, EngineConfig, Result, SortOrder};
use cairn_storage::{Catalog, Cursor};

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    source: &str,
    group_column: &str,
    having: &AggregateSpec,
    having_op: BinaryOperator,
    having_value: i64,
    returning: &AggregateSpec,
) -> Result<String> {
    require_absent(catalog, result)?;
    let (group_idx, having_idx, return_idx) = {
        let table = catalog.require(source)?;
        (
            column_index_of(table, group_column)?,
            column_index_of(table, &having.column)?,
            column_index_of(table, &returning.column)?,
        )
    };

    // Groups are read off a sorted scan; the source is sorted in place.
    sort::execute(
        config,
        buffer,
        catalog,
        source,
        &[(group_column.to_string(), SortOrder::Ascending)],
    )?;

    let (column_count, rows_per_block) = {
        let table = catalog.require(source)?;
        (table.column_count, table.rows_per_block.clone())
    };
    let result_columns = vec![
        group_column.to_string(),
        format!("{}{}", returning.func.name(), returning.column),
    ];
    let out = make_result_table(config, result, result_columns)?;

    let mut cursor = Cursor::new(buffer, source, column_count, rows_per_block);
    let mut current_group: Option<i64> = None;
    let mut having_values: Vec<i64> = Vec::new();
    let mut return_values: Vec<i64> = Vec::new();
    let mut groups_emitted = 0usize;

    while let Some(row) = cursor.next() {
        let group = row[group_idx];
        if current_group != Some(group) {
            if let Some(finished) = current_group {
                let having_result = having.func.apply(&having_values);
                if having_op.evaluate(having_result, having_value) {
                    out.append_csv_row(&[finished, returning.func.apply(&return_values)])?;
                    groups_emitted += 1;
                }
            }
            current_group = Some(group);
            having_values.clear();
            return_values.clear();
        }
        having_values.push(row[having_idx]);
        return_values.push(row[return_idx]);
    }
    if let Some(finished) = current_group {
        let having_result = having.func.apply(&having_values);
        if having_op.evaluate(having_result, having_value) {
            out.append_csv_row(&[finished, returning.func.apply(&return_values)])?;
            groups_emitted += 1;
        }
    }

    finalize_result(catalog, buffer, out)?;
    Ok(format!(
        "Grouped '{source}': {groups_emitted} group(s) satisfied HAVING, result in '{result}'"
    ))
}
