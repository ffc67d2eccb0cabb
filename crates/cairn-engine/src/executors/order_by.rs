//! ORDER BY: sorted copy of a table under a new name.
//!
//! Thin wrapper over the external sort: materialize the source into a
//! temporary table, SORT it in place with the single key, then copy the
//! rows into the named result.

use crate::executors::{
    column_index_of, finalize_result, make_result_table, require_absent, sort, unique_temp_name,
};
use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result, SortOrder};
use cairn_storage::{Catalog, Cursor};

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    source: &str,
    column: &str,
    order: SortOrder,
) -> Result<String> {
    require_absent(catalog, result)?;
    let (columns, column_count, rows_per_block) = {
        let table = catalog.require(source)?;
        column_index_of(table, column)?;
        (
            table.columns.clone(),
            table.column_count,
            table.rows_per_block.clone(),
        )
    };

    let staging_name = unique_temp_name(catalog, &format!("{result}_staging"));
    let staging = make_result_table(config, &staging_name, columns.clone())?;
    let mut cursor = Cursor::new(buffer, source, column_count, rows_per_block);
    while let Some(row) = cursor.next() {
        staging.append_csv_row(&row)?;
    }
    finalize_result(catalog, buffer, staging)?;

    sort::execute(
        config,
        buffer,
        catalog,
        &staging_name,
        &[(column.to_string(), order)],
    )?;

    let (staging_columns, staging_blocks) = {
        let staging = catalog.require(&staging_name)?;
        (staging.column_count, staging.rows_per_block.clone())
    };
    let out = make_result_table(config, result, columns)?;
    let mut sorted_cursor = Cursor::new(buffer, &staging_name, staging_columns, staging_blocks);
    while let Some(row) = sorted_cursor.next() {
        out.append_csv_row(&row)?;
    }
    let rows = finalize_result(catalog, buffer, out)?;
    catalog.remove(&staging_name, buffer);

    Ok(format!("Ordered {rows} row(s) into '{result}'"))
}
