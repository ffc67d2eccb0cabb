//! CROSS: cartesian product of two tables.

use crate::executors::{combined_columns, finalize_result, make_result_table, require_absent};
use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result};
use cairn_storage::Catalog;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    left: &str,
    right: &str,
) -> Result<String> {
    require_absent(catalog, result)?;
    let left_table = catalog.require(left)?;
    let right_table = catalog.require(right)?;

    let out = make_result_table(
        config,
        result,
        combined_columns(left_table, right_table),
    )?;

    let mut outer = left_table.cursor(buffer);
    while let Some(left_row) = outer.next() {
        let mut inner = right_table.cursor(buffer);
        while let Some(right_row) = inner.next() {
            let mut combined = left_row.clone();
            combined.extend_from_slice(&right_row);
            out.append_csv_row(&combined)?;
        }
    }

    let rows = finalize_result(catalog, buffer, out)?;
    Ok(format!("Cross product produced {rows} row(s) in '{result}'"))
}
