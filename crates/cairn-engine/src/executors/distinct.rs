//! DISTINCT: drop duplicate rows, keeping first occurrences in order.

use crate::executors::{finalize_result, make_result_table, require_absent};
use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result};
use cairn_storage::Catalog;
use std::collections::HashSet;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    source: &str,
) -> Result<String> {
    require_absent(catalog, result)?;
    let table = catalog.require(source)?;

    let out = make_result_table(config, result, table.columns.clone())?;
    let mut seen = HashSet::new();
    let mut cursor = table.cursor(buffer);
    while let Some(row) = cursor.next() {
        if seen.insert(row.clone()) {
            out.append_csv_row(&row)?;
        }
    }

    let rows = finalize_result(catalog, buffer, out)?;
    Ok(format!(
        "Distinct kept {rows} row(s) from '{source}' in '{result}'"
    ))
}
