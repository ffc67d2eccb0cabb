//! PROJECT: keep a subset of columns.

use crate::executors::{column_index_of, finalize_result, make_result_table, require_absent};
use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result};
use cairn_storage::Catalog;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    source: &str,
    columns: &[String],
) -> Result<String> {
    require_absent(catalog, result)?;
    let table = catalog.require(source)?;
    let mut indices = Vec::with_capacity(columns.len());
    for column in columns {
        indices.push(column_index_of(table, column)?);
    }

    let out = make_result_table(config, result, columns.to_vec())?;
    let mut cursor = table.cursor(buffer);
    while let Some(row) = cursor.next() {
        let projected: Vec<i64> = indices.iter().map(|&i| row[i]).collect();
        out.append_csv_row(&projected)?;
    }

    let rows = finalize_result(catalog, buffer, out)?;
    Ok(format!(
        "Projected {rows} row(s) from '{source}' into '{result}'"
    ))
}
