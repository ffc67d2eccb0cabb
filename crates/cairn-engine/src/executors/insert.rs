//! INSERT: append one row and maintain every index.

use crate::executors::column_index_of;
use cairn_buffer::BufferManager;
use cairn_common::Result;
use cairn_storage::Catalog;
use log::warn;

pub fn execute(
    buffer: &BufferManager,
    catalog: &mut Catalog,
    table_name: &str,
    assignments: &[(String, i64)],
) -> Result<String> {
    let table = catalog.require_mut(table_name)?;

    // Named columns fill their slots; everything else defaults to zero.
    let mut row = vec![0i64; table.column_count];
    for (column, value) in assignments {
        let idx = column_index_of(table, column)?;
        row[idx] = *value;
    }

    let pointer = table.append_row(buffer, row.clone())?;
    for (column, tree) in table.indexes_mut() {
        let key = row[tree.column_index()];
        if let Err(e) = tree.insert(buffer, key, pointer) {
            // Data is authoritative; a failed index write only degrades the
            // index, which INDEX can rebuild.
            warn!("insert into '{table_name}': index on '{column}' not updated: {e}");
        }
    }

    Ok(format!("1 row inserted into '{table_name}'"))
}
