//! PRINT: show the first rows of a table.

use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result};
use cairn_storage::Catalog;
use std::fmt::Write;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &Catalog,
    name: &str,
) -> Result<String> {
    let table = catalog.require(name)?;
    let mut out = String::new();
    writeln!(out, "{}", table.columns.join(", ")).ok();

    let limit = config.print_count.min(table.row_count);
    let mut cursor = table.cursor(buffer);
    for _ in 0..limit {
        let Some(row) = cursor.next() else { break };
        let text = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "{text}").ok();
    }
    write!(out, "Row count: {}", table.row_count).ok();
    Ok(out)
}
