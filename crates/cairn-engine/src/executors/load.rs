//! LOAD: read `<data>/<table>.csv` into pages.

use cairn_buffer::BufferManager;
use cairn_common::{CairnError, EngineConfig, Result};
use cairn_storage::{Catalog, Table};
use log::info;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    name: &str,
) -> Result<String> {
    if catalog.has(name) {
        return Err(CairnError::NameInUse(name.to_string()));
    }
    let csv = config.csv_path(name);
    if !csv.is_file() {
        return Err(CairnError::Semantic(format!(
            "no data file for relation '{name}' at {}",
            csv.display()
        )));
    }

    let mut table = Table::from_csv(name, csv);
    table.load(buffer, config.block_size)?;
    let rows = table.row_count;
    let blocks = table.block_count;
    catalog.insert(table)?;
    info!("loaded '{name}': {rows} rows in {blocks} blocks");
    Ok(format!("Loaded relation '{name}'. Rows: {rows}"))
}
