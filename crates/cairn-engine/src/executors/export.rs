//! EXPORT: write the permanent CSV from current table state.

use cairn_buffer::BufferManager;
use cairn_common::{EngineConfig, Result};
use cairn_storage::Catalog;
use log::info;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    name: &str,
) -> Result<String> {
    let table = catalog.require_mut(name)?;
    let path = config.csv_path(name);
    table.export(buffer, &path)?;
    // The table is now permanent: its source follows the exported file, so
    // a later CLEAR keeps the CSV.
    table.source_file = path.clone();
    info!("exported '{name}' to {}", path.display());
    Ok(format!("Exported relation '{name}' to {}", path.display()))
}
