//! RENAME: rename a column in place.

use cairn_common::Result;
use cairn_storage::Catalog;

pub fn execute(catalog: &mut Catalog, table: &str, from: &str, to: &str) -> Result<String> {
    let table = catalog.require_mut(table)?;
    table.rename_column(from, to)?;
    Ok(format!(
        "Renamed column '{from}' to '{to}' in relation '{}'",
        table.name
    ))
}
