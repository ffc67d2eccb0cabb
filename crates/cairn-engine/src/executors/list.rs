//! LIST TABLES: enumerate live tables.

use cairn_common::Result;
use cairn_storage::Catalog;

pub fn execute(catalog: &Catalog) -> Result<String> {
    let names = catalog.names();
    if names.is_empty() {
        return Ok("No relations loaded".to_string());
    }
    let mut out = names.join("\n");
    out.push_str(&format!("\nRelation count: {}", names.len()));
    Ok(out)
}
