//! CLEAR: unload a table and delete its temporary files.

use cairn_buffer::BufferManager;
use cairn_common::{CairnError, Result};
use cairn_storage::Catalog;

pub fn execute(buffer: &BufferManager, catalog: &mut Catalog, name: &str) -> Result<String> {
    if !catalog.remove(name, buffer) {
        return Err(CairnError::TableNotFound(name.to_string()));
    }
    Ok(format!("Cleared relation '{name}'"))
}
