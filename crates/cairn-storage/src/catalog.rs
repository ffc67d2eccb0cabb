//! Process-wide registry of live tables.

use crate::table::Table;
use cairn_buffer::BufferManager;
use cairn_common::{CairnError, Result};
use log::debug;
use std::collections::HashMap;

/// Single owner of every live table, keyed by name.
#[derive(Default)]
pub struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under its name. A duplicate name is rejected.
    pub fn insert(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(&table.name) {
            return Err(CairnError::NameInUse(table.name.clone()));
        }
        debug!("catalog: registered '{}'", table.name);
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Looks up a table by name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Looks up a table mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Looks up a table, producing `TableNotFound` when missing.
    pub fn require(&self, name: &str) -> Result<&Table> {
        self.get(name)
            .ok_or_else(|| CairnError::TableNotFound(name.to_string()))
    }

    /// Mutable variant of [`require`](Catalog::require).
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| CairnError::TableNotFound(name.to_string()))
    }

    /// Returns true if a table with this name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Sorted names of all live tables.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no tables are registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Unregisters a table and deletes its on-disk state: first its
    /// indexes' node files, then its page files, then its temporary source
    /// CSV (permanent exports are kept). Returns true if the table existed.
    pub fn remove(&mut self, name: &str, buffer: &BufferManager) -> bool {
        match self.tables.remove(name) {
            Some(mut table) => {
                table.unload(buffer);
                debug!("catalog: removed '{name}'");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_catalog() -> (Catalog, BufferManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let buffer = BufferManager::new(dir.path().join("temp"), 8).unwrap();
        (Catalog::new(), buffer, dir)
    }

    fn make_table(dir: &std::path::Path, buffer: &BufferManager, name: &str) -> Table {
        let csv = dir.join(format!("{name}.csv"));
        fs::write(&csv, "a,b\n1,2\n").unwrap();
        let mut table = Table::from_csv(name, csv);
        table.load(buffer, 1024).unwrap();
        table
    }

    #[test]
    fn test_insert_and_get() {
        let (mut catalog, buffer, dir) = create_test_catalog();
        let table = make_table(dir.path(), &buffer, "T");
        catalog.insert(table).unwrap();

        assert!(catalog.has("T"));
        assert_eq!(catalog.get("T").unwrap().row_count, 1);
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_insert_duplicate_name() {
        let (mut catalog, buffer, dir) = create_test_catalog();
        catalog
            .insert(make_table(dir.path(), &buffer, "T"))
            .unwrap();
        let err = catalog
            .insert(Table::from_csv("T", dir.path().join("T.csv")))
            .unwrap_err();
        assert!(matches!(err, CairnError::NameInUse(_)));
    }

    #[test]
    fn test_require_missing() {
        let (catalog, _buffer, _dir) = create_test_catalog();
        assert!(matches!(
            catalog.require("ghost"),
            Err(CairnError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_names_sorted() {
        let (mut catalog, buffer, dir) = create_test_catalog();
        for name in ["zeta", "alpha", "mid"] {
            catalog.insert(make_table(dir.path(), &buffer, name)).unwrap();
        }
        assert_eq!(catalog.names(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_remove_deletes_pages() {
        let (mut catalog, buffer, dir) = create_test_catalog();
        catalog
            .insert(make_table(dir.path(), &buffer, "T"))
            .unwrap();
        let page0 = buffer.page_path("T", 0);
        assert!(page0.exists());

        assert!(catalog.remove("T", &buffer));
        assert!(!catalog.has("T"));
        assert!(!page0.exists());
        // Removing again reports absence
        assert!(!catalog.remove("T", &buffer));
    }
}
