//! Configuration structures for CairnDB.

use crate::types::CELL_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default block size in bytes (1 KB).
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default number of pages the buffer manager may hold in memory.
pub const DEFAULT_BLOCK_COUNT: usize = 10;

/// Default number of rows shown by PRINT.
pub const DEFAULT_PRINT_COUNT: usize = 20;

/// Engine configuration.
///
/// All bounded-memory algorithms (external sort, hash join, the page cache)
/// derive their budgets from `block_size` and `block_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory for permanent CSV files and scripts.
    pub data_dir: PathBuf,
    /// Size of one block file in bytes.
    pub block_size: usize,
    /// Maximum number of pages resident in the buffer manager.
    pub block_count: usize,
    /// Number of rows printed by the PRINT command.
    pub print_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            print_count: DEFAULT_PRINT_COUNT,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration rooted at the given data directory.
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Directory holding block files, index node files, and join buckets.
    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    /// Path of the permanent CSV file for a table.
    pub fn csv_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.csv"))
    }

    /// Path of the temporary CSV file backing a derived table.
    pub fn temp_csv_path(&self, table: &str) -> PathBuf {
        self.temp_dir().join(format!("{table}.csv"))
    }

    /// Path of a query script for the SOURCE command.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.ra"))
    }

    /// Returns true if `path` lies under the temporary directory.
    pub fn is_temp_path(&self, path: &Path) -> bool {
        path.starts_with(self.temp_dir())
    }

    /// Maximum number of rows a block can hold for the given column count.
    ///
    /// Always at least one, so that a row wider than a block still pages.
    pub fn max_rows_per_block(&self, column_count: usize) -> usize {
        if column_count == 0 {
            return 1;
        }
        (self.block_size / (CELL_SIZE * column_count)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.block_count, 10);
        assert_eq!(config.print_count, 20);
    }

    #[test]
    fn test_engine_config_paths() {
        let config = EngineConfig::with_data_dir("/var/lib/cairn");
        assert_eq!(config.temp_dir(), PathBuf::from("/var/lib/cairn/temp"));
        assert_eq!(
            config.csv_path("users"),
            PathBuf::from("/var/lib/cairn/users.csv")
        );
        assert_eq!(
            config.temp_csv_path("users_run_0"),
            PathBuf::from("/var/lib/cairn/temp/users_run_0.csv")
        );
        assert_eq!(
            config.script_path("setup"),
            PathBuf::from("/var/lib/cairn/setup.ra")
        );
    }

    #[test]
    fn test_engine_config_is_temp_path() {
        let config = EngineConfig::with_data_dir("/data");
        assert!(config.is_temp_path(Path::new("/data/temp/t.csv")));
        assert!(!config.is_temp_path(Path::new("/data/t.csv")));
        assert!(!config.is_temp_path(Path::new("/elsewhere/temp/t.csv")));
    }

    #[test]
    fn test_max_rows_per_block() {
        let config = EngineConfig::default();
        // 1024 bytes / (8 bytes * 2 columns) = 64 rows
        assert_eq!(config.max_rows_per_block(2), 64);
        // 1024 / (8 * 4) = 32
        assert_eq!(config.max_rows_per_block(4), 32);
        // A very wide row still fits at least one row per block
        assert_eq!(config.max_rows_per_block(1000), 1);
        // Degenerate column count
        assert_eq!(config.max_rows_per_block(0), 1);
    }

    #[test]
    fn test_engine_config_serde_roundtrip() {
        let original = EngineConfig::default();
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(original.data_dir, deserialized.data_dir);
        assert_eq!(original.block_size, deserialized.block_size);
        assert_eq!(original.block_count, deserialized.block_count);
        assert_eq!(original.print_count, deserialized.print_count);
    }

    #[test]
    fn test_engine_config_clone() {
        let config1 = EngineConfig::default();
        let config2 = config1.clone();
        assert_eq!(config1.block_size, config2.block_size);
        assert_eq!(config1.data_dir, config2.data_dir);
    }
}
