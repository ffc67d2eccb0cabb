//! INDEX ON ... USING BTREE | NOTHING: create or drop a secondary index.

use crate::executors::column_index_of;
use crate::query::IndexStrategy;
use cairn_buffer::BufferManager;
use cairn_common::{CairnError, EngineConfig, Result};
use cairn_storage::{BTree, Catalog};
use log::info;

pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    table_name: &str,
    column: &str,
    strategy: IndexStrategy,
) -> Result<String> {
    let table = catalog.require_mut(table_name)?;
    let column_idx = column_index_of(table, column)?;

    match strategy {
        IndexStrategy::BTree => {
            if table.has_index(column) {
                return Err(CairnError::Semantic(format!(
                    "relation '{table_name}' is already indexed on '{column}'"
                )));
            }
            let mut tree = BTree::new(table_name, column, column_idx, config.block_size);
            tree.build(buffer, table.column_count, &table.rows_per_block)?;
            info!(
                "indexed '{table_name}.{column}' ({} node pages)",
                tree.node_count()
            );
            table.add_index(column, tree);
            Ok(format!("Built B+ tree index on '{table_name}.{column}'"))
        }
        IndexStrategy::Nothing => match table.remove_index(column) {
            Some(mut tree) => {
                tree.drop_files(buffer);
                Ok(format!("Removed index on '{table_name}.{column}'"))
            }
            None => Err(CairnError::Semantic(format!(
                "relation '{table_name}' is not indexed on '{column}'"
            ))),
        },
    }
}
