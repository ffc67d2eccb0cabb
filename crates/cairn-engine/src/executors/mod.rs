//! Query executors, one module per command family.
//!
//! Every executor resolves its tables from the catalog, validates the
//! referenced columns, performs the operation through the storage layer,
//! and returns a one-line status message. Semantic errors surface before
//! any state changes; mid-operation page errors are logged and skipped, so
//! the final message reflects what was actually done.

pub mod clear;
pub mod cross;
pub mod delete;
pub mod distinct;
pub mod export;
pub mod group_by;
pub mod index;
pub mod insert;
pub mod join;
pub mod list;
pub mod load;
pub mod order_by;
pub mod print;
pub mod project;
pub mod rename;
pub mod search;
pub mod select;
pub mod sort;
pub mod update;

use crate::query::{Condition, ParsedQuery};
use cairn_buffer::BufferManager;
use cairn_common::{BinaryOperator, CairnError, EngineConfig, RecordPointer, Result};
use cairn_storage::{Catalog, Table};
use log::warn;

/// Routes a parsed query to its executor. Shell-level queries (SOURCE,
/// QUIT) are handled by the engine before dispatch.
pub fn dispatch(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    query: ParsedQuery,
) -> Result<String> {
    match query {
        ParsedQuery::Load { table } => load::execute(config, buffer, catalog, &table),
        ParsedQuery::Export { table } => export::execute(config, buffer, catalog, &table),
        ParsedQuery::Clear { table } => clear::execute(buffer, catalog, &table),
        ParsedQuery::ListTables => list::execute(catalog),
        ParsedQuery::Print { table } => print::execute(config, buffer, catalog, &table),
        ParsedQuery::Rename { table, from, to } => rename::execute(catalog, &table, &from, &to),
        ParsedQuery::Project {
            result,
            table,
            columns,
        } => project::execute(config, buffer, catalog, &result, &table, &columns),
        ParsedQuery::Select {
            result,
            table,
            column,
            op,
            rhs,
        } => select::execute(config, buffer, catalog, &result, &table, &column, op, &rhs),
        ParsedQuery::Cross {
            result,
            left,
            right,
        } => cross::execute(config, buffer, catalog, &result, &left, &right),
        ParsedQuery::Distinct { result, table } => {
            distinct::execute(config, buffer, catalog, &result, &table)
        }
        ParsedQuery::Join {
            result,
            left,
            right,
            left_column,
            op,
            right_column,
        } => join::execute(
            config,
            buffer,
            catalog,
            &result,
            &left,
            &right,
            &left_column,
            op,
            &right_column,
        ),
        ParsedQuery::Search {
            result,
            table,
            condition,
        } => search::execute(config, buffer, catalog, &result, &table, &condition),
        ParsedQuery::OrderBy {
            result,
            table,
            column,
            order,
        } => order_by::execute(config, buffer, catalog, &result, &table, &column, order),
        ParsedQuery::GroupBy {
            result,
            table,
            group_column,
            having,
            having_op,
            having_value,
            returning,
        } => group_by::execute(
            config,
            buffer,
            catalog,
            &result,
            &table,
            &group_column,
            &having,
            having_op,
            having_value,
            &returning,
        ),
        ParsedQuery::Sort { table, keys } => sort::execute(config, buffer, catalog, &table, &keys),
        ParsedQuery::Index {
            table,
            column,
            strategy,
        } => index::execute(config, buffer, catalog, &table, &column, strategy),
        ParsedQuery::Insert { table, assignments } => {
            insert::execute(buffer, catalog, &table, &assignments)
        }
        ParsedQuery::Update {
            table,
            condition,
            target_column,
            value,
        } => update::execute(buffer, catalog, &table, &condition, &target_column, value),
        ParsedQuery::Delete { table, condition } => {
            delete::execute(buffer, catalog, &table, &condition)
        }
        ParsedQuery::Source { .. } | ParsedQuery::Quit => Err(CairnError::InternalInvariant(
            "shell-level query reached the executor layer".to_string(),
        )),
    }
}

/// Rejects a result name that is already registered.
pub(crate) fn require_absent(catalog: &Catalog, name: &str) -> Result<()> {
    if catalog.has(name) {
        return Err(CairnError::Semantic(format!(
            "resultant relation '{name}' already exists"
        )));
    }
    Ok(())
}

/// Resolves a column to its index, or reports a semantic error naming the
/// table it was missing from.
pub(crate) fn column_index_of(table: &Table, column: &str) -> Result<usize> {
    table.column_index(column).ok_or_else(|| {
        CairnError::Semantic(format!(
            "column '{column}' doesn't exist in relation '{}'",
            table.name
        ))
    })
}

/// Creates a derived table backed by a CSV in the temp directory.
pub(crate) fn make_result_table(
    config: &EngineConfig,
    name: &str,
    columns: Vec<String>,
) -> Result<Table> {
    Table::with_columns(name, columns, config.temp_csv_path(name), config.block_size)
}

/// Paginates a materialized result table and registers it.
pub(crate) fn finalize_result(
    catalog: &mut Catalog,
    buffer: &BufferManager,
    mut table: Table,
) -> Result<usize> {
    table.blockify(buffer)?;
    let rows = table.row_count;
    catalog.insert(table)?;
    Ok(rows)
}

/// Output schema of a two-table operator: left columns then right columns,
/// with colliding names prefixed by their source table.
pub(crate) fn combined_columns(left: &Table, right: &Table) -> Vec<String> {
    let mut columns = Vec::with_capacity(left.column_count + right.column_count);
    for column in &left.columns {
        if right.is_column(column) {
            columns.push(format!("{}_{column}", left.name));
        } else {
            columns.push(column.clone());
        }
    }
    for column in &right.columns {
        if left.is_column(column) {
            columns.push(format!("{}_{column}", right.name));
        } else {
            columns.push(column.clone());
        }
    }
    columns
}

/// Record pointers of every row satisfying `condition`, for the DML
/// executors. An equality condition on an indexed column is answered from
/// the index (stale pointers dropped and logged); anything else falls back
/// to a full scan, deriving addresses from the cursor position.
pub(crate) fn matching_pointers(
    table: &Table,
    buffer: &BufferManager,
    condition: &Condition,
    condition_idx: usize,
) -> Result<Vec<RecordPointer>> {
    if condition.op == BinaryOperator::Equal {
        if let Some(tree) = table.index_for(&condition.column) {
            let mut pointers = Vec::new();
            for pointer in tree.search_key(buffer, condition.value)? {
                if table.pointer_valid(pointer) {
                    pointers.push(pointer);
                } else {
                    warn!(
                        "{}",
                        CairnError::IndexStale {
                            table: table.name.clone(),
                            pointer,
                        }
                    );
                }
            }
            return Ok(pointers);
        }
    }

    let mut pointers = Vec::new();
    let mut cursor = table.cursor(buffer);
    while let Some(row) = cursor.next() {
        if condition.op.evaluate(row[condition_idx], condition.value) {
            match cursor.position() {
                Some(pointer) if table.pointer_valid(pointer) => pointers.push(pointer),
                _ => warn!(
                    "scan of '{}' could not address a matching row; skipped",
                    table.name
                ),
            }
        }
    }
    Ok(pointers)
}

/// Picks a synthetic table name not present in the catalog.
pub(crate) fn unique_temp_name(catalog: &Catalog, base: &str) -> String {
    if !catalog.has(base) {
        return base.to_string();
    }
    let mut attempt = 1;
    loop {
        let candidate = format!("{base}_{attempt}");
        if !catalog.has(&candidate) {
            return candidate;
        }
        attempt += 1;
    }
}
