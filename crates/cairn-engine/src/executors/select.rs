//! SELECT: filter rows by a column-vs-column or column-vs-literal condition.

use crate::executors::{column_index_of, finalize_result, make_result_table, require_absent};
use crate::query::SelectRhs;
use cairn_buffer::BufferManager;
use cairn_common::{BinaryOperator, EngineConfig, Result};
use cairn_storage::Catalog;

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    source: &str,
    column: &str,
    op: BinaryOperator,
    rhs: &SelectRhs,
) -> Result<String> {
    require_absent(catalog, result)?;
    let table = catalog.require(source)?;
    let left_idx = column_index_of(table, column)?;
    #[derive(Clone, Copy)]
    enum Rhs {
        Index(usize),
        Literal(i64),
    }
    let rhs = match rhs {
        SelectRhs::Column(name) => Rhs::Index(column_index_of(table, name)?),
        SelectRhs::Literal(value) => Rhs::Literal(*value),
    };

    let out = make_result_table(config, result, table.columns.clone())?;
    let mut matched = 0usize;
    let mut cursor = table.cursor(buffer);
    while let Some(row) = cursor.next() {
        let right = match rhs {
            Rhs::Index(idx) => row[idx],
            Rhs::Literal(value) => value,
        };
        if op.evaluate(row[left_idx], right) {
            out.append_csv_row(&row)?;
            matched += 1;
        }
    }

    finalize_result(catalog, buffer, out)?;
    Ok(format!(
        "Selected {matched} row(s) from '{source}' into '{result}'"
    ))
}
