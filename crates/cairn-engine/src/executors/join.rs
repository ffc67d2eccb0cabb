//! JOIN: partition hash join for `==`, nested loops otherwise.
//!
//! The equi-join partitions both inputs into `block_count - 1` buckets by
//! `|key| mod k`, persisted as whitespace side files under the temp
//! directory. Each bucket of the left input is then loaded into an
//! in-memory multimap and probed by a streaming scan of the matching
//! right bucket, so at most one partition is resident at a time.

use crate::executors::{
    combined_columns, finalize_result, make_result_table, require_absent,
};
use cairn_buffer::BufferManager;
use cairn_common::{BinaryOperator, CairnError, EngineConfig, Result, Row};
use cairn_storage::{Catalog, Table};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn bucket_path(buffer: &BufferManager, table: &str, pass: usize, bucket: usize) -> PathBuf {
    buffer
        .temp_dir()
        .join(format!("{table}_joinPass{pass}_Bucket{bucket}"))
}

/// Streams a table into `k` bucket files keyed by `|row[col]| mod k`.
fn partition_relation(
    buffer: &BufferManager,
    table: &Table,
    column: usize,
    pass: usize,
    buckets: usize,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(buckets);
    let mut writers = Vec::with_capacity(buckets);
    for b in 0..buckets {
        let path = bucket_path(buffer, &table.name, pass, b);
        writers.push(BufWriter::new(fs::File::create(&path)?));
        paths.push(path);
    }

    let mut cursor = table.cursor(buffer);
    while let Some(row) = cursor.next() {
        let bucket = (row[column].unsigned_abs() as usize) % buckets;
        let text = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writers[bucket], "{text}")?;
    }
    for mut writer in writers {
        writer.flush()?;
    }
    Ok(paths)
}

fn parse_bucket_row(line: &str, column_count: usize, path: &Path) -> Result<Row> {
    let mut row = Row::with_capacity(column_count);
    for token in line.split_whitespace() {
        let value = token.parse::<i64>().map_err(|_| {
            CairnError::InternalInvariant(format!(
                "bad value '{token}' in join bucket {}",
                path.display()
            ))
        })?;
        row.push(value);
    }
    if row.len() != column_count {
        return Err(CairnError::InternalInvariant(format!(
            "short row in join bucket {}",
            path.display()
        )));
    }
    Ok(row)
}

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &EngineConfig,
    buffer: &BufferManager,
    catalog: &mut Catalog,
    result: &str,
    left: &str,
    right: &str,
    left_column: &str,
    op: BinaryOperator,
    right_column: &str,
) -> Result<String> {
    require_absent(catalog, result)?;
    let left_table = catalog.require(left)?;
    let right_table = catalog.require(right)?;
    let left_idx = left_table.column_index(left_column).ok_or_else(|| {
        CairnError::Semantic(format!("column '{left_column}' doesn't exist in '{left}'"))
    })?;
    let right_idx = right_table.column_index(right_column).ok_or_else(|| {
        CairnError::Semantic(format!("column '{right_column}' doesn't exist in '{right}'"))
    })?;

    let out = make_result_table(config, result, combined_columns(left_table, right_table))?;

    if op == BinaryOperator::Equal {
        let buckets = config.block_count.saturating_sub(1).max(1);
        debug!("equi-join {left}/{right} with {buckets} partitions");

        let left_files = partition_relation(buffer, left_table, left_idx, 1, buckets)?;
        let right_files = partition_relation(buffer, right_table, right_idx, 2, buckets)?;

        for b in 0..buckets {
            // Build side: the whole left partition as key -> rows.
            let mut table: HashMap<i64, Vec<Row>> = HashMap::new();
            let build = fs::File::open(&left_files[b])?;
            for line in BufReader::new(build).lines() {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                let row = parse_bucket_row(&line, left_table.column_count, &left_files[b])?;
                table.entry(row[left_idx]).or_default().push(row);
            }

            if !table.is_empty() {
                // Probe side: stream the matching right partition.
                let probe = fs::File::open(&right_files[b])?;
                for line in BufReader::new(probe).lines() {
                    let line = line?;
                    if line.is_empty() {
                        continue;
                    }
                    let row = parse_bucket_row(&line, right_table.column_count, &right_files[b])?;
                    if let Some(matches) = table.get(&row[right_idx]) {
                        for left_row in matches {
                            let mut combined = left_row.clone();
                            combined.extend_from_slice(&row);
                            out.append_csv_row(&combined)?;
                        }
                    }
                }
            }

            buffer.delete_path(&left_files[b]);
            buffer.delete_path(&right_files[b]);
        }
    } else {
        debug!("nested-loop join {left}/{right} ({op})");
        let mut outer = left_table.cursor(buffer);
        while let Some(left_row) = outer.next() {
            let mut inner = right_table.cursor(buffer);
            while let Some(right_row) = inner.next() {
                if op.evaluate(left_row[left_idx], right_row[right_idx]) {
                    let mut combined = left_row.clone();
                    combined.extend_from_slice(&right_row);
                    out.append_csv_row(&combined)?;
                }
            }
        }
    }

    let rows = finalize_result(catalog, buffer, out).map_err(|e| {
        warn!("join result finalization failed: {e}");
        e
    })?;
    Ok(format!("Join produced {rows} row(s) in '{result}'"))
}
