//! The base relation: schema, pagination metadata, source CSV, and indexes.
//!
//! A table's bytes live in block files owned by the buffer manager; the
//! table itself owns the accounting (`rows_per_block`, `row_count`,
//! `block_count`) and the map of secondary indexes keyed by column name.
//! Row-level mutation primitives keep the accounting invariants:
//! `row_count == Σ rows_per_block` and `block_count == |rows_per_block|`.

use crate::btree::BTree;
use crate::cursor::Cursor;
use cairn_buffer::BufferManager;
use cairn_common::{CairnError, RecordPointer, Result, Row};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A relation with integer columns.
#[derive(Debug)]
pub struct Table {
    /// Table name; also the owner namespace of its block files.
    pub name: String,
    /// CSV file the table was loaded from or materializes into.
    pub source_file: PathBuf,
    /// Ordered column names.
    pub columns: Vec<String>,
    /// Number of columns.
    pub column_count: usize,
    /// Total number of rows across all pages.
    pub row_count: usize,
    /// Number of block files (never decremented; pages may become empty).
    pub block_count: usize,
    /// Maximum rows a single block may hold.
    pub max_rows_per_block: usize,
    /// Rows currently stored in each block.
    pub rows_per_block: Vec<usize>,
    /// Per-column distinct-value counts gathered at load time.
    pub distinct_counts: Vec<usize>,
    indexes: HashMap<String, BTree>,
}

impl Table {
    /// Creates a table shell for the LOAD path. Schema and pages are
    /// populated by [`load`](Table::load).
    pub fn from_csv(name: &str, source_file: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            source_file,
            columns: Vec::new(),
            column_count: 0,
            row_count: 0,
            block_count: 0,
            max_rows_per_block: 0,
            rows_per_block: Vec::new(),
            distinct_counts: Vec::new(),
            indexes: HashMap::new(),
        }
    }

    /// Creates a derived table with a known schema, writing the CSV header
    /// to `source_file`. Used by the assignment operators; rows are
    /// appended with [`append_csv_row`](Table::append_csv_row) and
    /// paginated by [`blockify`](Table::blockify).
    pub fn with_columns(
        name: &str,
        columns: Vec<String>,
        source_file: PathBuf,
        block_size: usize,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.clone()) {
                return Err(CairnError::Semantic(format!(
                    "duplicate column name '{column}'"
                )));
            }
        }
        if columns.is_empty() {
            return Err(CairnError::Semantic("table has no columns".to_string()));
        }

        let mut file = fs::File::create(&source_file)?;
        writeln!(file, "{}", columns.join(","))?;

        let column_count = columns.len();
        Ok(Self {
            name: name.to_string(),
            source_file,
            columns,
            column_count,
            row_count: 0,
            block_count: 0,
            max_rows_per_block: max_rows_per_block(block_size, column_count),
            rows_per_block: Vec::new(),
            distinct_counts: Vec::new(),
            indexes: HashMap::new(),
        })
    }

    /// Loads the table from its source CSV: parses the header into the
    /// column list, then paginates the data rows.
    pub fn load(&mut self, buffer: &BufferManager, block_size: usize) -> Result<()> {
        let file = fs::File::open(&self.source_file)?;
        let mut reader = BufReader::new(file);
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(CairnError::Semantic(format!(
                "data file for '{}' is empty",
                self.name
            )));
        }
        self.extract_column_names(header.trim_end())?;
        self.max_rows_per_block = max_rows_per_block(block_size, self.column_count);
        self.blockify(buffer)
    }

    fn extract_column_names(&mut self, header: &str) -> Result<()> {
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for raw in header.split(',') {
            let name = raw.trim().trim_matches('"').to_string();
            if name.is_empty() {
                return Err(CairnError::Semantic("empty column name in header".to_string()));
            }
            if !seen.insert(name.clone()) {
                return Err(CairnError::Semantic(format!(
                    "duplicate column name '{name}'"
                )));
            }
            columns.push(name);
        }
        if columns.is_empty() {
            return Err(CairnError::Semantic("no columns found in header".to_string()));
        }
        self.column_count = columns.len();
        self.columns = columns;
        Ok(())
    }

    /// Streams the source CSV into block files of at most
    /// `max_rows_per_block` rows, maintaining row accounting and
    /// per-column distinct-value counts.
    pub fn blockify(&mut self, buffer: &BufferManager) -> Result<()> {
        let file = fs::File::open(&self.source_file)?;
        let reader = BufReader::new(file);

        self.row_count = 0;
        self.block_count = 0;
        self.rows_per_block.clear();
        let mut distinct: Vec<HashSet<i64>> = vec![HashSet::new(); self.column_count];

        let mut page_rows: Vec<Row> = Vec::with_capacity(self.max_rows_per_block);
        for (line_no, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row = self.parse_csv_row(&line, line_no + 1)?;
            for (set, value) in distinct.iter_mut().zip(&row) {
                set.insert(*value);
            }
            page_rows.push(row);
            self.row_count += 1;

            if page_rows.len() == self.max_rows_per_block {
                buffer.write_page(&self.name, self.block_count, &page_rows, page_rows.len())?;
                self.rows_per_block.push(page_rows.len());
                self.block_count += 1;
                page_rows.clear();
            }
        }
        if !page_rows.is_empty() {
            buffer.write_page(&self.name, self.block_count, &page_rows, page_rows.len())?;
            self.rows_per_block.push(page_rows.len());
            self.block_count += 1;
        }

        self.distinct_counts = distinct.into_iter().map(|s| s.len()).collect();
        debug!(
            "blockified '{}': {} rows in {} blocks",
            self.name, self.row_count, self.block_count
        );
        Ok(())
    }

    fn parse_csv_row(&self, line: &str, line_no: usize) -> Result<Row> {
        let mut row = Row::with_capacity(self.column_count);
        for token in line.split(',') {
            let token = token.trim();
            let value = token.parse::<i64>().map_err(|_| {
                CairnError::Semantic(format!(
                    "invalid integer '{token}' at line {line_no} of {}",
                    self.source_file.display()
                ))
            })?;
            row.push(value);
        }
        if row.len() != self.column_count {
            return Err(CairnError::Semantic(format!(
                "line {line_no} has {} values, expected {} ({})",
                row.len(),
                self.column_count,
                self.source_file.display()
            )));
        }
        Ok(row)
    }

    /// Appends one row to the source CSV without touching pages. Used while
    /// materializing derived tables before their final `blockify`.
    pub fn append_csv_row(&self, row: &[i64]) -> Result<()> {
        let mut file = fs::OpenOptions::new().append(true).open(&self.source_file)?;
        let text = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(file, "{text}")?;
        Ok(())
    }

    /// Appends a row to the last page if it has a free slot, otherwise
    /// allocates a new page. Returns the new row's physical address.
    pub fn append_row(&mut self, buffer: &BufferManager, row: Row) -> Result<RecordPointer> {
        if row.len() != self.column_count {
            return Err(CairnError::Semantic(format!(
                "row has {} values, expected {}",
                row.len(),
                self.column_count
            )));
        }

        let last = self.block_count.checked_sub(1);
        if let Some(last) = last {
            let used = self.rows_per_block[last];
            if used < self.max_rows_per_block {
                let page = self
                    .buffer_page(buffer, last)?;
                let mut rows = page.rows().to_vec();
                rows.push(row);
                let n = rows.len();
                buffer.write_page(&self.name, last, &rows, n)?;
                self.rows_per_block[last] = n;
                self.row_count += 1;
                return Ok(RecordPointer::new(last, n - 1));
            }
        }

        // No room in the last page (or no pages yet): open a fresh one.
        buffer.write_page(&self.name, self.block_count, std::slice::from_ref(&row), 1)?;
        self.rows_per_block.push(1);
        self.block_count += 1;
        self.row_count += 1;
        Ok(RecordPointer::new(self.block_count - 1, 0))
    }

    /// Rewrites page `page_index` with `rows`, updating `rows_per_block`
    /// and adjusting `row_count` by the length delta.
    pub fn rewrite_page(
        &mut self,
        buffer: &BufferManager,
        page_index: usize,
        rows: Vec<Row>,
    ) -> Result<()> {
        if page_index >= self.block_count {
            return Err(CairnError::InternalInvariant(format!(
                "rewrite of page {page_index} beyond block count {} of '{}'",
                self.block_count, self.name
            )));
        }
        if rows.len() > self.max_rows_per_block {
            return Err(CairnError::InternalInvariant(format!(
                "page {page_index} of '{}' rewritten with {} rows, max {}",
                self.name,
                rows.len(),
                self.max_rows_per_block
            )));
        }
        let n = rows.len();
        buffer.write_page(&self.name, page_index, &rows, n)?;
        let old = self.rows_per_block[page_index];
        self.rows_per_block[page_index] = n;
        self.row_count = self.row_count + n - old;
        Ok(())
    }

    /// Clears every page and repaginates the table from a row iterator.
    /// Used by the external sort's write-back.
    pub fn replace_rows<I>(&mut self, buffer: &BufferManager, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Row>,
    {
        for i in 0..self.block_count {
            buffer.delete_file(&self.name, i);
        }
        self.row_count = 0;
        self.block_count = 0;
        self.rows_per_block.clear();

        let mut page_rows: Vec<Row> = Vec::with_capacity(self.max_rows_per_block);
        for row in rows {
            page_rows.push(row);
            self.row_count += 1;
            if page_rows.len() == self.max_rows_per_block {
                buffer.write_page(&self.name, self.block_count, &page_rows, page_rows.len())?;
                self.rows_per_block.push(page_rows.len());
                self.block_count += 1;
                page_rows.clear();
            }
        }
        if !page_rows.is_empty() {
            buffer.write_page(&self.name, self.block_count, &page_rows, page_rows.len())?;
            self.rows_per_block.push(page_rows.len());
            self.block_count += 1;
        }
        Ok(())
    }

    /// Fetches the page holding `page_index` through the buffer manager.
    fn buffer_page(
        &self,
        buffer: &BufferManager,
        page_index: usize,
    ) -> Result<std::sync::Arc<cairn_buffer::Page>> {
        buffer.get_page(
            &self.name,
            page_index,
            self.rows_per_block[page_index],
            self.column_count,
        )
    }

    /// Returns true if `ptr` addresses a live row of this table.
    pub fn pointer_valid(&self, ptr: RecordPointer) -> bool {
        ptr.page < self.block_count && ptr.row < self.rows_per_block[ptr.page]
    }

    /// Fetches the row addressed by `ptr`, or `None` if the pointer is out
    /// of range for the page file's current contents.
    pub fn fetch_row(&self, buffer: &BufferManager, ptr: RecordPointer) -> Result<Option<Row>> {
        if !self.pointer_valid(ptr) {
            return Ok(None);
        }
        let page = self.buffer_page(buffer, ptr.page)?;
        Ok(page.row(ptr.row).map(|r| r.to_vec()))
    }

    /// Opens a forward cursor over this table.
    pub fn cursor<'a>(&self, buffer: &'a BufferManager) -> Cursor<'a> {
        Cursor::new(
            buffer,
            &self.name,
            self.column_count,
            self.rows_per_block.clone(),
        )
    }

    /// Index of `column` in the schema.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Returns true if `column` is part of the schema.
    pub fn is_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Renames a column, carrying any index on it to the new name.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if self.is_column(to) {
            return Err(CairnError::NameInUse(to.to_string()));
        }
        let idx = self
            .column_index(from)
            .ok_or_else(|| CairnError::ColumnNotFound(from.to_string()))?;
        self.columns[idx] = to.to_string();
        if let Some(mut tree) = self.indexes.remove(from) {
            tree.set_column_name(to);
            self.indexes.insert(to.to_string(), tree);
        }
        Ok(())
    }

    /// Writes the table as a CSV at `path` from a fresh full scan.
    pub fn export(&self, buffer: &BufferManager, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path)?;
        writeln!(file, "{}", self.columns.join(","))?;
        let mut cursor = self.cursor(buffer);
        while let Some(row) = cursor.next() {
            let text = row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",");
            writeln!(file, "{text}")?;
        }
        Ok(())
    }

    /// Rebuilds all pages from the current source CSV, then rebuilds every
    /// index (page addresses are not stable across a repagination).
    pub fn reload(&mut self, buffer: &BufferManager) -> Result<()> {
        for i in 0..self.block_count {
            buffer.delete_file(&self.name, i);
        }
        self.row_count = 0;
        self.block_count = 0;
        self.rows_per_block.clear();
        self.blockify(buffer)?;
        self.rebuild_indexes(buffer)
    }

    /// Deletes all on-disk state: index node files, page files, and the
    /// source CSV when it lives under the temp directory (permanent
    /// exports are kept).
    pub fn unload(&mut self, buffer: &BufferManager) {
        for (_, tree) in self.indexes.iter_mut() {
            tree.drop_files(buffer);
        }
        self.indexes.clear();
        for i in 0..self.block_count {
            buffer.delete_file(&self.name, i);
        }
        if self.source_file.starts_with(buffer.temp_dir()) {
            buffer.delete_path(&self.source_file);
        }
    }

    // --- Index management ---

    /// Registers an index on `column`, replacing any previous one.
    pub fn add_index(&mut self, column: &str, tree: BTree) {
        self.indexes.insert(column.to_string(), tree);
    }

    /// Removes and returns the index on `column`.
    pub fn remove_index(&mut self, column: &str) -> Option<BTree> {
        self.indexes.remove(column)
    }

    /// The index on `column`, if one exists.
    pub fn index_for(&self, column: &str) -> Option<&BTree> {
        self.indexes.get(column)
    }

    /// Mutable access to the index on `column`.
    pub fn index_for_mut(&mut self, column: &str) -> Option<&mut BTree> {
        self.indexes.get_mut(column)
    }

    /// Returns true if `column` is indexed.
    pub fn has_index(&self, column: &str) -> bool {
        self.indexes.contains_key(column)
    }

    /// Iterates all indexes mutably.
    pub fn indexes_mut(&mut self) -> impl Iterator<Item = (&String, &mut BTree)> {
        self.indexes.iter_mut()
    }

    /// Names of the indexed columns.
    pub fn indexed_columns(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Rebuilds every index from the current data pages. Failures are
    /// logged; the data state stays authoritative.
    pub fn rebuild_indexes(&mut self, buffer: &BufferManager) -> Result<()> {
        if self.indexes.is_empty() {
            return Ok(());
        }
        let mut indexes = std::mem::take(&mut self.indexes);
        for (column, tree) in indexes.iter_mut() {
            if let Err(e) = tree.build(buffer, self.column_count, &self.rows_per_block) {
                warn!(
                    "rebuilding index on {}.{column} failed: {e}; index dropped",
                    self.name
                );
                tree.drop_files(buffer);
            }
        }
        self.indexes = indexes;
        Ok(())
    }
}

/// Maximum rows per block for the given block size and row width.
pub fn max_rows_per_block(block_size: usize, column_count: usize) -> usize {
    if column_count == 0 {
        return 1;
    }
    (block_size / (cairn_common::CELL_SIZE * column_count)).max(1)
}
