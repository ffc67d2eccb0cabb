//! Forward row iterator over a table.

use cairn_buffer::{BufferManager, Page};
use cairn_common::{RecordPointer, Result, Row};
use log::warn;
use std::sync::Arc;

/// Iterates the rows of one table in page order, then in-page row order.
///
/// The cursor captures a snapshot of the table's page metadata at creation;
/// mutating the table while a cursor is open is not supported. After
/// [`next`](Cursor::next) returns the row at `(p, r)`, the cursor's state
/// satisfies `page_index == p` and `page_pointer == r + 1`, and
/// [`position`](Cursor::position) resolves that address, using the snapshot
/// to disambiguate page boundaries.
pub struct Cursor<'a> {
    buffer: &'a BufferManager,
    owner: String,
    column_count: usize,
    rows_per_block: Vec<usize>,
    page_index: usize,
    page_pointer: usize,
    page: Option<Arc<Page>>,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned before the first row.
    pub fn new(
        buffer: &'a BufferManager,
        owner: &str,
        column_count: usize,
        rows_per_block: Vec<usize>,
    ) -> Self {
        Self {
            buffer,
            owner: owner.to_string(),
            column_count,
            rows_per_block,
            page_index: 0,
            page_pointer: 0,
            page: None,
        }
    }

    /// Returns the next row, or `None` when the table is exhausted.
    ///
    /// A page that fails to load is logged and skipped; iteration proceeds
    /// with the following page.
    pub fn next(&mut self) -> Option<Row> {
        loop {
            if self.page.is_none() {
                if self.page_index >= self.rows_per_block.len() {
                    return None;
                }
                if let Err(e) = self.seek_page(self.page_index) {
                    warn!(
                        "cursor over {}: skipping page {}: {e}",
                        self.owner, self.page_index
                    );
                    self.page = None;
                    self.page_index += 1;
                    continue;
                }
            }

            let page = self.page.as_ref()?;
            if let Some(row) = page.row(self.page_pointer) {
                let row = row.to_vec();
                self.page_pointer += 1;
                return Some(row);
            }

            // Current page exhausted; advance if another page exists.
            if self.page_index + 1 < self.rows_per_block.len() {
                let next = self.page_index + 1;
                if let Err(e) = self.seek_page(next) {
                    warn!("cursor over {}: skipping page {next}: {e}", self.owner);
                    self.page = None;
                    self.page_index = next + 1;
                }
            } else {
                return None;
            }
        }
    }

    /// Loads page `idx` and resets the in-page pointer to its first row.
    pub fn seek_page(&mut self, idx: usize) -> Result<()> {
        let row_count = self.rows_per_block.get(idx).copied().unwrap_or(0);
        let page = self
            .buffer
            .get_page(&self.owner, idx, row_count, self.column_count)?;
        self.page = Some(page);
        self.page_index = idx;
        self.page_pointer = 0;
        Ok(())
    }

    /// Physical address of the row most recently returned by `next`, or
    /// `None` if no row has been returned yet.
    ///
    /// At a page boundary (in-page pointer at zero) the address resolves to
    /// the last row of the previous page via the metadata snapshot.
    pub fn position(&self) -> Option<RecordPointer> {
        if self.page_pointer > 0 {
            return Some(RecordPointer::new(self.page_index, self.page_pointer - 1));
        }
        if self.page_index == 0 {
            return None;
        }
        let prev = self.page_index - 1;
        let rows_in_prev = *self.rows_per_block.get(prev)?;
        if rows_in_prev == 0 {
            return None;
        }
        Some(RecordPointer::new(prev, rows_in_prev - 1))
    }

    /// Index of the currently loaded page.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// In-page index of the next row to return.
    pub fn page_pointer(&self) -> usize {
        self.page_pointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_pages(rows_per_block: &[usize]) -> (BufferManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let buffer = BufferManager::new(dir.path().join("temp"), 4).unwrap();
        let mut value = 0i64;
        for (idx, &n) in rows_per_block.iter().enumerate() {
            let rows: Vec<Row> = (0..n)
                .map(|_| {
                    value += 1;
                    vec![value, value * 10]
                })
                .collect();
            buffer.write_page("T", idx, &rows, n).unwrap();
        }
        (buffer, dir)
    }

    #[test]
    fn test_cursor_visits_rows_in_physical_order() {
        let (buffer, _dir) = create_test_pages(&[2, 2, 1]);
        let mut cursor = Cursor::new(&buffer, "T", 2, vec![2, 2, 1]);

        let mut seen = Vec::new();
        while let Some(row) = cursor.next() {
            seen.push(row[0]);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_cursor_empty_table() {
        let dir = tempdir().unwrap();
        let buffer = BufferManager::new(dir.path().join("temp"), 4).unwrap();
        let mut cursor = Cursor::new(&buffer, "T", 2, vec![]);
        assert!(cursor.next().is_none());
        assert!(cursor.position().is_none());
    }

    #[test]
    fn test_cursor_position_contract() {
        let (buffer, _dir) = create_test_pages(&[2, 2]);
        let mut cursor = Cursor::new(&buffer, "T", 2, vec![2, 2]);

        cursor.next().unwrap();
        assert_eq!(cursor.position(), Some(RecordPointer::new(0, 0)));
        cursor.next().unwrap();
        assert_eq!(cursor.position(), Some(RecordPointer::new(0, 1)));

        // Crossing into page 1
        cursor.next().unwrap();
        assert_eq!(cursor.page_index(), 1);
        assert_eq!(cursor.page_pointer(), 1);
        assert_eq!(cursor.position(), Some(RecordPointer::new(1, 0)));
    }

    #[test]
    fn test_cursor_position_at_page_boundary() {
        let (buffer, _dir) = create_test_pages(&[3, 2]);
        let mut cursor = Cursor::new(&buffer, "T", 2, vec![3, 2]);
        for _ in 0..3 {
            cursor.next().unwrap();
        }
        // Seek resets the in-page pointer; position must resolve to the
        // last row of the previous page from the metadata snapshot.
        cursor.seek_page(1).unwrap();
        assert_eq!(cursor.page_pointer(), 0);
        assert_eq!(cursor.position(), Some(RecordPointer::new(0, 2)));
    }

    #[test]
    fn test_cursor_seek_page() {
        let (buffer, _dir) = create_test_pages(&[2, 2, 1]);
        let mut cursor = Cursor::new(&buffer, "T", 2, vec![2, 2, 1]);

        cursor.seek_page(2).unwrap();
        assert_eq!(cursor.next(), Some(vec![5, 50]));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_cursor_skips_missing_page() {
        let (buffer, _dir) = create_test_pages(&[2, 2, 1]);
        buffer.delete_file("T", 1);

        let mut cursor = Cursor::new(&buffer, "T", 2, vec![2, 2, 1]);
        let mut seen = Vec::new();
        while let Some(row) = cursor.next() {
            seen.push(row[0]);
        }
        // Page 1 (values 3, 4) is gone; iteration proceeds with page 2
        assert_eq!(seen, vec![1, 2, 5]);
    }

    #[test]
    fn test_cursor_snapshot_ignores_later_growth() {
        let (buffer, _dir) = create_test_pages(&[1]);
        let mut cursor = Cursor::new(&buffer, "T", 2, vec![1]);

        // A page appended after cursor creation is outside the snapshot
        buffer.write_page("T", 1, &[vec![99, 990]], 1).unwrap();

        assert_eq!(cursor.next(), Some(vec![1, 10]));
        assert!(cursor.next().is_none());
    }
}
