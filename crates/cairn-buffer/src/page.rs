//! In-memory snapshot of one on-disk block.
//!
//! Block files are plain text: one row per line, values space-separated.
//! The format is a design choice to keep the files debuggable; nothing in
//! the paging algorithms depends on it.

use cairn_common::{CairnError, Result, Row};
use std::fs;
use std::io::Write;
use std::path::Path;

/// One block of a named entity (a table or an index's node namespace).
///
/// A `Page` is created by the buffer manager from a block file or from an
/// in-memory row vector, and is never mutated in place; mutations rewrite
/// the block file and produce a fresh snapshot on the next read.
#[derive(Debug, Clone)]
pub struct Page {
    owner: String,
    page_index: usize,
    rows: Vec<Row>,
}

impl Page {
    /// Builds a page from an in-memory row vector.
    pub fn from_rows(owner: &str, page_index: usize, rows: Vec<Row>) -> Self {
        Self {
            owner: owner.to_string(),
            page_index,
            rows,
        }
    }

    /// Reads a block file, parsing each line as one row of integers.
    ///
    /// Returns `PageNotFound` if the file is missing and `PageCorrupt` if a
    /// token fails to parse as an integer. Shape validation against catalog
    /// metadata is the caller's concern; index node pages are not
    /// rectangular.
    pub fn load(path: &Path, owner: &str, page_index: usize) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CairnError::PageNotFound {
                    owner: owner.to_string(),
                    page_index,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for line in text.lines() {
            let mut row = Row::new();
            for token in line.split_whitespace() {
                let value = token.parse::<i64>().map_err(|_| CairnError::PageCorrupt {
                    owner: owner.to_string(),
                    page_index,
                    reason: format!("invalid integer '{token}'"),
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        Ok(Self {
            owner: owner.to_string(),
            page_index,
            rows,
        })
    }

    /// Checks that the page holds exactly `row_count` rows of exactly
    /// `column_count` integers, as table pages must.
    pub fn validate_shape(&self, row_count: usize, column_count: usize) -> Result<()> {
        if self.rows.len() != row_count {
            return Err(CairnError::PageCorrupt {
                owner: self.owner.clone(),
                page_index: self.page_index,
                reason: format!("expected {} rows, found {}", row_count, self.rows.len()),
            });
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != column_count {
                return Err(CairnError::PageCorrupt {
                    owner: self.owner.clone(),
                    page_index: self.page_index,
                    reason: format!(
                        "row {} has {} values, expected {}",
                        i,
                        row.len(),
                        column_count
                    ),
                });
            }
        }
        Ok(())
    }

    /// Returns row `i`, or `None` if it is out of range.
    pub fn row(&self, i: usize) -> Option<&[i64]> {
        self.rows.get(i).map(|r| r.as_slice())
    }

    /// Number of rows in this snapshot.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All rows of this snapshot.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Name of the owning entity.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Index of this block within its owner.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Persists the first `n` rows of `rows` to a block file, truncating any
    /// previous content. Values are space-separated, rows newline-terminated.
    pub fn write(path: &Path, rows: &[Row], n: usize) -> Result<()> {
        let mut out = String::new();
        for row in rows.iter().take(n) {
            let mut first = true;
            for value in row {
                if !first {
                    out.push(' ');
                }
                out.push_str(&value.to_string());
                first = false;
            }
            out.push('\n');
        }
        let mut file = fs::File::create(path)?;
        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_page_write_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page0");

        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        Page::write(&path, &rows, 2).unwrap();

        let page = Page::load(&path, "T", 0).unwrap();
        assert_eq!(page.row_count(), 2);
        assert_eq!(page.row(0), Some(&[1, 2, 3][..]));
        assert_eq!(page.row(1), Some(&[4, 5, 6][..]));
        assert_eq!(page.row(2), None);
        assert_eq!(page.owner(), "T");
        assert_eq!(page.page_index(), 0);
    }

    #[test]
    fn test_page_write_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page0");

        // Only the first n rows of the buffer are persisted
        let rows = vec![vec![1], vec![2], vec![3], vec![4]];
        Page::write(&path, &rows, 2).unwrap();

        let page = Page::load(&path, "T", 0).unwrap();
        assert_eq!(page.row_count(), 2);
        assert_eq!(page.row(0), Some(&[1][..]));
        assert_eq!(page.row(1), Some(&[2][..]));
    }

    #[test]
    fn test_page_write_truncates_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page0");

        Page::write(&path, &[vec![1, 1], vec![2, 2], vec![3, 3]], 3).unwrap();
        Page::write(&path, &[vec![9, 9]], 1).unwrap();

        let page = Page::load(&path, "T", 0).unwrap();
        assert_eq!(page.row_count(), 1);
        assert_eq!(page.row(0), Some(&[9, 9][..]));
    }

    #[test]
    fn test_page_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page7");

        let err = Page::load(&path, "T", 7).unwrap_err();
        assert!(matches!(
            err,
            CairnError::PageNotFound { page_index: 7, .. }
        ));
    }

    #[test]
    fn test_page_load_bad_integer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page0");
        fs::write(&path, "1 2\n3 x\n").unwrap();

        let err = Page::load(&path, "T", 0).unwrap_err();
        assert!(matches!(err, CairnError::PageCorrupt { .. }));
    }

    #[test]
    fn test_page_load_negative_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page0");
        fs::write(&path, "-5 0 7\n").unwrap();

        let page = Page::load(&path, "T", 0).unwrap();
        assert_eq!(page.row(0), Some(&[-5, 0, 7][..]));
    }

    #[test]
    fn test_page_validate_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T_Page0");
        Page::write(&path, &[vec![1, 2], vec![3, 4]], 2).unwrap();

        let page = Page::load(&path, "T", 0).unwrap();
        assert!(page.validate_shape(2, 2).is_ok());
        // Fewer rows on disk than the catalog claims
        assert!(matches!(
            page.validate_shape(3, 2),
            Err(CairnError::PageCorrupt { .. })
        ));
        // Wrong width
        assert!(matches!(
            page.validate_shape(2, 3),
            Err(CairnError::PageCorrupt { .. })
        ));
    }

    #[test]
    fn test_page_preserves_empty_rows() {
        // Index node pages serialize empty key rows as empty lines; those
        // must survive a round trip.
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx_Node0");
        Page::write(&path, &[vec![1, 0, -1, -1], vec![], vec![]], 3).unwrap();

        let page = Page::load(&path, "idx", 0).unwrap();
        assert_eq!(page.row_count(), 3);
        assert_eq!(page.row(0), Some(&[1, 0, -1, -1][..]));
        assert_eq!(page.row(1), Some(&[][..]));
        assert_eq!(page.row(2), Some(&[][..]));
    }

    #[test]
    fn test_page_from_rows() {
        let page = Page::from_rows("T", 3, vec![vec![1], vec![2]]);
        assert_eq!(page.row_count(), 2);
        assert_eq!(page.page_index(), 3);
        assert_eq!(page.rows().len(), 2);
    }
}
