//! Buffered block manager.
//!
//! Enforces a hard cap on how many pages are resident in memory at once.
//! Reads are served from a FIFO cache; writes and deletes go straight to
//! disk and drop any cached copy of the affected block, so a later read
//! always observes the rewritten file.

use crate::page::Page;
use cairn_common::{Result, Row};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bounded FIFO cache of pages plus the writer for block files.
///
/// Page files live under a single temporary directory and are named
/// `<owner>_Page<index>`, where the owner is a table name or an index's
/// node namespace.
pub struct BufferManager {
    temp_dir: PathBuf,
    capacity: usize,
    cache: Mutex<VecDeque<Arc<Page>>>,
}

impl BufferManager {
    /// Creates a buffer manager over `temp_dir`, creating the directory if
    /// needed. `capacity` is the maximum number of simultaneously cached
    /// pages.
    pub fn new(temp_dir: PathBuf, capacity: usize) -> Result<Self> {
        fs::create_dir_all(&temp_dir)?;
        Ok(Self {
            temp_dir,
            capacity: capacity.max(1),
            cache: Mutex::new(VecDeque::new()),
        })
    }

    /// Path of the block file for `(owner, page_index)`.
    pub fn page_path(&self, owner: &str, page_index: usize) -> PathBuf {
        self.temp_dir.join(format!("{owner}_Page{page_index}"))
    }

    /// Path of an index node file for `(owner, node_index)`.
    pub fn node_path(&self, owner: &str, node_index: usize) -> PathBuf {
        self.temp_dir.join(format!("{owner}_Node{node_index}"))
    }

    /// The temporary directory this manager writes under.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Number of pages currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Fetches a table page, reading from disk on a cache miss and evicting
    /// the oldest-inserted page when the cache is full.
    ///
    /// `row_count` and `column_count` come from the owner's catalog metadata
    /// and are validated against the file contents.
    pub fn get_page(
        &self,
        owner: &str,
        page_index: usize,
        row_count: usize,
        column_count: usize,
    ) -> Result<Arc<Page>> {
        if let Some(page) = self.lookup(owner, page_index) {
            return Ok(page);
        }
        let path = self.page_path(owner, page_index);
        let page = Page::load(&path, owner, page_index)?;
        page.validate_shape(row_count, column_count)?;
        Ok(self.admit(page))
    }

    /// Fetches an index node page. Node pages are not rectangular, so no
    /// shape validation is applied; the index deserializer checks structure.
    pub fn get_node_page(&self, owner: &str, node_index: usize) -> Result<Arc<Page>> {
        if let Some(page) = self.lookup(owner, node_index) {
            return Ok(page);
        }
        let path = self.node_path(owner, node_index);
        let page = Page::load(&path, owner, node_index)?;
        Ok(self.admit(page))
    }

    /// Writes a table page through to disk. The write never populates the
    /// cache, but it drops any cached copy of the block it replaces.
    pub fn write_page(&self, owner: &str, page_index: usize, rows: &[Row], n: usize) -> Result<()> {
        self.drop_cached(owner, page_index);
        Page::write(&self.page_path(owner, page_index), rows, n)
    }

    /// Writes an index node page through to disk, dropping any cached copy.
    pub fn write_node_page(
        &self,
        owner: &str,
        node_index: usize,
        rows: &[Row],
        n: usize,
    ) -> Result<()> {
        self.drop_cached(owner, node_index);
        Page::write(&self.node_path(owner, node_index), rows, n)
    }

    /// Removes a table block file and its cache entry. Missing files are
    /// logged and ignored.
    pub fn delete_file(&self, owner: &str, page_index: usize) {
        self.drop_cached(owner, page_index);
        self.delete_path(&self.page_path(owner, page_index));
    }

    /// Removes an index node file and its cache entry.
    pub fn delete_node_file(&self, owner: &str, node_index: usize) {
        self.drop_cached(owner, node_index);
        self.delete_path(&self.node_path(owner, node_index));
    }

    /// Removes an arbitrary file. Missing files are logged and ignored.
    pub fn delete_path(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!("deleted {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("delete skipped, missing: {}", path.display());
            }
            Err(e) => warn!("failed to delete {}: {e}", path.display()),
        }
    }

    fn lookup(&self, owner: &str, page_index: usize) -> Option<Arc<Page>> {
        let cache = self.cache.lock();
        cache
            .iter()
            .find(|p| p.owner() == owner && p.page_index() == page_index)
            .cloned()
    }

    fn admit(&self, page: Page) -> Arc<Page> {
        let page = Arc::new(page);
        let mut cache = self.cache.lock();
        if cache.len() >= self.capacity {
            if let Some(evicted) = cache.pop_front() {
                debug!(
                    "evicting {}_Page{} (cache full)",
                    evicted.owner(),
                    evicted.page_index()
                );
            }
        }
        cache.push_back(Arc::clone(&page));
        page
    }

    fn drop_cached(&self, owner: &str, page_index: usize) {
        let mut cache = self.cache.lock();
        cache.retain(|p| !(p.owner() == owner && p.page_index() == page_index));
    }
}
