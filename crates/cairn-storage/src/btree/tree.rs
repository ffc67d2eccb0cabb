//! The B+ tree proper: fan-out calibration, insert with splits, delete
//! with borrow/merge underflow repair, and key and range search over the
//! linked leaf chain.

use crate::btree::node::{BTreeNode, META_INTS};
use crate::cursor::Cursor;
use cairn_buffer::BufferManager;
use cairn_common::{CairnError, RecordPointer, Result, CELL_SIZE};
use log::{debug, warn};

/// A secondary index on one table column.
///
/// The tree never holds a reference to its table; callers pass the table
/// metadata (`column_count`, `rows_per_block`) the operation needs. Node
/// pages are owned by the index and fetched or written through the buffer
/// manager as transient values.
#[derive(Debug)]
pub struct BTree {
    index_name: String,
    table_name: String,
    column_name: String,
    column_index: usize,
    root: Option<usize>,
    node_count: usize,
    order: usize,
    leaf_order: usize,
}

impl BTree {
    /// Creates an empty index, calibrating fan-out from the block size.
    ///
    /// With the effective payload `B_eff = block_size - metadata`:
    /// `order = ⌊(B_eff + key) / (ptr + key)⌋` clamped to at least 3, and
    /// `leaf_order = ⌊(B_eff - ptr) / (key + record_ptr)⌋` clamped to at
    /// least 1, where keys and pointers are one cell and a record pointer
    /// is two.
    pub fn new(table_name: &str, column_name: &str, column_index: usize, block_size: usize) -> Self {
        let effective = block_size.saturating_sub(META_INTS * CELL_SIZE);
        let order = ((effective + CELL_SIZE) / (2 * CELL_SIZE)).max(3);
        let leaf_order = (effective.saturating_sub(CELL_SIZE) / (3 * CELL_SIZE)).max(1);
        Self::with_orders(table_name, column_name, column_index, order, leaf_order)
    }

    /// Creates an empty index with explicit fan-out. Small orders force
    /// deep trees from few keys, which the tests rely on.
    pub fn with_orders(
        table_name: &str,
        column_name: &str,
        column_index: usize,
        order: usize,
        leaf_order: usize,
    ) -> Self {
        let index_name = format!("{table_name}_{column_name}_index");
        debug!("index {index_name}: order {order}, leaf order {leaf_order}");
        Self {
            index_name,
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            column_index,
            root: None,
            node_count: 0,
            order: order.max(3),
            leaf_order: leaf_order.max(1),
        }
    }

    /// Owner namespace of this index's node pages.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Index of the indexed column within the table schema.
    pub fn column_index(&self) -> usize {
        self.column_index
    }

    /// Name of the indexed column.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Updates the logical column name after a schema rename. The node
    /// file namespace keeps the original name so existing files stay
    /// reachable.
    pub fn set_column_name(&mut self, name: &str) {
        self.column_name = name.to_string();
    }

    /// Maximum children of an internal node.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Maximum entries in a leaf node.
    pub fn leaf_order(&self) -> usize {
        self.leaf_order
    }

    /// Page index of the root node, if the tree is non-empty.
    pub fn root_page_index(&self) -> Option<usize> {
        self.root
    }

    /// Total node pages ever allocated (monotonic).
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns true if the tree holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn allocate_node_page(&mut self) -> usize {
        let idx = self.node_count;
        self.node_count += 1;
        idx
    }

    fn fetch_node(&self, buffer: &BufferManager, page_index: usize) -> Result<BTreeNode> {
        let page = buffer.get_node_page(&self.index_name, page_index)?;
        BTreeNode::from_page(&page)
    }

    fn write_node(&self, buffer: &BufferManager, node: &BTreeNode) -> Result<()> {
        let rows = node.to_rows();
        buffer.write_node_page(&self.index_name, node.page_index, &rows, rows.len())
    }

    fn min_keys(&self, is_leaf: bool) -> usize {
        if is_leaf {
            (self.leaf_order + 1) / 2
        } else {
            (self.order + 1) / 2 - 1
        }
    }

    /// Descends to a leaf. `lower` descent lands on the leftmost leaf that
    /// may contain `key` (searches, deletes); otherwise equal keys descend
    /// right (inserts), so duplicates append after existing entries.
    fn find_leaf(&self, buffer: &BufferManager, key: i64, lower: bool) -> Result<usize> {
        let mut idx = self.root.ok_or_else(|| {
            CairnError::InternalInvariant(format!("descent into empty index {}", self.index_name))
        })?;
        loop {
            let node = self.fetch_node(buffer, idx)?;
            if node.is_leaf {
                return Ok(idx);
            }
            let slot = if lower {
                node.child_slot_lower(key)
            } else {
                node.child_slot_upper(key)
            };
            idx = *node.children.get(slot).ok_or_else(|| {
                CairnError::InternalInvariant(format!(
                    "node {} of {} has no child at slot {slot}",
                    node.page_index, self.index_name
                ))
            })?;
        }
    }

    // --- Insertion ---

    /// Inserts `(key, pointer)`, splitting nodes as needed.
    pub fn insert(&mut self, buffer: &BufferManager, key: i64, pointer: RecordPointer) -> Result<()> {
        match self.root {
            None => self.start_new_tree(buffer, key, pointer),
            Some(_) => {
                let leaf_idx = self.find_leaf(buffer, key, false)?;
                self.insert_into_leaf(buffer, leaf_idx, key, pointer)
            }
        }
    }

    fn start_new_tree(&mut self, buffer: &BufferManager, key: i64, pointer: RecordPointer) -> Result<()> {
        let page_index = self.allocate_node_page();
        let mut root = BTreeNode::new_leaf(page_index);
        root.insert_leaf_entry(0, key, pointer);
        self.write_node(buffer, &root)?;
        self.root = Some(page_index);
        Ok(())
    }

    fn insert_into_leaf(
        &mut self,
        buffer: &BufferManager,
        leaf_idx: usize,
        key: i64,
        pointer: RecordPointer,
    ) -> Result<()> {
        let mut leaf = self.fetch_node(buffer, leaf_idx)?;
        let pos = leaf.keys.partition_point(|&k| k <= key);

        if leaf.key_count() < self.leaf_order {
            leaf.insert_leaf_entry(pos, key, pointer);
            return self.write_node(buffer, &leaf);
        }

        // Leaf full: combine, split at ceil((leaf_order + 1) / 2), keep the
        // lower half in place, and push the right node's first key up.
        let mut keys = leaf.keys.clone();
        let mut pointers = leaf.pointers.clone();
        keys.insert(pos, key);
        pointers.insert(pos, pointer);
        let mid = (self.leaf_order + 2) / 2;

        let right_idx = self.allocate_node_page();
        let mut right = BTreeNode::new_leaf(right_idx);
        right.parent = leaf.parent;
        right.keys = keys.split_off(mid);
        right.pointers = pointers.split_off(mid);
        leaf.keys = keys;
        leaf.pointers = pointers;

        right.next_leaf = leaf.next_leaf;
        leaf.next_leaf = Some(right_idx);

        let split_key = right.keys[0];
        self.write_node(buffer, &leaf)?;
        self.write_node(buffer, &right)?;
        self.insert_into_parent(buffer, leaf_idx, split_key, right_idx)
    }

    fn insert_into_parent(
        &mut self,
        buffer: &BufferManager,
        left_idx: usize,
        key: i64,
        right_idx: usize,
    ) -> Result<()> {
        let left_parent = self.fetch_node(buffer, left_idx)?.parent;

        let Some(parent_idx) = left_parent else {
            // The split reached the root: grow the tree by one level.
            let root_idx = self.allocate_node_page();
            let mut root = BTreeNode::new_internal(root_idx);
            root.keys.push(key);
            root.children.push(left_idx);
            root.children.push(right_idx);
            self.write_node(buffer, &root)?;
            for child_idx in [left_idx, right_idx] {
                let mut child = self.fetch_node(buffer, child_idx)?;
                child.parent = Some(root_idx);
                self.write_node(buffer, &child)?;
            }
            self.root = Some(root_idx);
            return Ok(());
        };

        let mut parent = self.fetch_node(buffer, parent_idx)?;
        let pos = parent.keys.partition_point(|&k| k <= key);

        if parent.key_count() < self.order - 1 {
            parent.insert_internal_entry(pos, key, right_idx);
            self.write_node(buffer, &parent)?;
            let mut right = self.fetch_node(buffer, right_idx)?;
            right.parent = Some(parent_idx);
            return self.write_node(buffer, &right);
        }

        // Parent full: split around ceil((order + 1) / 2) children and
        // send the middle key up.
        let mut keys = parent.keys.clone();
        let mut children = parent.children.clone();
        keys.insert(pos, key);
        children.insert(pos + 1, right_idx);

        let left_children = (self.order + 2) / 2;
        let up_key = keys[left_children - 1];

        let new_right_idx = self.allocate_node_page();
        let mut new_right = BTreeNode::new_internal(new_right_idx);
        new_right.parent = parent.parent;
        new_right.keys = keys.split_off(left_children);
        new_right.children = children.split_off(left_children);
        keys.truncate(left_children - 1); // drop the key sent up
        parent.keys = keys;
        parent.children = children;

        self.write_node(buffer, &parent)?;
        self.write_node(buffer, &new_right)?;
        for &child_idx in &new_right.children {
            let mut child = self.fetch_node(buffer, child_idx)?;
            child.parent = Some(new_right_idx);
            self.write_node(buffer, &child)?;
        }
        self.insert_into_parent(buffer, parent_idx, up_key, new_right_idx)
    }

    // --- Search ---

    /// All pointers whose key equals `key`, in insertion order.
    pub fn search_key(&self, buffer: &BufferManager, key: i64) -> Result<Vec<RecordPointer>> {
        self.search_range(buffer, key, key)
    }

    /// All pointers whose key lies in `[lo, hi]`, in ascending key order;
    /// ties follow leaf insertion order.
    pub fn search_range(&self, buffer: &BufferManager, lo: i64, hi: i64) -> Result<Vec<RecordPointer>> {
        let mut result = Vec::new();
        if lo > hi || self.root.is_none() {
            return Ok(result);
        }
        let mut next = Some(self.find_leaf(buffer, lo, true)?);
        while let Some(idx) = next {
            let leaf = self.fetch_node(buffer, idx)?;
            let start = leaf.keys.partition_point(|&k| k < lo);
            let mut past_end = false;
            for i in start..leaf.key_count() {
                if leaf.keys[i] > hi {
                    past_end = true;
                    break;
                }
                result.push(leaf.pointers[i]);
            }
            if past_end {
                break;
            }
            next = leaf.next_leaf;
        }
        Ok(result)
    }

    // --- Deletion ---

    /// Removes the entry matching both `key` and `pointer`. Duplicate keys
    /// on other rows are untouched. Returns true if an entry was removed.
    pub fn remove_entry(
        &mut self,
        buffer: &BufferManager,
        key: i64,
        pointer: RecordPointer,
    ) -> Result<bool> {
        if self.root.is_none() {
            return Ok(false);
        }
        let mut leaf_idx = self.find_leaf(buffer, key, true)?;
        loop {
            let mut leaf = self.fetch_node(buffer, leaf_idx)?;
            let hit = leaf
                .keys
                .iter()
                .zip(&leaf.pointers)
                .position(|(&k, &p)| k == key && p == pointer);
            if let Some(i) = hit {
                leaf.remove_leaf_entry(i);
                self.write_node(buffer, &leaf)?;
                self.handle_underflow(buffer, leaf_idx)?;
                self.adjust_root(buffer)?;
                return Ok(true);
            }
            // Once a larger key appears the entry cannot be further right.
            if leaf.keys.iter().any(|&k| k > key) {
                return Ok(false);
            }
            match leaf.next_leaf {
                Some(n) => leaf_idx = n,
                None => return Ok(false),
            }
        }
    }

    /// Removes every entry whose key equals `key` (the bulk variant).
    /// Returns the number of entries removed.
    pub fn remove_key(&mut self, buffer: &BufferManager, key: i64) -> Result<usize> {
        let mut total = 0;
        loop {
            let removed = self.remove_key_round(buffer, key)?;
            if removed == 0 {
                break;
            }
            total += removed;
        }
        Ok(total)
    }

    /// Clears the key out of the first leaf holding it, then repairs.
    /// Duplicates may span leaves, so callers loop until a round removes
    /// nothing.
    fn remove_key_round(&mut self, buffer: &BufferManager, key: i64) -> Result<usize> {
        if self.root.is_none() {
            return Ok(0);
        }
        let mut leaf_idx = self.find_leaf(buffer, key, true)?;
        loop {
            let mut leaf = self.fetch_node(buffer, leaf_idx)?;
            let before = leaf.key_count();
            let mut i = 0;
            while i < leaf.keys.len() {
                if leaf.keys[i] == key {
                    leaf.remove_leaf_entry(i);
                } else {
                    i += 1;
                }
            }
            let removed = before - leaf.key_count();
            if removed > 0 {
                self.write_node(buffer, &leaf)?;
                self.handle_underflow(buffer, leaf_idx)?;
                self.adjust_root(buffer)?;
                return Ok(removed);
            }
            if leaf.keys.iter().any(|&k| k > key) {
                return Ok(0);
            }
            match leaf.next_leaf {
                Some(n) => leaf_idx = n,
                None => return Ok(0),
            }
        }
    }

    /// Repairs a node that fell below its minimum: borrow from a sibling
    /// with spare entries, else merge with it and recurse upward.
    fn handle_underflow(&mut self, buffer: &BufferManager, node_idx: usize) -> Result<()> {
        let mut node = self.fetch_node(buffer, node_idx)?;
        let Some(parent_idx) = node.parent else {
            return Ok(()); // the root is repaired by adjust_root
        };
        if node.key_count() >= self.min_keys(node.is_leaf) {
            return Ok(());
        }

        let mut parent = self.fetch_node(buffer, parent_idx)?;
        let Some(pos) = parent.children.iter().position(|&c| c == node_idx) else {
            warn!(
                "index {}: node {node_idx} missing from parent {parent_idx}; underflow unrepaired",
                self.index_name
            );
            return Ok(());
        };

        // Prefer the right sibling; fall back to the left one.
        let (sibling_idx, sibling_is_right, sep_idx) = if pos + 1 < parent.children.len() {
            (parent.children[pos + 1], true, pos)
        } else if pos > 0 {
            (parent.children[pos - 1], false, pos - 1)
        } else {
            warn!(
                "index {}: node {node_idx} has no sibling under parent {parent_idx}",
                self.index_name
            );
            return Ok(());
        };
        let mut sibling = self.fetch_node(buffer, sibling_idx)?;

        if sibling.key_count() > self.min_keys(sibling.is_leaf) {
            if node.is_leaf {
                borrow_leaf(&mut node, &mut sibling, &mut parent, sibling_is_right, sep_idx);
            } else {
                self.borrow_internal(
                    buffer,
                    &mut node,
                    &mut sibling,
                    &mut parent,
                    sibling_is_right,
                    sep_idx,
                )?;
            }
            self.write_node(buffer, &node)?;
            self.write_node(buffer, &sibling)?;
            self.write_node(buffer, &parent)?;
            return Ok(());
        }

        // No spare entries anywhere: merge into the left participant.
        let separator = parent.keys[sep_idx];
        let removed_page;
        if sibling_is_right {
            if node.is_leaf {
                merge_leaves(&mut node, &sibling);
            } else {
                self.merge_internal(buffer, &mut node, &sibling, separator)?;
            }
            removed_page = sibling.page_index;
            parent.remove_internal_entry(sep_idx);
            self.write_node(buffer, &node)?;
        } else {
            if node.is_leaf {
                merge_leaves(&mut sibling, &node);
            } else {
                self.merge_internal(buffer, &mut sibling, &node, separator)?;
            }
            removed_page = node.page_index;
            parent.remove_internal_entry(sep_idx);
            self.write_node(buffer, &sibling)?;
        }
        self.write_node(buffer, &parent)?;
        buffer.delete_node_file(&self.index_name, removed_page);
        debug!(
            "index {}: merged node page {removed_page} away",
            self.index_name
        );

        self.handle_underflow(buffer, parent_idx)
    }

    /// Rotates one entry from an internal sibling through the parent
    /// separator, re-homing the moved child.
    fn borrow_internal(
        &self,
        buffer: &BufferManager,
        node: &mut BTreeNode,
        sibling: &mut BTreeNode,
        parent: &mut BTreeNode,
        sibling_is_right: bool,
        sep_idx: usize,
    ) -> Result<()> {
        let moved_child;
        if sibling_is_right {
            node.keys.push(parent.keys[sep_idx]);
            moved_child = sibling.children.remove(0);
            node.children.push(moved_child);
            parent.keys[sep_idx] = sibling.keys.remove(0);
        } else {
            let (Some(spare_key), Some(spare_child)) =
                (sibling.keys.pop(), sibling.children.pop())
            else {
                return Err(CairnError::InternalInvariant(format!(
                    "borrow from empty internal sibling in {}",
                    self.index_name
                )));
            };
            node.keys.insert(0, parent.keys[sep_idx]);
            node.children.insert(0, spare_child);
            parent.keys[sep_idx] = spare_key;
            moved_child = spare_child;
        }
        let mut child = self.fetch_node(buffer, moved_child)?;
        child.parent = Some(node.page_index);
        self.write_node(buffer, &child)
    }

    /// Folds `right` into `left` with the parent separator pulled down,
    /// re-homing the absorbed children.
    fn merge_internal(
        &self,
        buffer: &BufferManager,
        left: &mut BTreeNode,
        right: &BTreeNode,
        separator: i64,
    ) -> Result<()> {
        left.keys.push(separator);
        left.keys.extend_from_slice(&right.keys);
        left.children.extend_from_slice(&right.children);
        for &child_idx in &right.children {
            let mut child = self.fetch_node(buffer, child_idx)?;
            child.parent = Some(left.page_index);
            self.write_node(buffer, &child)?;
        }
        Ok(())
    }

    /// Collapses a root left degenerate by deletions: an internal root
    /// with no keys promotes its single child; an empty leaf root of a
    /// tree that had other nodes empties the tree.
    fn adjust_root(&mut self, buffer: &BufferManager) -> Result<()> {
        let Some(root_idx) = self.root else {
            return Ok(());
        };
        let root = self.fetch_node(buffer, root_idx)?;
        if !root.is_leaf && root.keys.is_empty() {
            let Some(&only_child) = root.children.first() else {
                warn!(
                    "index {}: empty internal root {root_idx} has no children",
                    self.index_name
                );
                self.root = None;
                return Ok(());
            };
            let mut child = self.fetch_node(buffer, only_child)?;
            child.parent = None;
            self.write_node(buffer, &child)?;
            self.root = Some(only_child);
            buffer.delete_node_file(&self.index_name, root_idx);
            debug!("index {}: root collapsed to page {only_child}", self.index_name);
        } else if root.is_leaf && root.keys.is_empty() && self.node_count > 1 {
            buffer.delete_node_file(&self.index_name, root_idx);
            self.root = None;
        }
        Ok(())
    }

    // --- Bulk operations ---

    /// Rebuilds the index from the table's data pages, deriving each row's
    /// record pointer from the cursor position. Rows that cannot be
    /// addressed are logged and skipped.
    pub fn build(
        &mut self,
        buffer: &BufferManager,
        column_count: usize,
        rows_per_block: &[usize],
    ) -> Result<()> {
        self.drop_files(buffer);
        let mut cursor = Cursor::new(buffer, &self.table_name, column_count, rows_per_block.to_vec());
        let mut rows_processed: u64 = 0;
        while let Some(row) = cursor.next() {
            rows_processed += 1;
            let Some(&key) = row.get(self.column_index) else {
                warn!(
                    "index {}: row {rows_processed} has no column {}; skipped",
                    self.index_name, self.column_index
                );
                continue;
            };
            let Some(pointer) = cursor.position() else {
                warn!(
                    "index {}: no address for row {rows_processed}; skipped",
                    self.index_name
                );
                continue;
            };
            self.insert(buffer, key, pointer)?;
        }
        debug!(
            "index {} built from {rows_processed} rows ({} nodes)",
            self.index_name, self.node_count
        );
        Ok(())
    }

    /// Unlinks every node page file and resets the tree to empty.
    pub fn drop_files(&mut self, buffer: &BufferManager) {
        for i in 0..self.node_count {
            buffer.delete_node_file(&self.index_name, i);
        }
        self.root = None;
        self.node_count = 0;
    }
}

/// Moves one entry from a leaf sibling and refreshes the parent separator
/// to the new first key of the right participant.
fn borrow_leaf(
    node: &mut BTreeNode,
    sibling: &mut BTreeNode,
    parent: &mut BTreeNode,
    sibling_is_right: bool,
    sep_idx: usize,
) {
    if sibling_is_right {
        let key = sibling.keys.remove(0);
        let pointer = sibling.pointers.remove(0);
        node.keys.push(key);
        node.pointers.push(pointer);
        parent.keys[sep_idx] = sibling.keys[0];
    } else {
        let (Some(key), Some(pointer)) = (sibling.keys.pop(), sibling.pointers.pop()) else {
            return;
        };
        node.keys.insert(0, key);
        node.pointers.insert(0, pointer);
        parent.keys[sep_idx] = node.keys[0];
    }
}

/// Concatenates `right` into `left` and splices the leaf chain.
fn merge_leaves(left: &mut BTreeNode, right: &BTreeNode) {
    left.keys.extend_from_slice(&right.keys);
    left.pointers.extend_from_slice(&right.pointers);
    left.next_leaf = right.next_leaf;
}
