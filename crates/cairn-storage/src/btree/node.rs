//! One node of the B+ tree, loaded from and written to a node page.

use cairn_buffer::Page;
use cairn_common::{CairnError, RecordPointer, Result, Row};

/// Number of integers in a node page's metadata row.
pub(crate) const META_INTS: usize = 4;

const IS_LEAF_OFFSET: usize = 0;
const KEY_COUNT_OFFSET: usize = 1;
const PARENT_OFFSET: usize = 2;
const NEXT_LEAF_OFFSET: usize = 3;

/// Transient in-memory form of a node. Lifetime is bounded by the
/// enclosing index operation; the page file is the durable form.
#[derive(Debug, Clone)]
pub struct BTreeNode {
    /// Node page index within the index's namespace.
    pub page_index: usize,
    /// Leaf nodes hold record pointers; internal nodes hold children.
    pub is_leaf: bool,
    /// Parent node page, absent for the root.
    pub parent: Option<usize>,
    /// Next leaf in ascending key order, absent for the last leaf and for
    /// internal nodes.
    pub next_leaf: Option<usize>,
    /// Keys, sorted ascending.
    pub keys: Vec<i64>,
    /// Child page indices (internal nodes): always `keys.len() + 1`.
    pub children: Vec<usize>,
    /// Record pointers (leaf nodes): always `keys.len()`.
    pub pointers: Vec<RecordPointer>,
}

fn sentinel(value: Option<usize>) -> i64 {
    value.map_or(-1, |v| v as i64)
}

fn from_sentinel(value: i64) -> Option<usize> {
    (value >= 0).then_some(value as usize)
}

impl BTreeNode {
    /// Creates an empty leaf node.
    pub fn new_leaf(page_index: usize) -> Self {
        Self {
            page_index,
            is_leaf: true,
            parent: None,
            next_leaf: None,
            keys: Vec::new(),
            children: Vec::new(),
            pointers: Vec::new(),
        }
    }

    /// Creates an empty internal node.
    pub fn new_internal(page_index: usize) -> Self {
        Self {
            page_index,
            is_leaf: false,
            parent: None,
            next_leaf: None,
            keys: Vec::new(),
            children: Vec::new(),
            pointers: Vec::new(),
        }
    }

    /// Number of keys in the node.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Serializes the node into page rows (metadata, keys, pointers).
    pub fn to_rows(&self) -> Vec<Row> {
        let meta = vec![
            i64::from(self.is_leaf),
            self.keys.len() as i64,
            sentinel(self.parent),
            sentinel(self.next_leaf),
        ];
        let keys: Row = self.keys.clone();
        let third: Row = if self.is_leaf {
            self.pointers
                .iter()
                .flat_map(|p| [p.page as i64, p.row as i64])
                .collect()
        } else {
            self.children.iter().map(|&c| c as i64).collect()
        };
        vec![meta, keys, third]
    }

    /// Deserializes a node from a page read by the buffer manager.
    pub fn from_page(page: &Page) -> Result<Self> {
        let corrupt = |reason: String| CairnError::PageCorrupt {
            owner: page.owner().to_string(),
            page_index: page.page_index(),
            reason,
        };

        let meta = page
            .row(0)
            .ok_or_else(|| corrupt("missing metadata row".to_string()))?;
        if meta.len() < META_INTS {
            return Err(corrupt(format!(
                "metadata row has {} values, expected {META_INTS}",
                meta.len()
            )));
        }
        let is_leaf = meta[IS_LEAF_OFFSET] == 1;
        let key_count = meta[KEY_COUNT_OFFSET];
        if key_count < 0 {
            return Err(corrupt(format!("negative key count {key_count}")));
        }
        let key_count = key_count as usize;
        let parent = from_sentinel(meta[PARENT_OFFSET]);
        let next_leaf = if is_leaf {
            from_sentinel(meta[NEXT_LEAF_OFFSET])
        } else {
            None
        };

        let keys = page
            .row(1)
            .ok_or_else(|| corrupt("missing keys row".to_string()))?;
        if keys.len() != key_count {
            return Err(corrupt(format!(
                "keys row has {} entries, metadata claims {key_count}",
                keys.len()
            )));
        }
        let keys = keys.to_vec();

        let third = page
            .row(2)
            .ok_or_else(|| corrupt("missing pointers row".to_string()))?;

        let mut children = Vec::new();
        let mut pointers = Vec::new();
        if is_leaf {
            if third.len() != 2 * key_count {
                return Err(corrupt(format!(
                    "leaf pointer row has {} values, expected {}",
                    third.len(),
                    2 * key_count
                )));
            }
            for pair in third.chunks_exact(2) {
                if pair[0] < 0 || pair[1] < 0 {
                    return Err(corrupt(format!(
                        "negative record pointer {}:{}",
                        pair[0], pair[1]
                    )));
                }
                pointers.push(RecordPointer::new(pair[0] as usize, pair[1] as usize));
            }
        } else {
            if third.len() != key_count + 1 {
                return Err(corrupt(format!(
                    "internal child row has {} values, expected {}",
                    third.len(),
                    key_count + 1
                )));
            }
            for &c in third {
                if c < 0 {
                    return Err(corrupt(format!("negative child page index {c}")));
                }
                children.push(c as usize);
            }
        }

        Ok(Self {
            page_index: page.page_index(),
            is_leaf,
            parent,
            next_leaf,
            keys,
            children,
            pointers,
        })
    }

    /// Inserts a leaf entry at position `pos`.
    pub fn insert_leaf_entry(&mut self, pos: usize, key: i64, pointer: RecordPointer) {
        self.keys.insert(pos, key);
        self.pointers.insert(pos, pointer);
    }

    /// Removes the leaf entry at position `pos`.
    pub fn remove_leaf_entry(&mut self, pos: usize) {
        self.keys.remove(pos);
        self.pointers.remove(pos);
    }

    /// Inserts `key` at position `pos` with its right child after it.
    pub fn insert_internal_entry(&mut self, pos: usize, key: i64, right_child: usize) {
        self.keys.insert(pos, key);
        self.children.insert(pos + 1, right_child);
    }

    /// Removes the key at `pos` and the child pointer after it.
    pub fn remove_internal_entry(&mut self, pos: usize) {
        self.keys.remove(pos);
        self.children.remove(pos + 1);
    }

    /// Child slot to follow when descending for `key`, taking the child
    /// whose subtree covers keys at or above any equal separator.
    /// Used by insertion so equal keys append after existing ones.
    pub fn child_slot_upper(&self, key: i64) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Child slot to follow when descending for the leftmost occurrence of
    /// `key`; equal separators descend left, since a split can leave
    /// duplicates of the separator in the left child.
    pub fn child_slot_lower(&self, key: i64) -> usize {
        self.keys.partition_point(|&k| k < key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(node: &BTreeNode) -> BTreeNode {
        let rows = node.to_rows();
        let page = Page::from_rows("idx", node.page_index, rows);
        BTreeNode::from_page(&page).unwrap()
    }

    #[test]
    fn test_leaf_roundtrip() {
        let mut node = BTreeNode::new_leaf(3);
        node.parent = Some(1);
        node.next_leaf = Some(4);
        node.insert_leaf_entry(0, 10, RecordPointer::new(0, 0));
        node.insert_leaf_entry(1, 20, RecordPointer::new(0, 1));

        let loaded = roundtrip(&node);
        assert!(loaded.is_leaf);
        assert_eq!(loaded.page_index, 3);
        assert_eq!(loaded.parent, Some(1));
        assert_eq!(loaded.next_leaf, Some(4));
        assert_eq!(loaded.keys, vec![10, 20]);
        assert_eq!(
            loaded.pointers,
            vec![RecordPointer::new(0, 0), RecordPointer::new(0, 1)]
        );
    }

    #[test]
    fn test_internal_roundtrip() {
        let mut node = BTreeNode::new_internal(0);
        node.keys = vec![50];
        node.children = vec![1, 2];

        let loaded = roundtrip(&node);
        assert!(!loaded.is_leaf);
        assert_eq!(loaded.parent, None);
        assert_eq!(loaded.next_leaf, None);
        assert_eq!(loaded.keys, vec![50]);
        assert_eq!(loaded.children, vec![1, 2]);
    }

    #[test]
    fn test_empty_leaf_roundtrip() {
        let node = BTreeNode::new_leaf(0);
        let loaded = roundtrip(&node);
        assert!(loaded.keys.is_empty());
        assert!(loaded.pointers.is_empty());
        assert_eq!(loaded.parent, None);
        assert_eq!(loaded.next_leaf, None);
    }

    #[test]
    fn test_from_page_shape_errors() {
        // Keys row shorter than the metadata claims
        let page = Page::from_rows("idx", 0, vec![vec![1, 2, -1, -1], vec![5], vec![0, 0]]);
        assert!(matches!(
            BTreeNode::from_page(&page),
            Err(CairnError::PageCorrupt { .. })
        ));

        // Leaf pointer row not twice the key count
        let page = Page::from_rows("idx", 0, vec![vec![1, 1, -1, -1], vec![5], vec![0]]);
        assert!(BTreeNode::from_page(&page).is_err());

        // Internal child row must have key_count + 1 entries
        let page = Page::from_rows("idx", 0, vec![vec![0, 1, -1, -1], vec![5], vec![1]]);
        assert!(BTreeNode::from_page(&page).is_err());
    }

    #[test]
    fn test_internal_entry_helpers() {
        let mut node = BTreeNode::new_internal(0);
        node.keys = vec![10, 30];
        node.children = vec![1, 2, 3];

        node.insert_internal_entry(1, 20, 9);
        assert_eq!(node.keys, vec![10, 20, 30]);
        assert_eq!(node.children, vec![1, 2, 9, 3]);

        node.remove_internal_entry(1);
        assert_eq!(node.keys, vec![10, 30]);
        assert_eq!(node.children, vec![1, 2, 3]);
    }

    #[test]
    fn test_child_slots() {
        let mut node = BTreeNode::new_internal(0);
        node.keys = vec![10, 20];
        node.children = vec![1, 2, 3];

        // Upper descent: equal keys go right of the separator
        assert_eq!(node.child_slot_upper(5), 0);
        assert_eq!(node.child_slot_upper(10), 1);
        assert_eq!(node.child_slot_upper(15), 1);
        assert_eq!(node.child_slot_upper(25), 2);

        // Lower descent: equal keys descend left
        assert_eq!(node.child_slot_lower(10), 0);
        assert_eq!(node.child_slot_lower(11), 1);
        assert_eq!(node.child_slot_lower(20), 1);
        assert_eq!(node.child_slot_lower(21), 2);
    }
}
