//! B+tree over fixed-size pages, keyed by `u32`.
//!
//! Leaves hold `(key, row)` cells and are chained left to right through
//! their next-leaf pointer. Internal nodes hold `(child, separator)` cells
//! plus a rightmost child.
//!
//! # Splits
//!
//! A full leaf that must take one more cell splits into itself (left) and a
//! fresh page (right). The separator for the left half is pushed into the
//! parent, which splits in turn when it overflows. When the root splits, its
//! contents move to a fresh page and the root page is rewritten as an
//! internal node with two children, so the root page number never changes.
//!
//! Every page a split cascade needs is allocated before any page is
//! modified. If storage runs out, the insert fails and the tree is untouched.
//!
//! Walks over page pointers are bounded by the number of pages in storage,
//! so pointers that loop are reported as corruption.

use crate::storage::btree::layout::{
    INTERNAL_NODE_LEFT_SPLIT_COUNT, INTERNAL_NODE_MAX_KEYS, LEAF_NODE_LEFT_SPLIT_COUNT,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
};
use crate::storage::btree::node::{
    InternalNode, LeafNode, Node, NodeError, reparent, set_node_root,
};
use crate::storage::io::{Storage, StorageError};
use crate::storage::page::{Page, PageId};
use crate::types::Row;

/// Position of a key within the tree: a leaf page and a cell index.
///
/// Points at the key's cell when the key is present, or at the cell where it
/// would be inserted when it is not. Not persisted; recompute after any insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page_id: PageId,
    pub cell_index: usize,
}

/// A B-tree backed by page storage.
pub struct BTree<'a, S: Storage> {
    storage: &'a mut S,
    root_page: PageId,
}

impl<'a, S: Storage> BTree<'a, S> {
    /// Open an existing tree rooted at `root_page`.
    pub const fn open(storage: &'a mut S, root_page: PageId) -> Self {
        Self { storage, root_page }
    }

    /// Allocate a page and initialize it as the empty root leaf of a new tree.
    pub fn create(storage: &'a mut S) -> Result<Self, BTreeError> {
        let root_page = storage.allocate_page()?;
        let mut root = LeafNode::initialize(storage.page(root_page)?);
        root.set_root(true);
        Ok(Self { storage, root_page })
    }

    /// Get the root page ID.
    #[must_use]
    pub const fn root_page(&self) -> PageId {
        self.root_page
    }

    /// Find the leaf position of `key`, descending from the root.
    pub fn find(&mut self, key: u32) -> Result<Cursor, BTreeError> {
        let mut page_id = self.root_page;
        let mut budget = StepBudget::new(&*self.storage);

        loop {
            budget.step(page_id)?;
            let page = self.storage.page(page_id)?;
            match Node::from_page(&*page)? {
                Node::Leaf(leaf) => {
                    return Ok(Cursor {
                        page_id,
                        cell_index: leaf.find(key),
                    });
                }
                Node::Internal(node) => {
                    let child_index = node.find_child(key);
                    page_id = node.child(child_index)?;
                }
            }
        }
    }

    /// Look up the row stored under `key`.
    pub fn get(&mut self, key: u32) -> Result<Option<Row>, BTreeError> {
        let cursor = self.find(key)?;
        let leaf = LeafNode::from_page(&*self.storage.page(cursor.page_id)?)?;

        if cursor.cell_index < leaf.cell_count() && leaf.key(cursor.cell_index) == key {
            Ok(Some(leaf.row(cursor.cell_index)))
        } else {
            Ok(None)
        }
    }

    /// Insert a new key. Fails with `DuplicateKey` if the key is already present.
    pub fn insert(&mut self, key: u32, row: &Row) -> Result<(), BTreeError> {
        let cursor = self.find(key)?;
        {
            let leaf = LeafNode::from_page(&*self.storage.page(cursor.page_id)?)?;
            if cursor.cell_index < leaf.cell_count() && leaf.key(cursor.cell_index) == key {
                return Err(BTreeError::DuplicateKey(key));
            }
        }
        self.insert_at_cursor(cursor, key, row)
    }

    /// Insert a cell at the cursor position, splitting the leaf if it is full.
    ///
    /// The cursor must be the one `find(key)` returns now, and `key` must not
    /// already be present. Any other cursor is rejected with `InvariantBroken`
    /// and the tree is left unchanged.
    pub fn leaf_insert(&mut self, cursor: Cursor, key: u32, row: &Row) -> Result<(), BTreeError> {
        let expected = self.find(key)?;
        if cursor != expected {
            return Err(BTreeError::InvariantBroken(format!(
                "cursor {cursor:?} is not where key {key} belongs ({expected:?})"
            )));
        }
        self.insert_at_cursor(cursor, key, row)
    }

    fn insert_at_cursor(&mut self, cursor: Cursor, key: u32, row: &Row) -> Result<(), BTreeError> {
        let mut leaf = LeafNode::from_page(self.storage.page(cursor.page_id)?)?;
        check_insert_position(&leaf, cursor, key)?;

        if leaf.is_full() {
            return self.leaf_split_and_insert(cursor, key, row);
        }

        leaf.insert_at(cursor.cell_index, key, row);
        Ok(())
    }

    /// Split a full leaf into itself and a new right sibling, placing the new
    /// cell at its sorted position, then update the parent.
    fn leaf_split_and_insert(
        &mut self,
        cursor: Cursor,
        key: u32,
        row: &Row,
    ) -> Result<(), BTreeError> {
        let pages_needed = self.pages_needed_for_split(cursor.page_id)?;
        let mut fresh = self.reserve_pages(pages_needed)?;
        let new_page_id = next_reserved(&mut fresh)?;

        // Snapshot the old cells so both halves can be written from one source
        let old_page: Page = self.storage.page(cursor.page_id)?.clone();
        let old = LeafNode::from_page(&old_page)?;
        let was_root = old.is_root();
        let parent = old.parent();

        {
            let mut right = LeafNode::initialize(self.storage.page(new_page_id)?);
            right.set_parent(parent);
            right.set_next_leaf(old.next_leaf());
            for i in (LEAF_NODE_LEFT_SPLIT_COUNT..=LEAF_NODE_MAX_CELLS).rev() {
                let index_within_node = i % LEAF_NODE_LEFT_SPLIT_COUNT;
                place_split_cell(&mut right, index_within_node, i, &old, cursor, key, row);
            }
            right.set_cell_count(LEAF_NODE_RIGHT_SPLIT_COUNT);
        }

        {
            let mut left = LeafNode::from_page(self.storage.page(cursor.page_id)?)?;
            left.set_next_leaf(new_page_id);
            for i in (0..LEAF_NODE_LEFT_SPLIT_COUNT).rev() {
                let index_within_node = i % LEAF_NODE_LEFT_SPLIT_COUNT;
                place_split_cell(&mut left, index_within_node, i, &old, cursor, key, row);
            }
            left.set_cell_count(LEAF_NODE_LEFT_SPLIT_COUNT);
        }

        tracing::debug!(
            "Split leaf {} into {} and {} (key {key})",
            cursor.page_id,
            cursor.page_id,
            new_page_id
        );

        if was_root {
            self.create_new_root(new_page_id, &mut fresh)
        } else {
            self.internal_insert(parent, cursor.page_id, new_page_id, &mut fresh)
        }
    }

    /// Count the fresh pages a split starting at `leaf_page_id` will consume:
    /// one for the new leaf, one per full ancestor, and one more if the
    /// cascade reaches the root.
    fn pages_needed_for_split(&mut self, leaf_page_id: PageId) -> Result<usize, BTreeError> {
        let mut pages_needed = 1;
        let mut page_id = leaf_page_id;
        let mut budget = StepBudget::new(&*self.storage);

        loop {
            budget.step(page_id)?;
            let (is_root, parent) = {
                let node = Node::from_page(&*self.storage.page(page_id)?)?;
                (node.is_root(), node.parent())
            };
            if is_root {
                pages_needed += 1;
                return Ok(pages_needed);
            }

            let parent_node = InternalNode::from_page(&*self.storage.page(parent)?)?;
            if !parent_node.is_full() {
                return Ok(pages_needed);
            }
            pages_needed += 1;
            page_id = parent;
        }
    }

    /// Allocate `count` fresh pages, or none if storage cannot supply them all.
    fn reserve_pages(&mut self, count: usize) -> Result<std::vec::IntoIter<PageId>, BTreeError> {
        if let Some(max_pages) = self.storage.max_pages() {
            let available = max_pages.saturating_sub(self.storage.total_pages()) as usize;
            if available < count {
                tracing::warn!("Split needs {count} pages but only {available} are left");
                return Err(StorageError::TableFull { max_pages }.into());
            }
        }
        let pages = (0..count)
            .map(|_| self.storage.allocate_page())
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(pages.into_iter())
    }

    /// Move the root's contents to a fresh page and rewrite the root as an
    /// internal node whose children are that page and `right_child_page_id`.
    fn create_new_root(
        &mut self,
        right_child_page_id: PageId,
        fresh: &mut std::vec::IntoIter<PageId>,
    ) -> Result<(), BTreeError> {
        let root_page = self.root_page;
        let left_child_page_id = next_reserved(fresh)?;

        let root_copy: Page = self.storage.page(root_page)?.clone();
        {
            let left_child = self.storage.page(left_child_page_id)?;
            left_child.copy_from(&root_copy);
            set_node_root(left_child, false)?;
            reparent(left_child, root_page)?;
        }

        // An internal root's children now hang off the copy
        if let Node::Internal(old_root) = Node::from_page(&root_copy)? {
            for child in old_root.children() {
                self.set_parent(child, left_child_page_id)?;
            }
        }

        let left_child_max_key = self.max_key(left_child_page_id)?;
        self.set_parent(right_child_page_id, root_page)?;

        let mut root = InternalNode::initialize(self.storage.page(root_page)?);
        root.set_root(true);
        root.write_entries(
            &[left_child_max_key],
            &[left_child_page_id, right_child_page_id],
        );

        tracing::debug!(
            "Created new root {root_page} over {left_child_page_id} and {right_child_page_id} (separator {left_child_max_key})"
        );
        Ok(())
    }

    /// Record that `left_child`, a child of `parent_page_id`, has split off
    /// `right_child` to its right.
    fn internal_insert(
        &mut self,
        parent_page_id: PageId,
        left_child: PageId,
        right_child: PageId,
        fresh: &mut std::vec::IntoIter<PageId>,
    ) -> Result<(), BTreeError> {
        let left_max_key = self.max_key(left_child)?;

        let (index, mut keys, mut children) = {
            let parent = InternalNode::from_page(&*self.storage.page(parent_page_id)?)?;
            (parent.find_child(left_max_key), parent.keys(), parent.children())
        };
        if children.get(index) != Some(&left_child) {
            return Err(BTreeError::InvariantBroken(format!(
                "page {left_child} is not child {index} of internal node {parent_page_id}"
            )));
        }

        keys.insert(index, left_max_key);
        children.insert(index + 1, right_child);
        self.set_parent(right_child, parent_page_id)?;

        if keys.len() <= INTERNAL_NODE_MAX_KEYS {
            let mut parent = InternalNode::from_page(self.storage.page(parent_page_id)?)?;
            parent.write_entries(&keys, &children);
            return Ok(());
        }

        self.internal_split(parent_page_id, &keys, &children, fresh)
    }

    /// Split an overflowing internal node. `keys` and `children` are its
    /// logical contents, one entry past capacity.
    fn internal_split(
        &mut self,
        page_id: PageId,
        keys: &[u32],
        children: &[PageId],
        fresh: &mut std::vec::IntoIter<PageId>,
    ) -> Result<(), BTreeError> {
        debug_assert_eq!(keys.len(), INTERNAL_NODE_MAX_KEYS + 1);
        debug_assert_eq!(children.len(), keys.len() + 1);

        let new_page_id = next_reserved(fresh)?;
        let (was_root, parent) = {
            let node = InternalNode::from_page(&*self.storage.page(page_id)?)?;
            (node.is_root(), node.parent())
        };

        // The separator between the halves is not kept in either node; the
        // grandparent gets the left half's max key instead
        let (left_children, right_children) = children.split_at(INTERNAL_NODE_LEFT_SPLIT_COUNT);
        let left_keys = &keys[..INTERNAL_NODE_LEFT_SPLIT_COUNT - 1];
        let right_keys = &keys[INTERNAL_NODE_LEFT_SPLIT_COUNT..];

        {
            let mut right = InternalNode::initialize(self.storage.page(new_page_id)?);
            right.set_parent(parent);
            right.write_entries(right_keys, right_children);
        }
        for &child in right_children {
            self.set_parent(child, new_page_id)?;
        }
        {
            let mut left = InternalNode::from_page(self.storage.page(page_id)?)?;
            left.write_entries(left_keys, left_children);
        }

        tracing::debug!(
            "Split internal node {page_id} into {page_id} ({} keys) and {new_page_id} ({} keys)",
            left_keys.len(),
            right_keys.len()
        );

        if was_root {
            self.create_new_root(new_page_id, fresh)
        } else {
            self.internal_insert(parent, page_id, new_page_id, fresh)
        }
    }

    fn set_parent(&mut self, page_id: PageId, parent: PageId) -> Result<(), BTreeError> {
        reparent(self.storage.page(page_id)?, parent)?;
        Ok(())
    }

    /// The largest key stored under `page_id`, found by following rightmost
    /// children down to a leaf.
    pub fn max_key(&mut self, page_id: PageId) -> Result<u32, BTreeError> {
        let mut current = page_id;
        let mut budget = StepBudget::new(&*self.storage);

        loop {
            budget.step(current)?;
            match Node::from_page(&*self.storage.page(current)?)? {
                Node::Leaf(leaf) => {
                    return leaf.max_key().ok_or_else(|| {
                        BTreeError::InvariantBroken(format!("leaf {current} is empty"))
                    });
                }
                Node::Internal(node) => current = node.right_child(),
            }
        }
    }

    /// Render the tree as an indented outline, one node or key per line.
    pub fn render(&mut self) -> Result<String, BTreeError> {
        let mut lines = Vec::new();
        let mut budget = StepBudget::new(&*self.storage);
        self.render_node(self.root_page, 0, &mut budget, &mut lines)?;
        Ok(lines.join("\n"))
    }

    fn render_node(
        &mut self,
        page_id: PageId,
        indent: usize,
        budget: &mut StepBudget,
        lines: &mut Vec<String>,
    ) -> Result<(), BTreeError> {
        budget.step(page_id)?;
        let pad = "  ".repeat(indent);
        let inner = "  ".repeat(indent + 1);

        let (keys, children) = match Node::from_page(&*self.storage.page(page_id)?)? {
            Node::Leaf(leaf) => {
                lines.push(format!("{pad}- leaf (size {})", leaf.cell_count()));
                lines.extend(leaf.keys().map(|key| format!("{inner}- {key}")));
                return Ok(());
            }
            Node::Internal(node) => (node.keys(), node.children()),
        };

        lines.push(format!("{pad}- internal (size {})", keys.len()));
        for (key, &child) in keys.iter().zip(&children) {
            self.render_node(child, indent + 1, budget, lines)?;
            lines.push(format!("{inner}- key {key}"));
        }
        if let Some(&right_child) = children.last() {
            self.render_node(right_child, indent + 1, budget, lines)?;
        }
        Ok(())
    }

    /// Iterate over every entry in key order, starting at the leftmost leaf.
    pub fn scan(mut self) -> Result<BTreeIterator<'a, S>, BTreeError> {
        // No key sorts before 0, so its position is the start of the leftmost leaf
        let start = self.find(0)?;
        let budget = StepBudget::new(&*self.storage);
        Ok(BTreeIterator {
            storage: self.storage,
            cursor: start,
            budget,
        })
    }
}

/// Upper bound on the nodes one walk may visit. A well-formed tree never
/// visits a page twice in one walk, so exhausting it means the pointers loop.
struct StepBudget {
    remaining: u32,
}

impl StepBudget {
    fn new<S: Storage>(storage: &S) -> Self {
        Self {
            remaining: storage.total_pages(),
        }
    }

    fn step(&mut self, page_id: PageId) -> Result<(), BTreeError> {
        if self.remaining == 0 {
            return Err(StorageError::Corruption(format!(
                "page pointers loop back through page {page_id}"
            ))
            .into());
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// Reject a cursor that would break the leaf's ordering.
fn check_insert_position<P: std::ops::Deref<Target = Page>>(
    leaf: &LeafNode<P>,
    cursor: Cursor,
    key: u32,
) -> Result<(), BTreeError> {
    let count = leaf.cell_count();
    let index = cursor.cell_index;

    if index > count {
        return Err(BTreeError::InvariantBroken(format!(
            "cursor cell {index} is past the end of leaf {} ({count} cells)",
            cursor.page_id
        )));
    }
    if index < count && leaf.key(index) <= key {
        return Err(BTreeError::InvariantBroken(format!(
            "key {key} inserted before key {} in leaf {}",
            leaf.key(index),
            cursor.page_id
        )));
    }
    if index > 0 && leaf.key(index - 1) >= key {
        return Err(BTreeError::InvariantBroken(format!(
            "key {key} inserted after key {} in leaf {}",
            leaf.key(index - 1),
            cursor.page_id
        )));
    }
    Ok(())
}

/// Fill `dst_index` of a split half with logical cell `logical_index` of the
/// overflowing leaf: the new entry at the cursor, old cells shifted around it.
fn place_split_cell<P: std::ops::DerefMut<Target = Page>>(
    dst: &mut LeafNode<P>,
    dst_index: usize,
    logical_index: usize,
    old: &LeafNode<&Page>,
    cursor: Cursor,
    key: u32,
    row: &Row,
) {
    match logical_index.cmp(&cursor.cell_index) {
        std::cmp::Ordering::Equal => dst.write_entry(dst_index, key, row),
        std::cmp::Ordering::Greater => dst.write_cell(dst_index, old.cell(logical_index - 1)),
        std::cmp::Ordering::Less => dst.write_cell(dst_index, old.cell(logical_index)),
    }
}

fn next_reserved(fresh: &mut std::vec::IntoIter<PageId>) -> Result<PageId, BTreeError> {
    fresh.next().ok_or_else(|| {
        BTreeError::InvariantBroken("split used more pages than were reserved".to_string())
    })
}

/// Iterator over B-tree entries in key order.
pub struct BTreeIterator<'a, S: Storage> {
    storage: &'a mut S,
    cursor: Cursor,
    budget: StepBudget,
}

impl<S: Storage> BTreeIterator<'_, S> {
    /// Get the next entry.
    pub fn next_entry(&mut self) -> Result<Option<(u32, Row)>, BTreeError> {
        loop {
            let leaf = LeafNode::from_page(&*self.storage.page(self.cursor.page_id)?)?;

            if self.cursor.cell_index < leaf.cell_count() {
                let entry = (
                    leaf.key(self.cursor.cell_index),
                    leaf.row(self.cursor.cell_index),
                );
                self.cursor.cell_index += 1;
                return Ok(Some(entry));
            }

            // Move to next leaf
            let next_leaf = leaf.next_leaf();
            if next_leaf == 0 {
                return Ok(None);
            }
            self.budget.step(next_leaf)?;
            self.cursor = Cursor {
                page_id: next_leaf,
                cell_index: 0,
            };
        }
    }
}

/// Errors that can occur during B-tree operations.
#[derive(Debug)]
pub enum BTreeError {
    /// Storage error, including running out of pages.
    Storage(StorageError),
    /// Node error.
    Node(NodeError),
    /// The key is already present.
    DuplicateKey(u32),
    /// A caller broke an operation's contract; nothing was modified.
    InvariantBroken(String),
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Node(e) => write!(f, "node error: {e}"),
            Self::DuplicateKey(key) => write!(f, "duplicate key: {key}"),
            Self::InvariantBroken(msg) => write!(f, "invariant broken: {msg}"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Node(e) => Some(e),
            Self::DuplicateKey(_) | Self::InvariantBroken(_) => None,
        }
    }
}

impl From<StorageError> for BTreeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<NodeError> for BTreeError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{id}"), &format!("person{id}@example.com")).expect("row")
    }

    fn new_tree(storage: &mut MemoryStorage) -> BTree<'_, MemoryStorage> {
        BTree::create(storage).expect("create tree")
    }

    fn insert_all(tree: &mut BTree<'_, MemoryStorage>, keys: &[u32]) {
        for &key in keys {
            tree.insert(key, &row(key)).expect("insert");
        }
    }

    fn shuffled(n: u32, seed: u64) -> Vec<u32> {
        let mut keys: Vec<u32> = (1..=n).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(seed));
        keys
    }

    /// Walk the whole tree checking ordering, separator bounds, parent
    /// pointers, uniform leaf depth, and the sibling chain. Returns all keys
    /// in order.
    fn check_tree(storage: &mut MemoryStorage, root: PageId) -> Vec<u32> {
        let mut keys = Vec::new();
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        check_node(
            storage,
            root,
            None,
            (None, None),
            0,
            &mut leaf_depth,
            &mut keys,
            &mut leaves,
        );

        // The sibling chain visits the leaves in the same order as the walk
        for pair in leaves.windows(2) {
            let page = storage.page(pair[0]).expect("page");
            let leaf = LeafNode::from_page(&*page).expect("leaf");
            assert_eq!(leaf.next_leaf(), pair[1], "sibling chain out of order");
        }
        if let Some(&last) = leaves.last() {
            let page = storage.page(last).expect("page");
            assert_eq!(LeafNode::from_page(&*page).expect("leaf").next_leaf(), 0);
        }

        keys
    }

    #[allow(clippy::too_many_arguments)]
    fn check_node(
        storage: &mut MemoryStorage,
        page_id: PageId,
        parent: Option<PageId>,
        (lower, upper): (Option<u32>, Option<u32>),
        depth: usize,
        leaf_depth: &mut Option<usize>,
        keys: &mut Vec<u32>,
        leaves: &mut Vec<PageId>,
    ) {
        let page = storage.page(page_id).expect("page").clone();
        let node = Node::from_page(&page).expect("node");
        assert_eq!(node.is_root(), parent.is_none(), "root flag on page {page_id}");
        if let Some(parent) = parent {
            assert_eq!(node.parent(), parent, "parent pointer of page {page_id}");
        }

        let in_bounds = |key: u32| lower.is_none_or(|l| key > l) && upper.is_none_or(|u| key <= u);

        match node {
            Node::Leaf(leaf) => {
                assert_eq!(*leaf_depth.get_or_insert(depth), depth, "leaves at uneven depth");
                assert!(leaf.cell_count() <= LEAF_NODE_MAX_CELLS);
                let leaf_keys: Vec<u32> = leaf.keys().collect();
                assert!(leaf_keys.windows(2).all(|w| w[0] < w[1]), "leaf {page_id} unsorted");
                for (i, &key) in leaf_keys.iter().enumerate() {
                    assert!(in_bounds(key), "key {key} outside bounds of leaf {page_id}");
                    assert_eq!(leaf.row(i), row(key), "row for key {key}");
                }
                keys.extend(leaf_keys);
                leaves.push(page_id);
            }
            Node::Internal(internal) => {
                let separators = internal.keys();
                let children = internal.children();
                assert!(!separators.is_empty(), "internal node {page_id} has no keys");
                assert!(separators.len() <= INTERNAL_NODE_MAX_KEYS);
                assert!(separators.windows(2).all(|w| w[0] < w[1]));

                for (i, &child) in children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { Some(separators[i - 1]) };
                    let child_upper = separators.get(i).copied().or(upper);
                    check_node(
                        storage,
                        child,
                        Some(page_id),
                        (child_lower, child_upper),
                        depth + 1,
                        leaf_depth,
                        keys,
                        leaves,
                    );
                }
            }
        }
    }

    fn depth(storage: &mut MemoryStorage, root: PageId) -> usize {
        let mut depth = 0;
        let mut page_id = root;
        loop {
            let page = storage.page(page_id).expect("page");
            match Node::from_page(&*page).expect("node") {
                Node::Leaf(_) => return depth,
                Node::Internal(node) => page_id = node.child(0).expect("child"),
            }
            depth += 1;
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);

        insert_all(&mut tree, &[3, 1, 2]);

        assert_eq!(tree.get(1).expect("get"), Some(row(1)));
        assert_eq!(tree.get(2).expect("get"), Some(row(2)));
        assert_eq!(tree.get(3).expect("get"), Some(row(3)));
        assert_eq!(tree.get(4).expect("get"), None);
    }

    #[test]
    fn test_find_reports_insertion_point() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        insert_all(&mut tree, &[10, 20, 30]);

        let root = tree.root_page();
        let at = |cell_index| Cursor {
            page_id: root,
            cell_index,
        };
        assert_eq!(tree.find(20).expect("find"), at(1));
        assert_eq!(tree.find(15).expect("find"), at(1));
        assert_eq!(tree.find(5).expect("find"), at(0));
        assert_eq!(tree.find(35).expect("find"), at(3));
    }

    #[test]
    fn test_find_is_idempotent() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        insert_all(&mut tree, &shuffled(100, 7));

        for key in [0, 1, 50, 99, 100, 101] {
            let first = tree.find(key).expect("find");
            let second = tree.find(key).expect("find");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_duplicate_key() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        tree.insert(1, &row(1)).expect("insert");

        let other = Row::new(1, "someone", "else@example.com").expect("row");
        assert!(matches!(
            tree.insert(1, &other),
            Err(BTreeError::DuplicateKey(1))
        ));
        assert_eq!(tree.get(1).expect("get"), Some(row(1)), "original row kept");
    }

    #[test]
    fn test_duplicate_key_after_split() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        insert_all(&mut tree, &shuffled(200, 3));

        for key in [1, 77, 200] {
            assert!(matches!(
                tree.insert(key, &row(key)),
                Err(BTreeError::DuplicateKey(k)) if k == key
            ));
        }
    }

    #[test]
    fn test_leaf_insert_rejects_bad_cursor() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        insert_all(&mut tree, &[10, 20]);
        let root = tree.root_page();

        let past_end = Cursor {
            page_id: root,
            cell_index: 3,
        };
        assert!(matches!(
            tree.leaf_insert(past_end, 30, &row(30)),
            Err(BTreeError::InvariantBroken(_))
        ));

        // Key already present at the cursor: the duplicate check was skipped
        let cursor = tree.find(20).expect("find");
        assert!(matches!(
            tree.leaf_insert(cursor, 20, &row(20)),
            Err(BTreeError::InvariantBroken(_))
        ));

        // Cursor that would put 5 after 10
        let misplaced = Cursor {
            page_id: root,
            cell_index: 1,
        };
        assert!(matches!(
            tree.leaf_insert(misplaced, 5, &row(5)),
            Err(BTreeError::InvariantBroken(_))
        ));

        assert_eq!(check_tree(&mut storage, root), vec![10, 20]);
    }

    #[test]
    fn test_leaf_insert_rejects_wrong_leaf() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();
        let keys: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32 + 1).collect();
        insert_all(&mut tree, &keys);

        // The end of the left leaf is a sorted position for 100, but 100
        // belongs right of the separator
        let left = tree.find(1).expect("find").page_id;
        assert_ne!(left, tree.find(100).expect("find").page_id);
        let wrong_leaf = Cursor {
            page_id: left,
            cell_index: LEAF_NODE_LEFT_SPLIT_COUNT,
        };
        assert!(matches!(
            tree.leaf_insert(wrong_leaf, 100, &row(100)),
            Err(BTreeError::InvariantBroken(_))
        ));
        assert_eq!(tree.get(100).expect("get"), None);

        let cursor = tree.find(100).expect("find");
        tree.leaf_insert(cursor, 100, &row(100)).expect("insert at found cursor");
        assert_eq!(tree.get(100).expect("get"), Some(row(100)));

        let mut expected = keys;
        expected.push(100);
        assert_eq!(check_tree(&mut storage, root), expected);
    }

    #[test]
    fn test_first_root_split() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        let n = LEAF_NODE_MAX_CELLS as u32;
        let keys: Vec<u32> = (1..=n + 1).collect();
        insert_all(&mut tree, &keys[..LEAF_NODE_MAX_CELLS]);
        assert_eq!(storage.total_pages(), 1, "no split while the leaf has room");

        let mut tree = BTree::open(&mut storage, root);
        tree.insert(n + 1, &row(n + 1)).expect("insert");
        assert_eq!(storage.total_pages(), 3, "exactly one split");

        let page = storage.page(root).expect("root").clone();
        let root_node = InternalNode::from_page(&page).expect("root is internal");
        assert!(root_node.is_root());
        assert_eq!(root_node.key_count(), 1);
        assert_eq!(root_node.key(0), LEAF_NODE_LEFT_SPLIT_COUNT as u32);

        let left_id = root_node.child(0).expect("left");
        let right_id = root_node.child(1).expect("right");

        let left_page = storage.page(left_id).expect("left").clone();
        let left = LeafNode::from_page(&left_page).expect("left leaf");
        let right_page = storage.page(right_id).expect("right").clone();
        let right = LeafNode::from_page(&right_page).expect("right leaf");

        let left_keys: Vec<u32> = left.keys().collect();
        let right_keys: Vec<u32> = right.keys().collect();
        assert_eq!(left_keys, (1..=LEAF_NODE_LEFT_SPLIT_COUNT as u32).collect::<Vec<_>>());
        assert_eq!(
            right_keys,
            (LEAF_NODE_LEFT_SPLIT_COUNT as u32 + 1..=n + 1).collect::<Vec<_>>()
        );
        assert_eq!(root_node.key(0), left.max_key().expect("max"));

        assert!(!left.is_root());
        assert!(!right.is_root());
        assert_eq!(left.parent(), root);
        assert_eq!(right.parent(), root);
        assert_eq!(left.next_leaf(), right_id);
        assert_eq!(right.next_leaf(), 0);

        let mut tree = BTree::open(&mut storage, root);
        for key in keys {
            assert_eq!(tree.get(key).expect("get"), Some(row(key)), "key {key}");
        }
    }

    #[test]
    fn test_split_places_new_key_in_order() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        // Fill the leaf with even keys, then split it with an odd key in the middle
        let evens: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32).map(|i| i * 2).collect();
        insert_all(&mut tree, &evens);
        tree.insert(9, &row(9)).expect("insert");

        let page = storage.page(root).expect("root").clone();
        let root_node = InternalNode::from_page(&page).expect("internal");
        let left_page = storage.page(root_node.child(0).expect("left")).expect("page").clone();
        let right_page = storage.page(root_node.child(1).expect("right")).expect("page").clone();
        let left = LeafNode::from_page(&left_page).expect("leaf");
        let right = LeafNode::from_page(&right_page).expect("leaf");

        assert_eq!(
            left.cell_count() + right.cell_count(),
            LEAF_NODE_MAX_CELLS + 1
        );
        assert_eq!(left.cell_count(), LEAF_NODE_LEFT_SPLIT_COUNT);
        assert_eq!(right.cell_count(), LEAF_NODE_RIGHT_SPLIT_COUNT);
        let left_max = left.max_key().expect("max");
        assert!(right.keys().all(|k| k > left_max));
        assert!(left.keys().any(|k| k == 9));

        let keys = check_tree(&mut storage, root);
        let mut expected = evens;
        expected.push(9);
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_split_with_new_key_at_either_end() {
        for new_key in [0, 1000] {
            let mut storage = MemoryStorage::new();
            let mut tree = new_tree(&mut storage);
            let root = tree.root_page();

            let keys: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32).map(|i| i * 10).collect();
            insert_all(&mut tree, &keys);
            tree.insert(new_key, &row(new_key)).expect("insert");

            let mut expected = keys;
            expected.push(new_key);
            expected.sort_unstable();
            assert_eq!(check_tree(&mut storage, root), expected);
        }
    }

    #[test]
    fn test_non_root_leaf_split_updates_parent() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        // Three leaves' worth of keys forces splits below an internal root
        let keys = shuffled(3 * LEAF_NODE_MAX_CELLS as u32, 11);
        insert_all(&mut tree, &keys);

        let page = storage.page(root).expect("root").clone();
        let root_node = InternalNode::from_page(&page).expect("internal");
        assert!(root_node.key_count() >= 2, "parent received new separators");

        let mut sorted = keys;
        sorted.sort_unstable();
        assert_eq!(check_tree(&mut storage, root), sorted);
    }

    #[test]
    fn test_random_order_inserts() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        let keys = shuffled(2_000, 42);
        insert_all(&mut tree, &keys);

        let mut tree = BTree::open(&mut storage, root);
        for &key in &keys {
            assert_eq!(tree.get(key).expect("get"), Some(row(key)), "key {key}");
        }
        assert_eq!(tree.get(0).expect("get"), None);
        assert_eq!(tree.get(2_001).expect("get"), None);

        assert_eq!(check_tree(&mut storage, root), (1..=2_000).collect::<Vec<_>>());
    }

    #[test]
    fn test_descending_inserts() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        let keys: Vec<u32> = (1..=500).rev().collect();
        insert_all(&mut tree, &keys);

        assert_eq!(check_tree(&mut storage, root), (1..=500).collect::<Vec<_>>());
    }

    #[test]
    fn test_internal_root_split() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        // Ascending inserts leave every leaf but the last half full, so this
        // many keys overflow a single internal root
        let n = ((INTERNAL_NODE_MAX_KEYS + 2) * LEAF_NODE_LEFT_SPLIT_COUNT) as u32 + 50;
        let keys: Vec<u32> = (1..=n).collect();
        insert_all(&mut tree, &keys);

        assert_eq!(depth(&mut storage, root), 2, "root split into internal children");

        let page = storage.page(root).expect("root").clone();
        let root_node = InternalNode::from_page(&page).expect("internal");
        assert_eq!(root_node.key_count(), 1);
        let left_max = BTree::open(&mut storage, root)
            .max_key(root_node.child(0).expect("left"))
            .expect("max");
        assert_eq!(root_node.key(0), left_max);

        assert_eq!(check_tree(&mut storage, root), keys);
    }

    #[test]
    fn test_internal_split_random_order() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        let keys = shuffled(12_000, 1234);
        insert_all(&mut tree, &keys);

        assert!(depth(&mut storage, root) >= 2, "internal nodes split");

        let mut tree = BTree::open(&mut storage, root);
        for &key in keys.iter().step_by(97) {
            assert_eq!(tree.get(key).expect("get"), Some(row(key)), "key {key}");
        }
        assert_eq!(check_tree(&mut storage, root), (1..=12_000).collect::<Vec<_>>());
    }

    #[test]
    fn test_max_key() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        assert!(matches!(
            tree.max_key(root),
            Err(BTreeError::InvariantBroken(_))
        ));

        insert_all(&mut tree, &shuffled(300, 5));
        assert_eq!(tree.max_key(root).expect("max"), 300);
    }

    #[test]
    fn test_scan_in_order() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        insert_all(&mut tree, &shuffled(250, 9));

        let mut iter = tree.scan().expect("scan");
        let mut seen = Vec::new();
        while let Some((key, value)) = iter.next_entry().expect("next") {
            assert_eq!(value.id, key);
            seen.push(key);
        }
        assert_eq!(seen, (1..=250).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_empty_tree() {
        let mut storage = MemoryStorage::new();
        let tree = new_tree(&mut storage);
        let mut iter = tree.scan().expect("scan");
        assert!(iter.next_entry().expect("next").is_none());
    }

    #[test]
    fn test_allocation_failure_leaves_tree_intact() {
        let mut storage = MemoryStorage::with_max_pages(6);
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();

        let keys = shuffled(500, 21);
        let mut inserted = Vec::new();
        let mut failed_key = None;
        for &key in &keys {
            match tree.insert(key, &row(key)) {
                Ok(()) => inserted.push(key),
                Err(BTreeError::Storage(StorageError::TableFull { max_pages: 6 })) => {
                    failed_key = Some(key);
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        let failed_key = failed_key.expect("page limit reached");

        let mut tree = BTree::open(&mut storage, root);
        assert_eq!(tree.get(failed_key).expect("get"), None);
        for &key in &inserted {
            assert_eq!(tree.get(key).expect("get"), Some(row(key)));
        }

        inserted.sort_unstable();
        assert_eq!(check_tree(&mut storage, root), inserted);
    }

    #[test]
    fn test_split_that_cannot_fit_allocates_nothing() {
        // The first root split needs two pages; only one is left
        let mut storage = MemoryStorage::with_max_pages(2);
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();
        let keys: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32).collect();
        insert_all(&mut tree, &keys);

        let overflow = LEAF_NODE_MAX_CELLS as u32 + 1;
        assert!(matches!(
            tree.insert(overflow, &row(overflow)),
            Err(BTreeError::Storage(StorageError::TableFull { max_pages: 2 }))
        ));
        assert_eq!(storage.total_pages(), 1);
        assert_eq!(check_tree(&mut storage, root), keys);
    }

    #[test]
    fn test_looping_child_pointer_is_corruption() {
        let mut storage = MemoryStorage::new();
        let root = new_tree(&mut storage).root_page();
        {
            let mut node = InternalNode::initialize(storage.page(root).expect("root"));
            node.set_root(true);
            node.write_entries(&[5], &[root, root]);
        }

        let mut tree = BTree::open(&mut storage, root);
        assert!(matches!(
            tree.find(1),
            Err(BTreeError::Storage(StorageError::Corruption(_)))
        ));
        assert!(matches!(
            tree.max_key(root),
            Err(BTreeError::Storage(StorageError::Corruption(_)))
        ));
        assert!(matches!(
            tree.render(),
            Err(BTreeError::Storage(StorageError::Corruption(_)))
        ));
    }

    #[test]
    fn test_looping_leaf_chain_is_corruption() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();
        let keys: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32 + 1).collect();
        insert_all(&mut tree, &keys);
        let left = tree.find(1).expect("find").page_id;
        let right = tree.find(100).expect("find").page_id;

        LeafNode::from_page(storage.page(right).expect("right"))
            .expect("leaf")
            .set_next_leaf(left);

        let mut iter = BTree::open(&mut storage, root).scan().expect("scan");
        let mut seen = 0;
        let err = loop {
            match iter.next_entry() {
                Ok(Some(_)) => seen += 1,
                Ok(None) => panic!("chain should never end"),
                Err(e) => break e,
            }
            assert!(seen < 100, "scan did not stop");
        };
        assert!(matches!(
            err,
            BTreeError::Storage(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn test_corrupt_node_type_is_reported() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        let root = tree.root_page();
        insert_all(&mut tree, &[1]);

        storage.page(root).expect("root").write_u8(0, 9);
        let mut tree = BTree::open(&mut storage, root);
        assert!(matches!(
            tree.find(1),
            Err(BTreeError::Node(NodeError::UnknownNodeType(9)))
        ));
    }

    #[test]
    fn test_render() {
        let mut storage = MemoryStorage::new();
        let mut tree = new_tree(&mut storage);
        insert_all(&mut tree, &[3, 1, 2]);
        assert_eq!(
            tree.render().expect("render"),
            "- leaf (size 3)\n  - 1\n  - 2\n  - 3"
        );

        let keys: Vec<u32> = (4..=LEAF_NODE_MAX_CELLS as u32 + 1).collect();
        insert_all(&mut tree, &keys);
        let rendered = tree.render().expect("render");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "- internal (size 1)");
        assert_eq!(lines[1], "  - leaf (size 7)");
        assert_eq!(lines[2], "    - 1");
        assert_eq!(lines[9], "  - key 7");
        assert_eq!(lines[10], "  - leaf (size 7)");
        assert_eq!(lines[11], "    - 8");
        assert_eq!(lines.len(), 18);
    }
}
