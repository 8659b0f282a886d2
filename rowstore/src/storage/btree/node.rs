//! Typed views over B-tree node pages.
//!
//! A node is never deserialized into an owned structure; `LeafNode<P>` and
//! `InternalNode<P>` are thin views over a page buffer that read and write
//! fields in place at the offsets defined in `layout`. `P` is `&Page` for
//! read-only access or `&mut Page` for mutation.
//!
//! The node kind is checked once, when a view is created. Field access after
//! that is unchecked beyond the page's own bounds checks.

#![allow(clippy::cast_possible_truncation)]

use std::ops::{Deref, DerefMut};

use crate::storage::btree::layout::{
    INTERNAL_NODE_MAX_KEYS, INTERNAL_NODE_NUM_KEYS_OFFSET, INTERNAL_NODE_RIGHT_CHILD_OFFSET,
    IS_ROOT_OFFSET, LEAF_NODE_CELL_SIZE, LEAF_NODE_MAX_CELLS, LEAF_NODE_NEXT_LEAF_OFFSET,
    LEAF_NODE_NUM_CELLS_OFFSET, LEAF_NODE_VALUE_SIZE, NODE_TYPE_OFFSET, PARENT_POINTER_OFFSET,
    internal_node_child_offset, internal_node_key_offset, leaf_node_cell_offset,
    leaf_node_key_offset, leaf_node_value_offset,
};
use crate::storage::page::{Page, PageId};
use crate::types::Row;

/// Node type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

impl TryFrom<u8> for NodeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::Leaf),
            _ => Err(value),
        }
    }
}

/// Read the node type tag of a page.
pub fn node_type(page: &Page) -> Result<NodeType, NodeError> {
    NodeType::try_from(page.read_u8(NODE_TYPE_OFFSET)).map_err(NodeError::UnknownNodeType)
}

fn set_node_type(page: &mut Page, node_type: NodeType) {
    page.write_u8(NODE_TYPE_OFFSET, node_type as u8);
}

fn is_root(page: &Page) -> bool {
    page.read_u8(IS_ROOT_OFFSET) != 0
}

fn set_root(page: &mut Page, is_root: bool) {
    page.write_u8(IS_ROOT_OFFSET, u8::from(is_root));
}

fn parent(page: &Page) -> PageId {
    page.read_u32(PARENT_POINTER_OFFSET)
}

fn set_parent(page: &mut Page, parent: PageId) {
    page.write_u32(PARENT_POINTER_OFFSET, parent);
}

/// Set the parent pointer of a node page of either kind.
pub fn reparent(page: &mut Page, parent_page: PageId) -> Result<(), NodeError> {
    node_type(page)?;
    set_parent(page, parent_page);
    Ok(())
}

/// Mark a node page as the root or not.
pub fn set_node_root(page: &mut Page, root: bool) -> Result<(), NodeError> {
    node_type(page)?;
    set_root(page, root);
    Ok(())
}

/// A node of either kind.
pub enum Node<P> {
    Leaf(LeafNode<P>),
    Internal(InternalNode<P>),
}

impl<P: Deref<Target = Page>> Node<P> {
    /// Interpret a page as a node, dispatching on its type tag.
    pub fn from_page(page: P) -> Result<Self, NodeError> {
        match node_type(&page)? {
            NodeType::Leaf => LeafNode::from_page(page).map(Self::Leaf),
            NodeType::Internal => InternalNode::from_page(page).map(Self::Internal),
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.is_root(),
            Self::Internal(node) => node.is_root(),
        }
    }

    #[must_use]
    pub fn parent(&self) -> PageId {
        match self {
            Self::Leaf(leaf) => leaf.parent(),
            Self::Internal(node) => node.parent(),
        }
    }
}

/// A leaf node: sorted `(key, row)` cells plus a link to the next leaf.
pub struct LeafNode<P> {
    page: P,
}

impl<P: Deref<Target = Page>> LeafNode<P> {
    /// View a page as a leaf node.
    ///
    /// Rejects a cell count the page cannot hold.
    pub fn from_page(page: P) -> Result<Self, NodeError> {
        match node_type(&page)? {
            NodeType::Leaf => {
                let node = Self { page };
                let count = node.cell_count();
                if count > LEAF_NODE_MAX_CELLS {
                    return Err(NodeError::InvalidCount {
                        node_type: NodeType::Leaf,
                        count,
                    });
                }
                Ok(node)
            }
            found => Err(NodeError::WrongNodeType {
                expected: NodeType::Leaf,
                found,
            }),
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        is_root(&self.page)
    }

    #[must_use]
    pub fn parent(&self) -> PageId {
        parent(&self.page)
    }

    /// Number of cells in this leaf.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.page.read_u32(LEAF_NODE_NUM_CELLS_OFFSET) as usize
    }

    /// The next leaf in key order, or 0 if this is the rightmost leaf.
    #[must_use]
    pub fn next_leaf(&self) -> PageId {
        self.page.read_u32(LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    #[must_use]
    pub fn key(&self, cell_num: usize) -> u32 {
        self.page.read_u32(leaf_node_key_offset(cell_num))
    }

    /// The serialized row stored in a cell.
    #[must_use]
    pub fn value(&self, cell_num: usize) -> &[u8] {
        self.page
            .read_bytes(leaf_node_value_offset(cell_num), LEAF_NODE_VALUE_SIZE)
    }

    /// The raw bytes of a whole cell (key followed by value).
    #[must_use]
    pub fn cell(&self, cell_num: usize) -> &[u8] {
        self.page
            .read_bytes(leaf_node_cell_offset(cell_num), LEAF_NODE_CELL_SIZE)
    }

    /// Deserialize the row stored in a cell.
    #[must_use]
    pub fn row(&self, cell_num: usize) -> Row {
        Row::deserialize(self.value(cell_num))
    }

    /// All keys in cell order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.cell_count()).map(|i| self.key(i))
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cell_count() >= LEAF_NODE_MAX_CELLS
    }

    /// The largest key in this leaf, or `None` if it is empty.
    #[must_use]
    pub fn max_key(&self) -> Option<u32> {
        self.cell_count().checked_sub(1).map(|last| self.key(last))
    }

    /// Binary search for `key`.
    ///
    /// Returns the index of the cell holding `key` if present, otherwise the
    /// index where it would be inserted to keep the cells sorted.
    #[must_use]
    pub fn find(&self, key: u32) -> usize {
        let mut min_index = 0;
        let mut one_past_max_index = self.cell_count();

        while one_past_max_index != min_index {
            let index = (min_index + one_past_max_index) / 2;
            let key_at_index = self.key(index);
            if key == key_at_index {
                return index;
            }
            if key < key_at_index {
                one_past_max_index = index;
            } else {
                min_index = index + 1;
            }
        }

        min_index
    }
}

impl<P: DerefMut<Target = Page>> LeafNode<P> {
    /// Initialize a page as an empty, non-root leaf with no parent or sibling.
    pub fn initialize(mut page: P) -> Self {
        set_node_type(&mut page, NodeType::Leaf);
        set_root(&mut page, false);
        set_parent(&mut page, 0);
        let mut node = Self { page };
        node.set_cell_count(0);
        node.set_next_leaf(0);
        node
    }

    pub fn set_root(&mut self, root: bool) {
        set_root(&mut self.page, root);
    }

    pub fn set_parent(&mut self, parent_page: PageId) {
        set_parent(&mut self.page, parent_page);
    }

    pub fn set_cell_count(&mut self, count: usize) {
        self.page
            .write_u32(LEAF_NODE_NUM_CELLS_OFFSET, count as u32);
    }

    pub fn set_next_leaf(&mut self, next: PageId) {
        self.page.write_u32(LEAF_NODE_NEXT_LEAF_OFFSET, next);
    }

    pub fn set_key(&mut self, cell_num: usize, key: u32) {
        self.page.write_u32(leaf_node_key_offset(cell_num), key);
    }

    /// Overwrite a whole cell with raw bytes copied from another leaf.
    pub fn write_cell(&mut self, cell_num: usize, cell: &[u8]) {
        debug_assert_eq!(cell.len(), LEAF_NODE_CELL_SIZE);
        self.page.write_bytes(leaf_node_cell_offset(cell_num), cell);
    }

    /// Write a key and its serialized row into a cell.
    pub fn write_entry(&mut self, cell_num: usize, key: u32, row: &Row) {
        self.set_key(cell_num, key);
        row.serialize(
            self.page
                .bytes_mut(leaf_node_value_offset(cell_num), LEAF_NODE_VALUE_SIZE),
        );
    }

    /// Insert a cell at `cell_num`, shifting later cells one slot right.
    ///
    /// The leaf must not be full and `cell_num` must be at most `cell_count`.
    pub fn insert_at(&mut self, cell_num: usize, key: u32, row: &Row) {
        let count = self.cell_count();
        debug_assert!(count < LEAF_NODE_MAX_CELLS);
        debug_assert!(cell_num <= count);

        // Walk backward so no cell is overwritten before it has moved
        for i in (cell_num + 1..=count).rev() {
            self.page.copy_within(
                leaf_node_cell_offset(i - 1),
                leaf_node_cell_offset(i),
                LEAF_NODE_CELL_SIZE,
            );
        }

        self.set_cell_count(count + 1);
        self.write_entry(cell_num, key, row);
    }
}

/// An internal node: `key_count` `(child, key)` cells plus a rightmost child.
///
/// `child(i)` holds keys `<= key(i)`; the rightmost child holds keys greater
/// than every separator.
pub struct InternalNode<P> {
    page: P,
}

impl<P: Deref<Target = Page>> InternalNode<P> {
    /// View a page as an internal node.
    ///
    /// An internal node always has at least one key; a zero count (such as
    /// a page that was never written) or one past capacity is rejected.
    pub fn from_page(page: P) -> Result<Self, NodeError> {
        match node_type(&page)? {
            NodeType::Internal => {
                let node = Self { page };
                let count = node.key_count();
                if count == 0 || count > INTERNAL_NODE_MAX_KEYS {
                    return Err(NodeError::InvalidCount {
                        node_type: NodeType::Internal,
                        count,
                    });
                }
                Ok(node)
            }
            found => Err(NodeError::WrongNodeType {
                expected: NodeType::Internal,
                found,
            }),
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        is_root(&self.page)
    }

    #[must_use]
    pub fn parent(&self) -> PageId {
        parent(&self.page)
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.page.read_u32(INTERNAL_NODE_NUM_KEYS_OFFSET) as usize
    }

    #[must_use]
    pub fn right_child(&self) -> PageId {
        self.page.read_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    /// The child pointer stored in cell `cell_num`.
    #[must_use]
    pub fn cell_child(&self, cell_num: usize) -> PageId {
        self.page.read_u32(internal_node_child_offset(cell_num))
    }

    /// The separator key stored in cell `cell_num`.
    #[must_use]
    pub fn key(&self, cell_num: usize) -> u32 {
        self.page.read_u32(internal_node_key_offset(cell_num))
    }

    /// The child at `child_num`, where `child_num == key_count` is the
    /// rightmost child.
    pub fn child(&self, child_num: usize) -> Result<PageId, NodeError> {
        let key_count = self.key_count();
        match child_num.cmp(&key_count) {
            std::cmp::Ordering::Less => Ok(self.cell_child(child_num)),
            std::cmp::Ordering::Equal => Ok(self.right_child()),
            std::cmp::Ordering::Greater => Err(NodeError::ChildOutOfRange {
                child_num,
                key_count,
            }),
        }
    }

    /// All separator keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<u32> {
        (0..self.key_count()).map(|i| self.key(i)).collect()
    }

    /// All children in order, rightmost child last.
    #[must_use]
    pub fn children(&self) -> Vec<PageId> {
        let mut children: Vec<PageId> =
            (0..self.key_count()).map(|i| self.cell_child(i)).collect();
        children.push(self.right_child());
        children
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.key_count() >= INTERNAL_NODE_MAX_KEYS
    }

    /// Binary search for the index of the child that must contain `key`:
    /// the first separator `>= key`, or `key_count` for the rightmost child.
    #[must_use]
    pub fn find_child(&self, key: u32) -> usize {
        let mut min_index = 0;
        let mut max_index = self.key_count();

        while min_index != max_index {
            let index = (min_index + max_index) / 2;
            let key_to_right = self.key(index);
            if key_to_right >= key {
                max_index = index;
            } else {
                min_index = index + 1;
            }
        }

        min_index
    }
}

impl<P: DerefMut<Target = Page>> InternalNode<P> {
    /// Initialize a page as an empty, non-root internal node.
    pub fn initialize(mut page: P) -> Self {
        set_node_type(&mut page, NodeType::Internal);
        set_root(&mut page, false);
        set_parent(&mut page, 0);
        let mut node = Self { page };
        node.set_key_count(0);
        node.set_right_child(0);
        node
    }

    pub fn set_root(&mut self, root: bool) {
        set_root(&mut self.page, root);
    }

    pub fn set_parent(&mut self, parent_page: PageId) {
        set_parent(&mut self.page, parent_page);
    }

    pub fn set_key_count(&mut self, count: usize) {
        self.page
            .write_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, count as u32);
    }

    pub fn set_right_child(&mut self, child: PageId) {
        self.page.write_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, child);
    }

    pub fn set_cell_child(&mut self, cell_num: usize, child: PageId) {
        self.page.write_u32(internal_node_child_offset(cell_num), child);
    }

    pub fn set_key(&mut self, cell_num: usize, key: u32) {
        self.page.write_u32(internal_node_key_offset(cell_num), key);
    }

    /// Replace every cell and the rightmost child.
    ///
    /// `children` must hold exactly one more entry than `keys`, and `keys`
    /// must fit in a page.
    pub fn write_entries(&mut self, keys: &[u32], children: &[PageId]) {
        debug_assert_eq!(children.len(), keys.len() + 1);
        debug_assert!(keys.len() <= INTERNAL_NODE_MAX_KEYS);

        for (i, (&key, &child)) in keys.iter().zip(children).enumerate() {
            self.set_cell_child(i, child);
            self.set_key(i, key);
        }
        self.set_key_count(keys.len());
        if let Some(&right_child) = children.last() {
            self.set_right_child(right_child);
        }
    }
}

/// Errors that can occur when interpreting B-tree node pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The type tag is neither leaf nor internal; the page is corrupt.
    UnknownNodeType(u8),
    /// The page holds a different kind of node than the operation needs.
    WrongNodeType { expected: NodeType, found: NodeType },
    /// A child index past the rightmost child was requested.
    ChildOutOfRange { child_num: usize, key_count: usize },
    /// The stored cell or key count is impossible for the node type.
    InvalidCount { node_type: NodeType, count: usize },
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNodeType(tag) => write!(f, "unknown node type tag: 0x{tag:02x}"),
            Self::WrongNodeType { expected, found } => {
                write!(f, "wrong node type: expected {expected:?}, found {found:?}")
            }
            Self::ChildOutOfRange {
                child_num,
                key_count,
            } => write!(
                f,
                "tried to access child_num {child_num} > num_keys {key_count}"
            ),
            Self::InvalidCount { node_type, count } => {
                write!(f, "corrupt {node_type:?} node: invalid count {count}")
            }
        }
    }
}

impl std::error::Error for NodeError {}
