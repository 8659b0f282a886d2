//! Byte layout of B-tree nodes within a page.
//!
//! Every offset here is a compile-time constant derived from `PAGE_SIZE` and
//! `ROW_SIZE`. No validation happens at this level; callers pass indices
//! that are in range for the node they are looking at.
//!
//! ```text
//! Common header (6 bytes):
//! +-----------+---------+-------------------+
//! | node_type | is_root | parent (u32)      |
//! +-----------+---------+-------------------+
//!
//! Leaf header (14 bytes): common + cell_count (u32) + next_leaf (u32)
//! Leaf cell:              key (u32) + row (ROW_SIZE bytes)
//!
//! Internal header (14 bytes): common + key_count (u32) + right_child (u32)
//! Internal cell:              child (u32) + key (u32)
//! ```

use crate::storage::page::PAGE_SIZE;
use crate::types::ROW_SIZE;

// Common node header
pub const NODE_TYPE_SIZE: usize = 1;
pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_SIZE: usize = 1;
pub const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const PARENT_POINTER_SIZE: usize = 4;
pub const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// Leaf node header
pub const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// Leaf node body
pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_KEY_OFFSET: usize = 0;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_VALUE_OFFSET: usize = LEAF_NODE_KEY_OFFSET + LEAF_NODE_KEY_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
/// Space left over that cannot hold a whole cell is unused; cells never span pages.
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// Cells moved to the new right leaf when a full leaf takes one more cell.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
/// Cells kept in the old left leaf. Gets the extra cell when the total is odd.
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal node header
pub const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// Internal node body
pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;
pub const INTERNAL_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_MAX_KEYS: usize = INTERNAL_NODE_SPACE_FOR_CELLS / INTERNAL_NODE_CELL_SIZE;

/// Children moved to the new right node when a full internal node takes one
/// more child. Mirrors the leaf rule: the extra child stays on the left.
pub const INTERNAL_NODE_RIGHT_SPLIT_COUNT: usize = (INTERNAL_NODE_MAX_KEYS + 2) / 2;
/// Children kept in the old left node.
pub const INTERNAL_NODE_LEFT_SPLIT_COUNT: usize =
    (INTERNAL_NODE_MAX_KEYS + 2) - INTERNAL_NODE_RIGHT_SPLIT_COUNT;

/// Byte offset of leaf cell `cell_num`.
#[must_use]
pub const fn leaf_node_cell_offset(cell_num: usize) -> usize {
    LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
}

/// Byte offset of the key in leaf cell `cell_num`.
#[must_use]
pub const fn leaf_node_key_offset(cell_num: usize) -> usize {
    leaf_node_cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET
}

/// Byte offset of the value in leaf cell `cell_num`.
#[must_use]
pub const fn leaf_node_value_offset(cell_num: usize) -> usize {
    leaf_node_cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET
}

/// Byte offset of internal cell `cell_num`.
#[must_use]
pub const fn internal_node_cell_offset(cell_num: usize) -> usize {
    INTERNAL_NODE_HEADER_SIZE + cell_num * INTERNAL_NODE_CELL_SIZE
}

/// Byte offset of the child pointer in internal cell `cell_num`.
#[must_use]
pub const fn internal_node_child_offset(cell_num: usize) -> usize {
    internal_node_cell_offset(cell_num)
}

/// Byte offset of the separator key in internal cell `cell_num`.
#[must_use]
pub const fn internal_node_key_offset(cell_num: usize) -> usize {
    internal_node_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE
}

const _: () = assert!(LEAF_NODE_MAX_CELLS >= 2, "a leaf must hold at least two cells");
const _: () = assert!(
    leaf_node_cell_offset(LEAF_NODE_MAX_CELLS) <= PAGE_SIZE,
    "leaf cells overflow the page"
);
const _: () = assert!(
    internal_node_cell_offset(INTERNAL_NODE_MAX_KEYS) <= PAGE_SIZE,
    "internal cells overflow the page"
);
