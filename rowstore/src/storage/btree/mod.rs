//! B-tree implementation for the table's primary index.
//!
//! # Structure
//!
//! The B-tree consists of:
//! - Internal nodes: store separator keys and child page pointers
//! - Leaf nodes: store key/row cells, singly linked left to right for scans
//!
//! Nodes are fixed layouts within a page (see `layout`); `node` provides
//! typed views over those layouts and `tree` implements search, insertion
//! and splitting on top of a `Storage`.
//!
//! # Usage
//!
//! ```
//! use rowstore::storage::MemoryStorage;
//! use rowstore::storage::btree::BTree;
//! use rowstore::types::Row;
//!
//! let mut storage = MemoryStorage::new();
//! let mut tree = BTree::create(&mut storage).unwrap();
//!
//! let row = Row::new(1, "alice", "alice@example.com").unwrap();
//! tree.insert(row.id, &row).unwrap();
//! assert_eq!(tree.get(1).unwrap(), Some(row));
//! ```

pub mod layout;
mod node;
mod tree;

pub use node::{InternalNode, LeafNode, Node, NodeError, NodeType, node_type};
pub use tree::{BTree, BTreeError, BTreeIterator, Cursor};
