//! A single table of rows, keyed by row id.
//!
//! The table owns its storage and keeps the B-tree root at page 0. It is the
//! only layer that knows which page is the root; everything below works in
//! terms of page numbers handed to it.

use crate::storage::btree::{BTree, BTreeError, BTreeIterator, Cursor, Node};
use crate::storage::{PageId, Storage, StorageError};
use crate::types::Row;

/// The root page never moves; root splits rewrite it in place.
const ROOT_PAGE: PageId = 0;

/// A table backed by `S`.
pub struct Table<S: Storage> {
    storage: S,
}

impl<S: Storage> Table<S> {
    /// Open a table over `storage`, initializing an empty root leaf if the
    /// storage has no pages yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the root page cannot be allocated, is not a valid
    /// node, or is not marked as the root.
    pub fn open(mut storage: S) -> Result<Self, BTreeError> {
        if storage.total_pages() == 0 {
            let tree = BTree::create(&mut storage)?;
            debug_assert_eq!(tree.root_page(), ROOT_PAGE);
            tracing::info!("Initialized new table");
        } else {
            let root = Node::from_page(&*storage.page(ROOT_PAGE)?)?;
            if !root.is_root() {
                tracing::error!("Page {ROOT_PAGE} is not marked as the root");
                return Err(StorageError::Corruption(format!(
                    "page {ROOT_PAGE} is not marked as the root"
                ))
                .into());
            }
            tracing::info!("Opened table with {} pages", storage.total_pages());
        }

        Ok(Self { storage })
    }

    fn tree(&mut self) -> BTree<'_, S> {
        BTree::open(&mut self.storage, ROOT_PAGE)
    }

    /// Find the leaf position of `key`.
    pub fn find(&mut self, key: u32) -> Result<Cursor, BTreeError> {
        self.tree().find(key)
    }

    /// Insert a row under its id.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if a row with the same id exists, or a storage
    /// error (including `TableFull`) if a split could not allocate pages. The
    /// table is unchanged on error.
    pub fn insert(&mut self, row: &Row) -> Result<(), BTreeError> {
        self.tree().insert(row.id, row)
    }

    /// Look up a row by id.
    pub fn get(&mut self, key: u32) -> Result<Option<Row>, BTreeError> {
        self.tree().get(key)
    }

    /// Iterate over all rows in ascending id order.
    pub fn scan(&mut self) -> Result<BTreeIterator<'_, S>, BTreeError> {
        self.tree().scan()
    }

    /// Render the tree structure, one node or key per line.
    pub fn render_tree(&mut self) -> Result<String, BTreeError> {
        self.tree().render()
    }

    /// Get a reference to the underlying storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Flush all pages to the backing storage.
    pub fn sync(&mut self) -> Result<(), BTreeError> {
        self.storage.sync()?;
        Ok(())
    }

    /// Flush all pages and release the table.
    pub fn close(mut self) -> Result<(), BTreeError> {
        self.sync()?;
        tracing::info!("Closed table with {} pages", self.storage.total_pages());
        Ok(())
    }
}
