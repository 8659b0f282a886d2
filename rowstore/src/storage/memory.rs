//! In-memory storage.
//!
//! Keeps every page in a `Vec` and never touches the filesystem. Used for
//! ephemeral tables and for tests, where an optional page limit makes
//! allocation failures easy to provoke.

use crate::storage::io::{Storage, StorageError};
use crate::storage::page::{Page, PageId};

/// In-memory storage implementation.
///
/// # Invariants
///
/// - `pages.len() == total_pages()`
/// - `pages.len() <= max_pages` when a limit is set
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// Allocated pages, indexed by page ID.
    pages: Vec<Page>,
    /// Optional allocation limit.
    max_pages: Option<u32>,
}

impl MemoryStorage {
    /// Create an empty, unbounded storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages: Vec::new(),
            max_pages: None,
        }
    }

    /// Create an empty storage that refuses to grow past `max_pages` pages.
    #[must_use]
    pub const fn with_max_pages(max_pages: u32) -> Self {
        Self {
            pages: Vec::new(),
            max_pages: Some(max_pages),
        }
    }
}

impl Storage for MemoryStorage {
    fn page(&mut self, page_id: PageId) -> Result<&mut Page, StorageError> {
        let total_pages = self.total_pages();
        self.pages
            .get_mut(page_id as usize)
            .ok_or(StorageError::PageOutOfBounds {
                page_id,
                total_pages,
            })
    }

    fn allocate_page(&mut self) -> Result<PageId, StorageError> {
        let page_id = self.total_pages();
        if let Some(max_pages) = self.max_pages {
            if page_id >= max_pages {
                return Err(StorageError::TableFull { max_pages });
            }
        }
        self.pages.push(Page::new());
        Ok(page_id)
    }

    #[allow(clippy::cast_possible_truncation)] // allocate_page caps the count at u32
    fn total_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}
