//! Storage abstraction between the B-tree and its page source.
//!
//! The B-tree only needs two things from storage: resolve a page number to a
//! mutable buffer, and hand out fresh page numbers. The `Storage` trait
//! captures exactly that (plus `sync`), allowing the system to use the
//! file-backed `Pager` in production and `MemoryStorage` in tests.
//!
//! # Invariants
//!
//! - Page numbers returned by `allocate_page` are strictly increasing and
//!   never reused.
//! - `page` only resolves page numbers below `total_pages`.
//! - A freshly allocated page reads as all zeros.

use crate::storage::page::{Page, PageId};

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// Page was never allocated.
    PageOutOfBounds { page_id: PageId, total_pages: u32 },
    /// The page limit has been reached; no more pages can be allocated.
    TableFull { max_pages: u32 },
    /// Corruption detected in the backing file.
    Corruption(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::PageOutOfBounds {
                page_id,
                total_pages,
            } => write!(
                f,
                "page {page_id} out of bounds (total pages: {total_pages})"
            ),
            Self::TableFull { max_pages } => {
                write!(f, "table full: page limit of {max_pages} reached")
            }
            Self::Corruption(msg) => write!(f, "corruption: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Abstraction over page-based storage operations.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `page` returns the last written content for a page
/// - `allocate_page` returns the current `total_pages` and then increments it
/// - `sync` makes all previous writes durable
pub trait Storage {
    /// Resolve an allocated page to its in-memory buffer.
    ///
    /// The borrow lasts for one call site only; callers re-resolve page
    /// numbers rather than holding buffers across operations.
    fn page(&mut self, page_id: PageId) -> Result<&mut Page, StorageError>;

    /// Allocate a new zeroed page at the end of storage.
    ///
    /// Returns the page ID of the allocated page.
    fn allocate_page(&mut self) -> Result<PageId, StorageError>;

    /// Get the total number of pages ever allocated.
    fn total_pages(&self) -> u32;

    /// The page count `allocate_page` refuses to grow past, if any.
    fn max_pages(&self) -> Option<u32>;

    /// Persist all pending writes to durable storage.
    fn sync(&mut self) -> Result<(), StorageError>;
}
