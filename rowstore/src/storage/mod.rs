//! Paged storage for a single table.
//!
//! # File Format
//!
//! The table is stored in a single file of 4KB pages with no file header:
//!
//! - Page 0: the B-tree root (a leaf until the first split, internal after)
//! - Pages 1-N: other B-tree nodes, in allocation order
//!
//! Pages are never freed, so the file only grows.
//!
//! # Usage
//!
//! ```ignore
//! use rowstore::storage::{Pager, Storage};
//!
//! let mut pager = Pager::open(path, 100)?;
//! let page_id = pager.allocate_page()?;
//! pager.page(page_id)?.write_bytes(0, b"hello");
//! pager.sync()?;
//! ```

pub mod btree;
mod io;
mod memory;
mod page;
mod pager;

pub use io::{Storage, StorageError};
pub use memory::MemoryStorage;
pub use page::{PAGE_SIZE, Page, PageId};
pub use pager::{DEFAULT_MAX_PAGES, Pager};
