//! File-backed page cache.
//!
//! The database file is a plain concatenation of `PAGE_SIZE` pages, page 0
//! first. Pages are loaded lazily on first access and held in memory until
//! `sync` writes them back.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::storage::io::{Storage, StorageError};
use crate::storage::page::{PAGE_SIZE_U64, Page, PageId};

/// Default page limit, matching a 400KB table.
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// A database file handle with a page cache.
///
/// # Invariants
///
/// - `pages_on_disk <= total_pages <= max_pages`
/// - `cache.len() <= total_pages`
pub struct Pager {
    file: File,
    /// Cached pages, indexed by page ID. `None` means not yet loaded.
    cache: Vec<Option<Page>>,
    /// Number of whole pages present in the file when it was opened.
    pages_on_disk: u32,
    /// Number of pages ever allocated (on disk or in the cache).
    total_pages: u32,
    max_pages: u32,
}

impl Pager {
    /// Open the database file at `path`, creating it if it does not exist.
    ///
    /// Returns an error if the file length is not a whole number of pages or
    /// if the file already holds more than `max_pages` pages.
    pub fn open(path: &Path, max_pages: u32) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE_U64 != 0 {
            return Err(StorageError::Corruption(format!(
                "db file is not a whole number of pages ({file_length} bytes)"
            )));
        }

        let pages_on_disk = u32::try_from(file_length / PAGE_SIZE_U64).map_err(|_| {
            StorageError::Corruption(format!("db file too large ({file_length} bytes)"))
        })?;
        if pages_on_disk > max_pages {
            return Err(StorageError::Corruption(format!(
                "db file holds {pages_on_disk} pages, more than the limit of {max_pages}"
            )));
        }

        tracing::info!(
            "Opened {} ({pages_on_disk} pages, limit {max_pages})",
            path.display()
        );

        Ok(Self {
            file,
            cache: Vec::new(),
            pages_on_disk,
            total_pages: pages_on_disk,
            max_pages,
        })
    }

    /// Read a page from disk, or produce a zeroed page if it lies past the
    /// end of the file.
    fn load(&mut self, page_id: PageId) -> Result<Page, StorageError> {
        let mut page = Page::new();
        if page_id < self.pages_on_disk {
            self.file
                .seek(SeekFrom::Start(u64::from(page_id) * PAGE_SIZE_U64))?;
            self.file.read_exact(page.as_bytes_mut())?;
        }
        Ok(page)
    }
}

impl Storage for Pager {
    fn page(&mut self, page_id: PageId) -> Result<&mut Page, StorageError> {
        if page_id >= self.total_pages {
            return Err(StorageError::PageOutOfBounds {
                page_id,
                total_pages: self.total_pages,
            });
        }

        let index = page_id as usize;
        if self.cache.len() <= index {
            self.cache.resize_with(index + 1, || None);
        }
        if self.cache[index].is_none() {
            let page = self.load(page_id)?;
            self.cache[index] = Some(page);
        }

        self.cache[index]
            .as_mut()
            .ok_or(StorageError::PageOutOfBounds {
                page_id,
                total_pages: self.total_pages,
            })
    }

    fn allocate_page(&mut self) -> Result<PageId, StorageError> {
        if self.total_pages >= self.max_pages {
            return Err(StorageError::TableFull {
                max_pages: self.max_pages,
            });
        }
        let page_id = self.total_pages;
        self.total_pages += 1;
        Ok(page_id)
    }

    fn total_pages(&self) -> u32 {
        self.total_pages
    }

    fn max_pages(&self) -> Option<u32> {
        Some(self.max_pages)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        // Allocated pages that were never touched still occupy space on disk
        self.file
            .set_len(u64::from(self.total_pages) * PAGE_SIZE_U64)?;
        for (index, slot) in self.cache.iter().enumerate() {
            let Some(page) = slot else {
                continue;
            };
            self.file
                .seek(SeekFrom::Start(index as u64 * PAGE_SIZE_U64))?;
            self.file.write_all(page.as_bytes())?;
        }
        self.file.sync_all()?;
        self.pages_on_disk = self.total_pages;
        Ok(())
    }
}
