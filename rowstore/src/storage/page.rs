//! Page buffer and constants for the storage engine.
//!
//! The storage engine uses 4KB pages as the fundamental unit of I/O and
//! allocation. Every integer stored in a page is little-endian.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Page size as u64 for file offset calculations.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// A page identifier (0-indexed page number).
pub type PageId = u32;

/// A raw page buffer.
///
/// All accessors are bounds-checked against `PAGE_SIZE`; an offset past the
/// end of the page is a programming error and panics.
#[derive(Clone)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Create a new zeroed page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Get the raw page data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Get mutable access to the raw page data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Overwrite this page with the full contents of another page.
    pub fn copy_from(&mut self, other: &Self) {
        self.data.copy_from_slice(other.as_bytes());
    }

    /// Read bytes at a specific offset.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Mutable view of bytes at a specific offset.
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.data[offset..offset + len]
    }

    /// Write bytes at a specific offset.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Copy `len` bytes from `src` to `dst` within the page. The ranges may overlap.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.data.copy_within(src..src + len, dst);
    }

    /// Read a u8 at the given offset.
    #[must_use]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    /// Write a u8 at the given offset.
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Read a u32 (little-endian) at the given offset.
    #[must_use]
    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Write a u32 (little-endian) at the given offset.
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("first_16_bytes", &&self.data[..16])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_read_write() {
        let mut page = Page::new();

        page.write_u8(0, 0xFF);
        assert_eq!(page.read_u8(0), 0xFF);

        page.write_u32(100, 0x1234_5678);
        assert_eq!(page.read_u32(100), 0x1234_5678);
        assert_eq!(page.read_bytes(100, 4), &[0x78, 0x56, 0x34, 0x12]);

        page.write_bytes(500, b"hello");
        assert_eq!(page.read_bytes(500, 5), b"hello");
    }

    #[test]
    fn test_copy_within_overlapping() {
        let mut page = Page::new();
        page.write_bytes(10, &[1, 2, 3, 4]);

        // Shift right by two, overlapping the source range
        page.copy_within(10, 12, 4);
        assert_eq!(page.read_bytes(10, 6), &[1, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn test_copy_from_replaces_contents() {
        let mut a = Page::new();
        a.write_u32(0, 7);
        a.write_u32(PAGE_SIZE - 4, 9);

        let mut b = Page::new();
        b.write_u8(42, 1);
        b.copy_from(&a);

        assert_eq!(b.read_u32(0), 7);
        assert_eq!(b.read_u32(PAGE_SIZE - 4), 9);
        assert_eq!(b.read_u8(42), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_read_past_end_panics() {
        let page = Page::new();
        let _ = page.read_bytes(PAGE_SIZE - 2, 4);
    }
}
