//! The fixed-width row record stored in leaf cells.
//!
//! Layout (291 bytes):
//! - `id`: 4 bytes, little-endian
//! - `username`: 32 bytes, zero-padded
//! - `email`: 255 bytes, zero-padded

use std::fmt;

/// Maximum username length in bytes.
pub const USERNAME_SIZE: usize = 32;
/// Maximum email length in bytes.
pub const EMAIL_SIZE: usize = 255;

const ID_SIZE: usize = 4;
const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Serialized size of a row in bytes.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single table record.
///
/// # Invariants
///
/// - String columns are stored zero-padded; the logical value ends at the
///   first NUL byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    username: [u8; USERNAME_SIZE],
    email: [u8; EMAIL_SIZE],
}

impl Row {
    /// Create a row, rejecting strings longer than their columns.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, RowError> {
        Ok(Self {
            id,
            username: pad_column("username", username)?,
            email: pad_column("email", email)?,
        })
    }

    /// The username column, up to the first NUL byte.
    #[must_use]
    pub fn username(&self) -> &str {
        column_str(&self.username)
    }

    /// The email column, up to the first NUL byte.
    #[must_use]
    pub fn email(&self) -> &str {
        column_str(&self.email)
    }

    /// Serialize the row into `dst`, which must be exactly `ROW_SIZE` bytes.
    pub fn serialize(&self, dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), ROW_SIZE);
        dst[ID_OFFSET..USERNAME_OFFSET].copy_from_slice(&self.id.to_le_bytes());
        dst[USERNAME_OFFSET..EMAIL_OFFSET].copy_from_slice(&self.username);
        dst[EMAIL_OFFSET..ROW_SIZE].copy_from_slice(&self.email);
    }

    /// Deserialize a row from `src`, which must be exactly `ROW_SIZE` bytes.
    #[must_use]
    pub fn deserialize(src: &[u8]) -> Self {
        debug_assert_eq!(src.len(), ROW_SIZE);
        let mut id = [0u8; ID_SIZE];
        id.copy_from_slice(&src[ID_OFFSET..USERNAME_OFFSET]);
        let mut username = [0u8; USERNAME_SIZE];
        username.copy_from_slice(&src[USERNAME_OFFSET..EMAIL_OFFSET]);
        let mut email = [0u8; EMAIL_SIZE];
        email.copy_from_slice(&src[EMAIL_OFFSET..ROW_SIZE]);

        Self {
            id: u32::from_le_bytes(id),
            username,
            email,
        }
    }
}

fn pad_column<const N: usize>(column: &'static str, value: &str) -> Result<[u8; N], RowError> {
    let bytes = value.as_bytes();
    if bytes.len() > N {
        return Err(RowError::StringTooLong {
            column,
            len: bytes.len(),
            max: N,
        });
    }
    let mut out = [0u8; N];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

fn column_str(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    // Columns are only ever filled from &str, but a corrupt page may not be UTF-8
    std::str::from_utf8(&bytes[..end]).unwrap_or("")
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.id)
            .field("username", &self.username())
            .field("email", &self.email())
            .finish()
    }
}

/// Errors that can occur when building a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// A string column value does not fit.
    StringTooLong {
        column: &'static str,
        len: usize,
        max: usize,
    },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringTooLong { column, len, max } => {
                write!(f, "{column} too long: {len} bytes (max {max})")
            }
        }
    }
}

impl std::error::Error for RowError {}
