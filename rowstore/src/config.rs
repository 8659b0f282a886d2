//! Store configuration module.
//!
//! This module provides configuration loading for the rowstore binary from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `ROWSTORE_DATABASE_PATH`: Path of the database file (default: `./rowstore.db`)
//! - `ROWSTORE_MAX_PAGES`: Maximum number of pages the file may grow to (default: `100`)
//!
//! # Invariants
//!
//! - `database_path` is always a valid path (may not exist yet)
//! - `max_pages` is always at least 1

use std::path::PathBuf;

use crate::storage::DEFAULT_MAX_PAGES;

const DATABASE_PATH_VAR: &str = "ROWSTORE_DATABASE_PATH";
const MAX_PAGES_VAR: &str = "ROWSTORE_MAX_PAGES";

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file. Created on first open.
    pub database_path: PathBuf,
    /// Page limit; inserts that need more pages fail with "table full".
    pub max_pages: u32,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(Self::DEFAULT_DATABASE_PATH),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl StoreConfig {
    /// Default database file.
    pub const DEFAULT_DATABASE_PATH: &'static str = "./rowstore.db";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `ROWSTORE_MAX_PAGES` is set but is not a positive
    /// integer that fits in a `u32`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of an
    /// environment variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_path = lookup(DATABASE_PATH_VAR)
            .map_or_else(|| PathBuf::from(Self::DEFAULT_DATABASE_PATH), PathBuf::from);
        let max_pages = lookup(MAX_PAGES_VAR)
            .map_or(Ok(DEFAULT_MAX_PAGES), |value| parse_max_pages(&value))?;

        Ok(Self {
            database_path,
            max_pages,
        })
    }

    /// Replace the database path, as given on the command line.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

fn parse_max_pages(value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(max_pages) if max_pages > 0 => Ok(max_pages),
        _ => Err(ConfigError::InvalidValue {
            name: MAX_PAGES_VAR.to_string(),
            message: format!("'{value}' is not a valid page count (must be 1-{})", u32::MAX),
        }),
    }
}
