//! Common helpers for end-to-end tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::repl::Repl;
use crate::storage::{DEFAULT_MAX_PAGES, Pager};
use crate::table::Table;

/// A database file in its own temporary directory, removed on drop.
pub struct TestDatabase {
    _dir: TempDir,
    path: PathBuf,
    max_pages: u32,
}

impl TestDatabase {
    /// Create a test database with the default page limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_pages(DEFAULT_MAX_PAGES)
    }

    /// Create a test database that may not grow past `max_pages` pages.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_max_pages(max_pages: u32) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        Self {
            _dir: dir,
            path,
            max_pages,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one session over the database, feeding it `commands` one per
    /// line, and return its output split into lines.
    ///
    /// The session ends at `.exit` or when the commands run out; either way
    /// the table is closed and synced.
    #[allow(clippy::expect_used)]
    pub fn run_script(&self, commands: &[&str]) -> Vec<String> {
        let pager = Pager::open(&self.path, self.max_pages).expect("Failed to open pager");
        let table = Table::open(pager).expect("Failed to open table");

        let mut input = commands.join("\n");
        input.push('\n');
        let mut output = Vec::new();
        Repl::new(table)
            .run(input.as_bytes(), &mut output)
            .expect("Session failed");

        String::from_utf8(output)
            .expect("Output is not UTF-8")
            .split('\n')
            .map(str::to_string)
            .collect()
    }
}

/// The insert statement for a generated row.
#[must_use]
pub fn insert_statement(id: u32) -> String {
    format!("insert {id} user{id} person{id}@example.com")
}

/// The `select` output line for a generated row.
#[must_use]
pub fn row_line(id: u32) -> String {
    format!("({id}, user{id}, person{id}@example.com)")
}
