//! Line-oriented command interpreter over a `Table`.
//!
//! Each input line is either a meta-command (starting with `.`) or a
//! statement:
//!
//! - `insert <id> <username> <email>`
//! - `select`
//! - `.exit`, `.btree`, `.constants`
//!
//! User mistakes (bad syntax, duplicate ids, a full table) are reported on
//! the output and the session continues. Storage and I/O failures end it.

use std::io::{BufRead, Write};

use crate::storage::btree::BTreeError;
use crate::storage::btree::layout::{
    COMMON_NODE_HEADER_SIZE, INTERNAL_NODE_MAX_KEYS, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_SPACE_FOR_CELLS,
};
use crate::storage::{Storage, StorageError};
use crate::table::Table;
use crate::types::{ROW_SIZE, Row, RowError};

/// Printed before each input line.
pub const PROMPT: &str = "db > ";

/// A parsed meta-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    BTree,
    Constants,
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Whether the session should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Parse a line starting with `.`.
pub fn parse_meta_command(input: &str) -> Result<MetaCommand, ReplError> {
    match input {
        ".exit" => Ok(MetaCommand::Exit),
        ".btree" => Ok(MetaCommand::BTree),
        ".constants" => Ok(MetaCommand::Constants),
        _ => Err(ReplError::UnrecognizedCommand(input.to_string())),
    }
}

/// Parse a statement line.
pub fn prepare_statement(input: &str) -> Result<Statement, ReplError> {
    let mut tokens = input.split_whitespace();

    match tokens.next() {
        Some("insert") => prepare_insert(&tokens.collect::<Vec<_>>()),
        Some("select") => {
            if tokens.next().is_some() {
                return Err(ReplError::SyntaxError);
            }
            Ok(Statement::Select)
        }
        _ => Err(ReplError::UnrecognizedKeyword(input.to_string())),
    }
}

fn prepare_insert(args: &[&str]) -> Result<Statement, ReplError> {
    let [id, username, email] = args else {
        return Err(ReplError::SyntaxError);
    };

    let id: i64 = id.parse().map_err(|_| ReplError::SyntaxError)?;
    if id < 0 {
        return Err(ReplError::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| ReplError::SyntaxError)?;

    Ok(Statement::Insert(Row::new(id, username, email)?))
}

/// An interactive session over one table.
pub struct Repl<S: Storage> {
    table: Table<S>,
}

impl<S: Storage> Repl<S> {
    #[must_use]
    pub const fn new(table: Table<S>) -> Self {
        Self { table }
    }

    /// Read lines from `input` until `.exit` or end of input, writing all
    /// results to `output`, then close the table.
    ///
    /// # Errors
    ///
    /// Returns the first storage or I/O error. User errors are written to
    /// `output` and do not stop the session.
    pub fn run(mut self, mut input: impl BufRead, output: &mut impl Write) -> Result<(), ReplError> {
        let mut line = String::new();

        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }

            match self.execute_line(line.trim(), output) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => writeln!(output, "{e}")?,
            }
        }

        self.table.close()?;
        Ok(())
    }

    /// Execute a single line.
    ///
    /// # Errors
    ///
    /// Returns user errors for the caller to report, or a fatal error.
    pub fn execute_line(&mut self, line: &str, output: &mut impl Write) -> Result<Flow, ReplError> {
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        if line.starts_with('.') {
            let command = parse_meta_command(line)?;
            return self.execute_meta_command(command, output);
        }

        let statement = prepare_statement(line)?;
        self.execute_statement(statement, output)?;
        writeln!(output, "Executed.")?;
        Ok(Flow::Continue)
    }

    fn execute_meta_command(
        &mut self,
        command: MetaCommand,
        output: &mut impl Write,
    ) -> Result<Flow, ReplError> {
        match command {
            MetaCommand::Exit => return Ok(Flow::Exit),
            MetaCommand::BTree => {
                writeln!(output, "Tree:")?;
                writeln!(output, "{}", self.table.render_tree()?)?;
            }
            MetaCommand::Constants => {
                writeln!(output, "Constants:")?;
                print_constants(output)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn execute_statement(
        &mut self,
        statement: Statement,
        output: &mut impl Write,
    ) -> Result<(), ReplError> {
        match statement {
            Statement::Insert(row) => {
                if let Err(e) = self.table.insert(&row) {
                    tracing::warn!("Rejected insert of id {}: {e}", row.id);
                    return Err(e.into());
                }
            }
            Statement::Select => {
                let mut rows = self.table.scan()?;
                while let Some((_, row)) = rows.next_entry()? {
                    writeln!(output, "{row}")?;
                }
            }
        }
        Ok(())
    }
}

fn print_constants(output: &mut impl Write) -> std::io::Result<()> {
    writeln!(output, "ROW_SIZE: {ROW_SIZE}")?;
    writeln!(output, "COMMON_NODE_HEADER_SIZE: {COMMON_NODE_HEADER_SIZE}")?;
    writeln!(output, "LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}")?;
    writeln!(output, "LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}")?;
    writeln!(output, "LEAF_NODE_SPACE_FOR_CELLS: {LEAF_NODE_SPACE_FOR_CELLS}")?;
    writeln!(output, "LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}")?;
    writeln!(output, "INTERNAL_NODE_MAX_KEYS: {INTERNAL_NODE_MAX_KEYS}")
}

/// Errors from parsing or executing a line.
#[derive(Debug)]
pub enum ReplError {
    SyntaxError,
    NegativeId,
    StringTooLong,
    UnrecognizedKeyword(String),
    UnrecognizedCommand(String),
    DuplicateKey,
    TableFull,
    /// The table failed in a way the session cannot recover from.
    Table(BTreeError),
    /// Reading input or writing output failed.
    Io(std::io::Error),
}

impl ReplError {
    /// Whether the session must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Table(_) | Self::Io(_))
    }
}

impl std::fmt::Display for ReplError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SyntaxError => write!(f, "Syntax error. Could not parse statement."),
            Self::NegativeId => write!(f, "ID must be positive."),
            Self::StringTooLong => write!(f, "String is too long."),
            Self::UnrecognizedKeyword(input) => {
                write!(f, "Unrecognized keyword at start of '{input}'.")
            }
            Self::UnrecognizedCommand(input) => write!(f, "Unrecognized command '{input}'"),
            Self::DuplicateKey => write!(f, "Error: Duplicate key."),
            Self::TableFull => write!(f, "Error: Table full."),
            Self::Table(e) => write!(f, "Error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ReplError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Table(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BTreeError> for ReplError {
    fn from(e: BTreeError) -> Self {
        match e {
            BTreeError::DuplicateKey(_) => Self::DuplicateKey,
            BTreeError::Storage(StorageError::TableFull { .. }) => Self::TableFull,
            e => Self::Table(e),
        }
    }
}

impl From<RowError> for ReplError {
    fn from(e: RowError) -> Self {
        match e {
            RowError::StringTooLong { .. } => Self::StringTooLong,
        }
    }
}

impl From<std::io::Error> for ReplError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
