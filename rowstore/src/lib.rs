// Life of a line:
// 1. The REPL reads a line and parses it into a meta-command or statement
// 2. Statements run against the table:
//     - insert: find the leaf position, insert or split
//     - select: walk the leaves left to right
// 3. Results and user errors are written back; storage errors end the session
//
// System components:
//  - Pager: file of fixed-size pages, loaded lazily
//  - B-tree: leaf and internal node views over pages
//  - Table: the tree rooted at page 0

pub mod config;
mod e2e_tests;
pub mod repl;
pub mod storage;
pub mod table;
pub mod types;
