//! End-to-end tests at the REPL session level.
//!
//! Each test file covers a specific scenario, feeding a script of input
//! lines through a session over a real database file and checking the exact
//! output, prompts included.

#![cfg(test)]

mod helpers;

mod test_btree_output;
mod test_constants;
mod test_duplicate_key;
mod test_insert_and_select;
mod test_invalid_input;
mod test_many_inserts;
mod test_persistence;
mod test_string_limits;
mod test_table_full;
