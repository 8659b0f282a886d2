use super::helpers::{TestDatabase, insert_statement};
use crate::storage::btree::layout::LEAF_NODE_MAX_CELLS;

#[test]
fn prints_error_when_table_is_full() {
    // A single page holds one leaf's worth of rows
    let db = TestDatabase::with_max_pages(1);

    let mut script: Vec<String> = (1..=LEAF_NODE_MAX_CELLS as u32 + 1)
        .map(insert_statement)
        .collect();
    script.push(".exit".to_string());
    let script: Vec<&str> = script.iter().map(String::as_str).collect();
    let output = db.run_script(&script);

    assert_eq!(output[LEAF_NODE_MAX_CELLS - 1], "db > Executed.");
    assert_eq!(output[LEAF_NODE_MAX_CELLS], "db > Error: Table full.");
    assert_eq!(output[LEAF_NODE_MAX_CELLS + 1], "db > ");
}

#[test]
fn full_table_still_serves_reads() {
    let db = TestDatabase::with_max_pages(3);

    // Three pages hold the first split; the second split cannot happen
    let script: Vec<String> = (1..=30).map(insert_statement).collect();
    let mut script: Vec<&str> = script.iter().map(String::as_str).collect();
    script.push("select");
    let output = db.run_script(&script);

    assert!(output.iter().any(|line| line == "db > Error: Table full."));
    let rows = output
        .iter()
        .filter(|line| line.trim_start_matches("db > ").starts_with('('))
        .count();
    assert_eq!(rows, 20, "two leaves of 7 and 13 rows");
}
