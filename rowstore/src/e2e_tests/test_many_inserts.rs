use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::helpers::{TestDatabase, insert_statement, row_line};
use crate::storage::btree::layout::{INTERNAL_NODE_MAX_KEYS, LEAF_NODE_LEFT_SPLIT_COUNT};

fn select_rows(output: &[String]) -> Vec<String> {
    output
        .iter()
        .map(|line| line.trim_start_matches("db > "))
        .filter(|line| line.starts_with('('))
        .map(str::to_string)
        .collect()
}

#[test]
fn shuffled_inserts_come_back_sorted() {
    let db = TestDatabase::new();
    let mut ids: Vec<u32> = (1..=500).collect();
    ids.shuffle(&mut StdRng::seed_from_u64(2024));

    let script: Vec<String> = ids.into_iter().map(insert_statement).collect();
    let mut script: Vec<&str> = script.iter().map(String::as_str).collect();
    script.push("select");
    let output = db.run_script(&script);

    assert!(output[..500].iter().all(|line| line == "db > Executed."));
    assert_eq!(
        select_rows(&output),
        (1..=500).map(row_line).collect::<Vec<_>>()
    );
}

#[test]
fn inserts_past_an_internal_node_split() {
    let db = TestDatabase::with_max_pages(1_000);

    // Enough ascending rows to overflow the root's children list
    let count = ((INTERNAL_NODE_MAX_KEYS + 2) * LEAF_NODE_LEFT_SPLIT_COUNT) as u32 + 100;
    let script: Vec<String> = (1..=count).map(insert_statement).collect();
    let script: Vec<&str> = script.iter().map(String::as_str).collect();
    let output = db.run_script(&script);
    assert!(output[..count as usize].iter().all(|line| line == "db > Executed."));

    let output = db.run_script(&[".btree"]);
    assert_eq!(output[1], "- internal (size 1)");
    assert!(output[2].starts_with("  - internal (size "));

    let output = db.run_script(&["select"]);
    assert_eq!(
        select_rows(&output),
        (1..=count).map(row_line).collect::<Vec<_>>()
    );
}
