use super::helpers::{TestDatabase, insert_statement, row_line};

#[test]
fn keeps_data_after_closing_connection() {
    let db = TestDatabase::new();

    let output = db.run_script(&["insert 1 user1 person1@example.com", ".exit"]);
    assert_eq!(output, vec!["db > Executed.", "db > "]);

    let output = db.run_script(&["select", ".exit"]);
    assert_eq!(
        output,
        vec!["db > (1, user1, person1@example.com)", "Executed.", "db > "]
    );
}

#[test]
fn keeps_split_tree_after_reopen() {
    let db = TestDatabase::new();

    let mut script: Vec<String> = (1..=30).rev().map(insert_statement).collect();
    script.push(".exit".to_string());
    let script: Vec<&str> = script.iter().map(String::as_str).collect();
    db.run_script(&script);

    let output = db.run_script(&["select", ".exit"]);
    let mut expected: Vec<String> = (1..=30).map(row_line).collect();
    expected[0] = format!("db > {}", expected[0]);
    expected.push("Executed.".to_string());
    expected.push("db > ".to_string());
    assert_eq!(output, expected);
}

#[test]
fn file_is_a_whole_number_of_pages() {
    let db = TestDatabase::new();
    db.run_script(&["insert 1 a b", ".exit"]);

    let len = std::fs::metadata(db.path()).expect("metadata").len();
    assert_eq!(len, crate::storage::PAGE_SIZE as u64);
}

#[test]
fn reopened_table_rejects_existing_ids() {
    let db = TestDatabase::new();
    db.run_script(&["insert 1 a b", ".exit"]);

    let output = db.run_script(&["insert 1 c d", "insert 2 c d", "select"]);
    assert_eq!(
        output,
        vec![
            "db > Error: Duplicate key.",
            "db > Executed.",
            "db > (1, a, b)",
            "(2, c, d)",
            "Executed.",
            "db > ",
        ]
    );
}
