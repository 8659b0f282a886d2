use super::helpers::TestDatabase;

#[test]
fn inserts_and_retrieves_a_row() {
    let db = TestDatabase::new();
    let output = db.run_script(&["insert 1 user1 person1@example.com", "select", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn select_on_empty_table_prints_nothing() {
    let db = TestDatabase::new();
    let output = db.run_script(&["select", ".exit"]);

    assert_eq!(output, vec!["db > Executed.", "db > "]);
}

#[test]
fn select_returns_rows_sorted_by_id() {
    let db = TestDatabase::new();
    let output = db.run_script(&[
        "insert 3 carol carol@example.com",
        "insert 1 alice alice@example.com",
        "insert 2 bob bob@example.com",
        "select",
    ]);

    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > Executed.",
            "db > Executed.",
            "db > (1, alice, alice@example.com)",
            "(2, bob, bob@example.com)",
            "(3, carol, carol@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn end_of_input_ends_the_session() {
    let db = TestDatabase::new();
    let output = db.run_script(&["insert 1 a b"]);

    assert_eq!(output, vec!["db > Executed.", "db > "]);
}

#[test]
fn blank_lines_are_ignored() {
    let db = TestDatabase::new();
    let output = db.run_script(&["", "   ", "select", ".exit"]);

    assert_eq!(output, vec!["db > db > db > Executed.", "db > "]);
}
