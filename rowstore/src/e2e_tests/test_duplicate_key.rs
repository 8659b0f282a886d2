use super::helpers::TestDatabase;

#[test]
fn prints_error_for_duplicate_id() {
    let db = TestDatabase::new();
    let output = db.run_script(&[
        "insert 1 user1 person1@example.com",
        "insert 1 user1 person1@example.com",
        "select",
        ".exit",
    ]);

    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > Error: Duplicate key.",
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn duplicate_keeps_original_row() {
    let db = TestDatabase::new();
    let output = db.run_script(&["insert 7 first a@b.c", "insert 7 second d@e.f", "select"]);

    assert_eq!(output[2], "db > (7, first, a@b.c)");
}
