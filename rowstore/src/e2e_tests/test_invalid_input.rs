use super::helpers::TestDatabase;

#[test]
fn prints_error_for_negative_id() {
    let db = TestDatabase::new();
    let output = db.run_script(&["insert -1 cstack foo@bar.com", "select", ".exit"]);

    assert_eq!(
        output,
        vec!["db > ID must be positive.", "db > Executed.", "db > "]
    );
}

#[test]
fn prints_syntax_errors() {
    let db = TestDatabase::new();
    let output = db.run_script(&[
        "insert",
        "insert 1 only-a-name",
        "insert x name email",
        "select *",
        ".exit",
    ]);

    let message = "Syntax error. Could not parse statement.";
    assert_eq!(
        output,
        vec![
            format!("db > {message}"),
            format!("db > {message}"),
            format!("db > {message}"),
            format!("db > {message}"),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn prints_unrecognized_keyword() {
    let db = TestDatabase::new();
    let output = db.run_script(&["delete 1", ".exit"]);

    assert_eq!(
        output,
        vec!["db > Unrecognized keyword at start of 'delete 1'.", "db > "]
    );
}

#[test]
fn prints_unrecognized_meta_command() {
    let db = TestDatabase::new();
    let output = db.run_script(&[".tables", ".exit"]);

    assert_eq!(output, vec!["db > Unrecognized command '.tables'", "db > "]);
}

#[test]
fn errors_do_not_end_the_session() {
    let db = TestDatabase::new();
    let output = db.run_script(&["bogus", "insert 1 a b", "select"]);

    assert_eq!(
        output,
        vec![
            "db > Unrecognized keyword at start of 'bogus'.",
            "db > Executed.",
            "db > (1, a, b)",
            "Executed.",
            "db > ",
        ]
    );
}
