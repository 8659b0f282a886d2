use super::helpers::TestDatabase;
use crate::types::{EMAIL_SIZE, USERNAME_SIZE};

#[test]
fn allows_strings_at_maximum_length() {
    let db = TestDatabase::new();
    let username = "a".repeat(USERNAME_SIZE);
    let email = "a".repeat(EMAIL_SIZE);
    let insert = format!("insert 1 {username} {email}");
    let output = db.run_script(&[insert.as_str(), "select", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            format!("db > (1, {username}, {email})"),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn prints_error_if_strings_are_too_long() {
    let db = TestDatabase::new();
    let username = "a".repeat(USERNAME_SIZE + 1);
    let email = "a".repeat(EMAIL_SIZE + 1);
    let long_username = format!("insert 1 {username} ok@example.com");
    let long_email = format!("insert 1 ok {email}");
    let output = db.run_script(&[long_username.as_str(), long_email.as_str(), "select", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > String is too long.",
            "db > String is too long.",
            "db > Executed.",
            "db > ",
        ]
    );
}
