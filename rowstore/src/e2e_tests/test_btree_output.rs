use super::helpers::{TestDatabase, insert_statement};

fn insert_script(ids: impl Iterator<Item = u32>) -> Vec<String> {
    ids.map(insert_statement).collect()
}

#[test]
fn prints_one_node_btree() {
    let db = TestDatabase::new();
    let output = db.run_script(&["insert 3 a b", "insert 1 a b", "insert 2 a b", ".btree", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > Executed.",
            "db > Executed.",
            "db > Executed.",
            "db > Tree:",
            "- leaf (size 3)",
            "  - 1",
            "  - 2",
            "  - 3",
            "db > ",
        ]
    );
}

#[test]
fn prints_two_leaf_btree_after_first_split() {
    let db = TestDatabase::new();
    let script = insert_script(1..=14);
    let mut script: Vec<&str> = script.iter().map(String::as_str).collect();
    script.push(".btree");
    script.push(".exit");
    let output = db.run_script(&script);

    let mut expected = vec!["db > Tree:".to_string(), "- internal (size 1)".to_string()];
    expected.push("  - leaf (size 7)".to_string());
    expected.extend((1..=7).map(|k| format!("    - {k}")));
    expected.push("  - key 7".to_string());
    expected.push("  - leaf (size 7)".to_string());
    expected.extend((8..=14).map(|k| format!("    - {k}")));
    expected.push("db > ".to_string());

    assert_eq!(output[14..], expected[..]);
}

#[test]
fn prints_three_leaf_btree() {
    let db = TestDatabase::new();
    let script = insert_script(1..=21);
    let mut script: Vec<&str> = script.iter().map(String::as_str).collect();
    script.push(".btree");
    let output = db.run_script(&script);

    let mut expected = vec!["db > Tree:".to_string(), "- internal (size 2)".to_string()];
    for (leaf, keys) in [(1..=7), (8..=14), (15..=21)].into_iter().enumerate() {
        if leaf > 0 {
            expected.push(format!("  - key {}", leaf * 7));
        }
        expected.push("  - leaf (size 7)".to_string());
        expected.extend(keys.map(|k| format!("    - {k}")));
    }
    expected.push("db > ".to_string());

    assert_eq!(output[21..], expected[..]);
}

#[test]
fn btree_survives_reopen() {
    let db = TestDatabase::new();
    let script = insert_script((1..=14).rev());
    let script: Vec<&str> = script.iter().map(String::as_str).collect();
    db.run_script(&script);

    let before = db.run_script(&[".btree"]);
    let after = db.run_script(&[".btree"]);
    assert_eq!(before, after);
    assert_eq!(before[1], "- internal (size 1)");
}
