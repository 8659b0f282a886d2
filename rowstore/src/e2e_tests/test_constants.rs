use super::helpers::TestDatabase;

#[test]
fn prints_constants() {
    let db = TestDatabase::new();
    let output = db.run_script(&[".constants", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > Constants:",
            "ROW_SIZE: 291",
            "COMMON_NODE_HEADER_SIZE: 6",
            "LEAF_NODE_HEADER_SIZE: 14",
            "LEAF_NODE_CELL_SIZE: 295",
            "LEAF_NODE_SPACE_FOR_CELLS: 4082",
            "LEAF_NODE_MAX_CELLS: 13",
            "INTERNAL_NODE_MAX_KEYS: 510",
            "db > ",
        ]
    );
}
