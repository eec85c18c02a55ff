use nestedset_core::{
    BulkItem, Filter, MemoryNodeStore, NestedSetTree, NodeStore, Position, TreeConfig,
};
use nestedset_sqlite::{open_forest, SqliteNodeStore};
use nestedset_test_support::{base_data, expected, got, init_tracing, item, key_of, UNCHANGED};

#[test]
fn forest_survives_reopening_the_database() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.sqlite3");
    let path = path.to_str().unwrap();

    {
        let mut tree = open_forest(path, TreeConfig::default()).unwrap();
        tree.load_bulk(&base_data(), None, false).unwrap();
        assert_eq!(got(&tree), expected(UNCHANGED));
    }

    let mut tree = open_forest(path, TreeConfig::default()).unwrap();
    assert_eq!(got(&tree), expected(UNCHANGED));

    tree.move_node(
        key_of(&tree, "41"),
        key_of(&tree, "1"),
        Some(Position::FirstChild),
    )
    .unwrap();
    drop(tree);

    let tree = open_forest(path, TreeConfig::default()).unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 1),
            ("41", 2, 0),
            ("2", 1, 4),
            ("21", 2, 0),
            ("22", 2, 0),
            ("23", 2, 1),
            ("231", 3, 0),
            ("24", 2, 0),
            ("3", 1, 0),
            ("4", 1, 0),
        ])
    );
}

fn reshape<S: NodeStore>(tree: &mut NestedSetTree<S>) -> Vec<BulkItem> {
    tree.load_bulk(&base_data(), None, false).unwrap();
    tree.move_node(key_of(tree, "2"), key_of(tree, "4"), Some(Position::FirstChild))
        .unwrap();
    tree.delete(&Filter::attr("desc", "22")).unwrap();
    tree.add_sibling(key_of(tree, "3"), Some(Position::Left), item("2.5").data)
        .unwrap();
    tree.dump_bulk(None, false).unwrap()
}

#[test]
fn memory_and_sqlite_stores_agree() {
    let mut memory = NestedSetTree::new(MemoryNodeStore::new());
    let mut sqlite = NestedSetTree::new(SqliteNodeStore::new_in_memory().unwrap());
    assert_eq!(reshape(&mut memory), reshape(&mut sqlite));
    assert_eq!(got(&memory), got(&sqlite));
}
