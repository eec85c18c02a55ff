//! One function per behaviour; each takes a factory producing an empty store.

use nestedset_core::{
    BulkItem, Error, Field, Filter, Hierarchy, NestedSetTree, Node, NodeDraft, NodeKey,
    NodeStore, Payload, Position, TreeConfig, Update, Value,
};

use crate::{
    base_data, desc, expected, got, intervals, item, key_of, node_of, topology, with_ids,
    UNCHANGED,
};

fn loaded<S: NodeStore>(make: &impl Fn() -> S) -> NestedSetTree<S> {
    let mut tree = NestedSetTree::new(make());
    tree.load_bulk(&base_data(), None, false).expect("load base data");
    tree
}

fn ordered<S: NodeStore>(make: &impl Fn() -> S, keys: &[&str]) -> NestedSetTree<S> {
    NestedSetTree::with_config(make(), TreeConfig::new().order_by(keys.iter().copied()))
}

fn draft(value: &str) -> NodeDraft {
    NodeDraft::new(Payload::new().with("desc", value))
}

fn root_tree_ids<S: NodeStore>(tree: &NestedSetTree<S>) -> Vec<u64> {
    tree.root_nodes()
        .expect("roots")
        .iter()
        .map(|n| n.tree_id)
        .collect()
}

pub fn load_nested_data<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = NestedSetTree::new(make());
    let data = vec![
        item("1"),
        item("2").with_children(vec![item("21"), item("22")]),
    ];
    let keys = tree.load_bulk(&data, None, false).unwrap();
    assert_eq!(keys.len(), 4);
    assert_eq!(
        got(&tree),
        expected(&[("1", 1, 0), ("2", 1, 2), ("21", 2, 0), ("22", 2, 0)])
    );
}

pub fn load_base_data<S: NodeStore>(make: impl Fn() -> S) {
    let tree = loaded(&make);
    assert_eq!(got(&tree), expected(UNCHANGED));
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3, 4]);

    let two = node_of(&tree, "2");
    assert_eq!((two.lft, two.rgt), (1, 12));
}

pub fn empty_forest<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = NestedSetTree::new(make());
    assert!(tree.root_nodes().unwrap().is_empty());
    assert!(tree.first_root_node().unwrap().is_none());
    assert!(tree.last_root_node().unwrap().is_none());
    assert!(tree.tree(None).unwrap().is_empty());
    assert!(tree.dump_bulk(None, true).unwrap().is_empty());
    assert!(tree.load_bulk(&[], None, false).unwrap().is_empty());
    tree.validate_invariants().unwrap();
    assert!(matches!(tree.get(NodeKey(1)), Err(Error::NotFound(_))));
    assert_eq!(tree.delete(&Filter::all()).unwrap(), 0);
    assert!(matches!(
        tree.delete_node(NodeKey(1)),
        Err(Error::NotFound(_))
    ));

    let first = tree.add_root(draft("only")).unwrap();
    assert_eq!(
        (first.tree_id, first.lft, first.rgt, first.depth),
        (1, 1, 2, 1)
    );
}

pub fn delete_subtree_closes_gap<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let removed = tree.delete(&Filter::attr("desc", "23")).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 0),
            ("2", 1, 3),
            ("21", 2, 0),
            ("22", 2, 0),
            ("24", 2, 0),
            ("3", 1, 0),
            ("4", 1, 1),
            ("41", 2, 0),
        ])
    );
}

pub fn delete_collapses_nested_matches<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let nested = Filter::keys([
        key_of(&tree, "2"),
        key_of(&tree, "23"),
        key_of(&tree, "231"),
    ]);
    assert_eq!(tree.delete(&nested).unwrap(), 6);
    assert_eq!(
        got(&tree),
        expected(&[("1", 1, 0), ("3", 1, 0), ("4", 1, 1), ("41", 2, 0)])
    );

    let mut tree = loaded(&make);
    assert_eq!(tree.delete(&Filter::all().is(Field::Depth, 2)).unwrap(), 6);
    assert_eq!(
        got(&tree),
        expected(&[("1", 1, 0), ("2", 1, 0), ("3", 1, 0), ("4", 1, 0)])
    );
    assert_eq!(node_of(&tree, "2").rgt, 2);
}

pub fn delete_retires_tree_ids<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let one = key_of(&tree, "1");
    assert_eq!(tree.delete_node(one).unwrap(), 1);
    assert_eq!(root_tree_ids(&tree), vec![2, 3, 4]);

    let added = tree.add_root(draft("5")).unwrap();
    assert_eq!(added.tree_id, 5);
    tree.validate_invariants().unwrap();
}

pub fn add_sibling_placements<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let right = tree
        .add_sibling(key_of(&tree, "22"), Some(Position::Right), draft("22b"))
        .unwrap();
    assert_eq!((right.lft, right.depth), (6, 2));
    tree.add_sibling(
        key_of(&tree, "21"),
        Some(Position::FirstSibling),
        draft("20"),
    )
    .unwrap();
    tree.add_sibling(key_of(&tree, "231"), None, draft("232"))
        .unwrap();
    let middle = tree
        .add_sibling(key_of(&tree, "3"), Some(Position::Left), draft("2.5"))
        .unwrap();
    assert_eq!(middle.tree_id, 3);
    tree.add_sibling(
        key_of(&tree, "1"),
        Some(Position::LastSibling),
        draft("last"),
    )
    .unwrap();
    tree.add_sibling(key_of(&tree, "last"), Some(Position::Right), draft("end"))
        .unwrap();

    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 0),
            ("2", 1, 6),
            ("20", 2, 0),
            ("21", 2, 0),
            ("22", 2, 0),
            ("22b", 2, 0),
            ("23", 2, 2),
            ("231", 3, 0),
            ("232", 3, 0),
            ("24", 2, 0),
            ("2.5", 1, 0),
            ("3", 1, 0),
            ("4", 1, 1),
            ("41", 2, 0),
            ("last", 1, 0),
            ("end", 1, 0),
        ])
    );
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3, 4, 5, 6, 7]);
}

pub fn add_child_appends<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.add_child(key_of(&tree, "4"), draft("42")).unwrap();
    let leaf_child = tree.add_child(key_of(&tree, "1"), draft("11")).unwrap();
    assert_eq!((leaf_child.lft, leaf_child.rgt, leaf_child.depth), (2, 3, 2));
    let deep = tree
        .add_child(key_of(&tree, "231"), draft("2311"))
        .unwrap();
    assert_eq!(deep.depth, 4);

    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 1),
            ("11", 2, 0),
            ("2", 1, 4),
            ("21", 2, 0),
            ("22", 2, 0),
            ("23", 2, 1),
            ("231", 3, 1),
            ("2311", 4, 0),
            ("24", 2, 0),
            ("3", 1, 0),
            ("4", 1, 2),
            ("41", 2, 0),
            ("42", 2, 0),
        ])
    );

    assert!(matches!(
        tree.add_child(NodeKey(9_999), draft("orphan")),
        Err(Error::NotFound(_))
    ));
    let taken = key_of(&tree, "3");
    assert!(matches!(
        tree.add_child(taken, draft("dup").with_key(taken)),
        Err(Error::NodeAlreadySaved(key)) if key == taken
    ));
}

pub fn ordered_roots<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = ordered(&make, &["val1", "val2", "desc"]);
    for (val1, val2, text) in [(3, 3, "zxy"), (1, 4, "bcd"), (2, 5, "zxy")] {
        let payload = Payload::new()
            .with("val1", val1)
            .with("val2", val2)
            .with("desc", text);
        tree.add_root(payload).unwrap();
    }
    let roots: Vec<(String, Option<i64>)> = tree
        .root_nodes()
        .unwrap()
        .iter()
        .map(|n| (desc(n), n.get("val1").and_then(Value::as_i64)))
        .collect();
    assert_eq!(
        roots,
        vec![
            ("bcd".to_string(), Some(1)),
            ("zxy".to_string(), Some(2)),
            ("zxy".to_string(), Some(3)),
        ]
    );
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3]);
}

pub fn ordered_children_and_moves<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = ordered(&make, &["desc"]);
    let b = tree.add_root(draft("b")).unwrap().key;
    tree.add_child(b, draft("y")).unwrap();
    tree.add_child(b, draft("x")).unwrap();
    tree.add_child(b, draft("z")).unwrap();
    tree.add_sibling(key_of(&tree, "x"), None, draft("w"))
        .unwrap();
    let a = tree.add_root(draft("a")).unwrap().key;
    assert_eq!(
        got(&tree),
        expected(&[
            ("a", 1, 0),
            ("b", 1, 4),
            ("w", 2, 0),
            ("x", 2, 0),
            ("y", 2, 0),
            ("z", 2, 0),
        ])
    );

    tree.move_node(key_of(&tree, "z"), a, Some(Position::SortedChild))
        .unwrap();
    tree.move_node(key_of(&tree, "x"), a, Some(Position::SortedChild))
        .unwrap();
    tree.move_node(key_of(&tree, "y"), key_of(&tree, "w"), None)
        .unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("a", 1, 2),
            ("x", 2, 0),
            ("z", 2, 0),
            ("b", 1, 2),
            ("w", 2, 0),
            ("y", 2, 0),
        ])
    );
}

pub fn position_errors<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let before = intervals(&tree);
    let k21 = key_of(&tree, "21");
    let k22 = key_of(&tree, "22");

    assert!(matches!(
        tree.add_sibling(k22, Some(Position::SortedSibling), draft("s")),
        Err(Error::MissingNodeOrderBy(_))
    ));
    assert!(matches!(
        tree.add_sibling(k22, Some(Position::FirstChild), draft("c")),
        Err(Error::InvalidPosition(_))
    ));
    assert!(matches!(
        tree.move_node(k22, k21, Some(Position::SortedChild)),
        Err(Error::MissingNodeOrderBy(_))
    ));
    assert!(matches!(
        "middle".parse::<Position>(),
        Err(Error::InvalidPosition(_))
    ));
    assert_eq!(intervals(&tree), before);

    let mut sorted = ordered(&make, &["desc"]);
    let root = sorted.add_root(draft("r")).unwrap().key;
    let child = sorted.add_child(root, draft("c")).unwrap().key;
    assert!(matches!(
        sorted.add_sibling(child, Some(Position::Left), draft("l")),
        Err(Error::InvalidPosition(_))
    ));
    assert!(matches!(
        sorted.move_node(child, root, Some(Position::LastChild)),
        Err(Error::InvalidPosition(_))
    ));
}

pub fn move_left_of_self_is_noop<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let before = intervals(&tree);
    for (key, ..) in &before {
        tree.move_node(*key, *key, Some(Position::Left)).unwrap();
        assert_eq!(intervals(&tree), before);
    }
}

pub fn move_stationary_tokens<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let before = intervals(&tree);
    let k24 = key_of(&tree, "24");
    let k21 = key_of(&tree, "21");
    tree.move_node(k24, k24, Some(Position::Right)).unwrap();
    tree.move_node(k24, k24, Some(Position::LastSibling))
        .unwrap();
    tree.move_node(k21, k21, Some(Position::FirstSibling))
        .unwrap();
    assert_eq!(intervals(&tree), before);

    let k22 = key_of(&tree, "22");
    tree.move_node(k22, k22, Some(Position::LastSibling))
        .unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 0),
            ("2", 1, 4),
            ("21", 2, 0),
            ("23", 2, 1),
            ("231", 3, 0),
            ("24", 2, 0),
            ("22", 2, 0),
            ("3", 1, 0),
            ("4", 1, 1),
            ("41", 2, 0),
        ])
    );
}

pub fn move_into_leaf<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.move_node(
        key_of(&tree, "231"),
        key_of(&tree, "1"),
        Some(Position::LastChild),
    )
    .unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 1),
            ("231", 2, 0),
            ("2", 1, 4),
            ("21", 2, 0),
            ("22", 2, 0),
            ("23", 2, 0),
            ("24", 2, 0),
            ("3", 1, 0),
            ("4", 1, 1),
            ("41", 2, 0),
        ])
    );
    let moved = node_of(&tree, "231");
    assert_eq!((moved.tree_id, moved.lft, moved.rgt), (1, 2, 3));
}

pub fn move_subtree_across_trees<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.move_node(
        key_of(&tree, "2"),
        key_of(&tree, "4"),
        Some(Position::LastChild),
    )
    .unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 0),
            ("3", 1, 0),
            ("4", 1, 2),
            ("41", 2, 0),
            ("2", 2, 4),
            ("21", 3, 0),
            ("22", 3, 0),
            ("23", 3, 1),
            ("231", 4, 0),
            ("24", 3, 0),
        ])
    );

    let host = node_of(&tree, "4");
    let moved = node_of(&tree, "2");
    assert_eq!(moved.tree_id, host.tree_id);
    for member in tree.descendants(&moved).unwrap() {
        assert_eq!(member.tree_id, host.tree_id, "{} kept its old tree", desc(&member));
    }
    // The emptied tree's slot is reclaimed.
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3]);
}

pub fn move_node_to_root_level<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.move_node(
        key_of(&tree, "41"),
        key_of(&tree, "1"),
        Some(Position::Right),
    )
    .unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 0),
            ("41", 1, 0),
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
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3, 4, 5]);

    tree.move_node(
        key_of(&tree, "231"),
        key_of(&tree, "3"),
        Some(Position::LastSibling),
    )
    .unwrap();
    let roots: Vec<String> = tree.root_nodes().unwrap().iter().map(desc).collect();
    assert_eq!(roots, vec!["1", "41", "2", "3", "4", "231"]);
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3, 4, 5, 6]);
    tree.validate_invariants().unwrap();
}

pub fn move_root_first<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.move_node(
        key_of(&tree, "4"),
        key_of(&tree, "3"),
        Some(Position::FirstSibling),
    )
    .unwrap();
    let roots: Vec<String> = tree.root_nodes().unwrap().iter().map(desc).collect();
    assert_eq!(roots, vec!["4", "1", "2", "3"]);
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3, 4]);

    tree.move_node(
        key_of(&tree, "1"),
        key_of(&tree, "3"),
        Some(Position::LastSibling),
    )
    .unwrap();
    let roots: Vec<String> = tree.root_nodes().unwrap().iter().map(desc).collect();
    assert_eq!(roots, vec!["4", "2", "3", "1"]);
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3, 4]);
    assert_eq!(got(&tree)[0], ("4".to_string(), 1, 1));
}

pub fn move_to_descendant_fails<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let before = intervals(&tree);
    let k2 = key_of(&tree, "2");
    assert!(matches!(
        tree.move_node(k2, key_of(&tree, "231"), Some(Position::LastChild)),
        Err(Error::InvalidMoveToDescendant)
    ));
    assert!(matches!(
        tree.move_node(k2, key_of(&tree, "22"), Some(Position::Left)),
        Err(Error::InvalidMoveToDescendant)
    ));
    assert!(matches!(
        tree.move_node(k2, k2, Some(Position::FirstChild)),
        Err(Error::InvalidMoveToDescendant)
    ));
    assert_eq!(intervals(&tree), before);
}

pub fn move_between_siblings<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.move_node(
        key_of(&tree, "21"),
        key_of(&tree, "23"),
        Some(Position::Right),
    )
    .unwrap();
    tree.move_node(
        key_of(&tree, "24"),
        key_of(&tree, "22"),
        Some(Position::Left),
    )
    .unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 0),
            ("2", 1, 4),
            ("24", 2, 0),
            ("22", 2, 0),
            ("23", 2, 1),
            ("231", 3, 0),
            ("21", 2, 0),
            ("3", 1, 0),
            ("4", 1, 1),
            ("41", 2, 0),
        ])
    );
}

pub fn dump_round_trips_with_ids<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = NestedSetTree::new(make());
    let data = with_ids(base_data(), 100);
    let keys = tree.load_bulk(&data, None, true).unwrap();
    assert_eq!(keys.first(), Some(&NodeKey(100)));
    assert_eq!(keys.last(), Some(&NodeKey(109)));
    assert_eq!(tree.dump_bulk(None, true).unwrap(), data);
    assert_eq!(tree.dump_bulk(None, false).unwrap(), base_data());

    // Without kept ids the store assigns fresh keys.
    let parent = key_of(&tree, "3");
    let copied = tree.load_bulk(&base_data(), Some(parent), false).unwrap();
    assert!(copied.iter().all(|key| key.as_u64() > 109));
    assert_eq!(tree.get(parent).unwrap().descendant_count(), 10);
    tree.validate_invariants().unwrap();
}

pub fn dump_subtree_strips_reserved_fields<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let noisy = Payload::new()
        .with("desc", "noisy")
        .with("lft", 99)
        .with("tree_id", 7)
        .with("key", "shadow");
    tree.add_child(key_of(&tree, "23"), noisy).unwrap();

    let dumped = tree.dump_bulk(Some(key_of(&tree, "23")), false).unwrap();
    let expected_dump = vec![item("23").with_children(vec![item("231"), item("noisy")])];
    assert_eq!(dumped, expected_dump);

    let whole_two = tree.dump_bulk(Some(key_of(&tree, "2")), false).unwrap();
    assert_eq!(whole_two.len(), 1);
    assert_eq!(whole_two[0].children.len(), 4);
}

pub fn keep_ids_errors<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = NestedSetTree::new(make());
    assert!(matches!(
        tree.load_bulk(&[item("no id")], None, true),
        Err(Error::InvalidOperation(_))
    ));

    tree.load_bulk(&with_ids(base_data(), 100), None, true)
        .unwrap();
    let clash = vec![BulkItem::new(Payload::new().with("desc", "x")).with_id(NodeKey(100))];
    assert!(matches!(
        tree.load_bulk(&clash, None, true),
        Err(Error::NodeAlreadySaved(NodeKey(100)))
    ));
    assert!(matches!(
        tree.add_root(draft("again").with_key(NodeKey(105))),
        Err(Error::NodeAlreadySaved(NodeKey(105)))
    ));
    assert_eq!(got(&tree), expected(UNCHANGED));
}

pub fn failed_load_writes_nothing<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = NestedSetTree::new(make());
    tree.load_bulk(&[item("seed").with_id(NodeKey(1))], None, true).unwrap();
    let before = intervals(&tree);

    let clash = vec![item("a").with_id(NodeKey(50)), item("b").with_id(NodeKey(1))];
    assert!(matches!(
        tree.load_bulk(&clash, None, true),
        Err(Error::NodeAlreadySaved(NodeKey(1)))
    ));
    assert_eq!(intervals(&tree), before);

    let missing = vec![item("c").with_id(NodeKey(60)), item("no id")];
    assert!(matches!(
        tree.load_bulk(&missing, None, true),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(intervals(&tree), before);

    let repeated = vec![item("d")
        .with_id(NodeKey(70))
        .with_children(vec![item("e").with_id(NodeKey(70))])];
    assert!(matches!(
        tree.load_bulk(&repeated, None, true),
        Err(Error::NodeAlreadySaved(NodeKey(70)))
    ));
    assert_eq!(intervals(&tree), before);
}

pub fn reference_fields_resolve<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = NestedSetTree::with_config(make(), TreeConfig::new().reference("owner"));
    let owner = tree.load_bulk(&[item("owner")], None, false).unwrap()[0];

    let owned = BulkItem::new(
        Payload::new()
            .with("desc", "owned")
            .with("owner", Value::Int(owner.as_u64() as i64)),
    );
    let unowned = BulkItem::new(
        Payload::new()
            .with("desc", "unowned")
            .with("owner", Value::Null),
    );
    tree.load_bulk(&[owned, unowned], None, false).unwrap();
    assert_eq!(
        node_of(&tree, "owned").get("owner"),
        Some(&Value::Ref(owner))
    );
    assert_eq!(node_of(&tree, "unowned").get("owner"), Some(&Value::Null));

    let dangling = BulkItem::new(
        Payload::new()
            .with("desc", "dangling")
            .with("owner", Value::Int(9_999)),
    );
    assert!(matches!(
        tree.load_bulk(&[dangling], None, false),
        Err(Error::NotFound(_))
    ));
}

pub fn references_resolve_within_batch<S: NodeStore>(make: impl Fn() -> S) {
    let config = TreeConfig::new().reference("link");
    let mut tree = NestedSetTree::with_config(make(), config.clone());
    let linked = |desc: &str, id: u64, link: i64| {
        BulkItem::new(Payload::new().with("desc", desc).with("link", Value::Int(link)))
            .with_id(NodeKey(id))
    };
    let data = vec![
        item("a")
            .with_id(NodeKey(1))
            .with_children(vec![linked("a1", 2, 1)]),
        linked("b", 3, 2),
    ];
    tree.load_bulk(&data, None, true).unwrap();
    assert_eq!(node_of(&tree, "a1").get("link"), Some(&Value::Ref(NodeKey(1))));
    assert_eq!(node_of(&tree, "b").get("link"), Some(&Value::Ref(NodeKey(2))));

    let dumped = tree.dump_bulk(None, true).unwrap();
    let mut copy = NestedSetTree::with_config(make(), config);
    copy.load_bulk(&dumped, None, true).unwrap();
    assert_eq!(copy.dump_bulk(None, true).unwrap(), dumped);

    // Only items earlier in preorder count; a forward reference is still dangling.
    let before = intervals(&copy);
    let forward = vec![linked("c", 10, 11), item("d").with_id(NodeKey(11))];
    assert!(matches!(
        copy.load_bulk(&forward, None, true),
        Err(Error::NotFound(_))
    ));
    assert_eq!(intervals(&copy), before);
}

pub fn torn_anchor_is_rejected<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let k23 = key_of(&tree, "23");
    let k1 = key_of(&tree, "1");
    tree.store_mut()
        .bulk_update(&Filter::key(k23), &[Update::Set(Field::Lft, 40)])
        .unwrap();
    let before = intervals(&tree);

    assert!(matches!(
        tree.add_child(k23, draft("x")),
        Err(Error::InconsistentState(_))
    ));
    assert!(matches!(
        tree.add_sibling(k23, Some(Position::Right), draft("y")),
        Err(Error::InconsistentState(_))
    ));
    assert!(matches!(
        tree.move_node(k23, k1, Some(Position::LastChild)),
        Err(Error::InconsistentState(_))
    ));
    assert!(matches!(
        tree.move_node(k1, k23, Some(Position::Left)),
        Err(Error::InconsistentState(_))
    ));
    assert_eq!(intervals(&tree), before);
}

pub fn descendant_counts_match<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    tree.move_node(
        key_of(&tree, "23"),
        key_of(&tree, "41"),
        Some(Position::FirstChild),
    )
    .unwrap();
    for node in tree.tree(None).unwrap() {
        let descendants = tree.descendants(&node).unwrap();
        assert_eq!(node.descendant_count() as usize, descendants.len());
        let ancestors = tree.ancestors(&node).unwrap();
        assert_eq!(ancestors.len() as u64, node.depth - 1);
    }
}

pub fn navigation_queries<S: NodeStore>(make: impl Fn() -> S) {
    let tree = loaded(&make);
    let n23 = node_of(&tree, "23");
    let n2 = node_of(&tree, "2");
    let n21 = node_of(&tree, "21");

    assert_eq!(tree.parent(&n23).unwrap().map(|p| p.key), Some(n2.key));
    assert_eq!(tree.root(&n23).unwrap().key, n2.key);
    assert_eq!(tree.root(&n2).unwrap().key, n2.key);
    assert!(tree.parent(&n2).unwrap().is_none());
    let descs = |nodes: Vec<Node>| -> Vec<String> { nodes.iter().map(desc).collect() };
    let name = |node: Option<Node>| node.map(|n| desc(&n));

    let ancestors = descs(tree.ancestors(&node_of(&tree, "231")).unwrap());
    assert_eq!(ancestors, vec!["2", "23"]);

    let siblings = descs(tree.siblings(&n23).unwrap());
    assert_eq!(siblings, vec!["21", "22", "23", "24"]);
    let roots = descs(tree.siblings(&node_of(&tree, "3")).unwrap());
    assert_eq!(roots, vec!["1", "2", "3", "4"]);
    assert_eq!(name(tree.first_sibling(&n23).unwrap()).as_deref(), Some("21"));
    assert_eq!(name(tree.last_sibling(&n23).unwrap()).as_deref(), Some("24"));
    assert_eq!(name(tree.first_child(&n2).unwrap()).as_deref(), Some("21"));
    assert_eq!(name(tree.last_child(&n2).unwrap()).as_deref(), Some("24"));
    assert_eq!(name(tree.first_root_node().unwrap()).as_deref(), Some("1"));
    assert_eq!(name(tree.last_root_node().unwrap()).as_deref(), Some("4"));

    assert_eq!(descs(tree.tree(Some(&n23)).unwrap()), vec!["23", "231"]);
    assert!(tree.is_child_of(&n23, &n2).unwrap());
    assert!(!tree.is_child_of(&node_of(&tree, "231"), &n2).unwrap());
    assert!(tree.is_sibling_of(&n23, &n21).unwrap());
    assert!(tree.is_sibling_of(&n2, &node_of(&tree, "4")).unwrap());
    assert!(!tree.is_sibling_of(&n21, &node_of(&tree, "41")).unwrap());

    // Through the capability trait.
    let h: &dyn Hierarchy = &tree;
    assert!(h.is_root(&n2).unwrap());
    assert!(!h.is_leaf(&n2).unwrap());
    assert!(h.is_leaf(&n21).unwrap());
    assert_eq!(h.get_depth(&n23), 2);
    assert_eq!(h.children_count(&n2).unwrap(), 4);
    assert_eq!(h.get_node(n23.key).unwrap(), n23);
}

pub fn rebuild_repairs_torn_state<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let topo = topology(&tree);
    let k23 = key_of(&tree, "23");
    tree.store_mut()
        .bulk_update(&Filter::key(k23), &[Update::Set(Field::Lft, 40)])
        .unwrap();
    assert!(matches!(
        tree.validate_invariants(),
        Err(Error::InconsistentState(_))
    ));

    tree.rebuild(&topo).unwrap();
    assert_eq!(got(&tree), expected(UNCHANGED));

    // A different authoritative topology reshapes the forest.
    let k1 = key_of(&tree, "1");
    let k4 = key_of(&tree, "4");
    let reshaped: Vec<(NodeKey, Option<NodeKey>)> = topo
        .iter()
        .map(|&(key, parent)| if key == k4 { (key, Some(k1)) } else { (key, parent) })
        .collect();
    tree.rebuild(&reshaped).unwrap();
    assert_eq!(
        got(&tree),
        expected(&[
            ("1", 1, 1),
            ("4", 2, 1),
            ("41", 3, 0),
            ("2", 1, 4),
            ("21", 2, 0),
            ("22", 2, 0),
            ("23", 2, 1),
            ("231", 3, 0),
            ("24", 2, 0),
            ("3", 1, 0),
        ])
    );
    assert_eq!(root_tree_ids(&tree), vec![1, 2, 3]);
}

pub fn rebuild_rejects_bad_topology<S: NodeStore>(make: impl Fn() -> S) {
    let mut tree = loaded(&make);
    let before = intervals(&tree);
    let topo = topology(&tree);

    assert!(matches!(
        tree.rebuild(&topo[1..]),
        Err(Error::InvalidOperation(_))
    ));

    let mut duplicated = topo.clone();
    duplicated.push(topo[0]);
    assert!(matches!(
        tree.rebuild(&duplicated),
        Err(Error::InvalidOperation(_))
    ));

    let mut unknown = topo.clone();
    unknown.push((NodeKey(9_999), None));
    assert!(matches!(tree.rebuild(&unknown), Err(Error::NotFound(_))));

    let k2 = key_of(&tree, "2");
    let k21 = key_of(&tree, "21");
    let cyclic: Vec<(NodeKey, Option<NodeKey>)> = topo
        .iter()
        .map(|&(key, parent)| if key == k2 { (key, Some(k21)) } else { (key, parent) })
        .collect();
    assert!(matches!(
        tree.rebuild(&cyclic),
        Err(Error::InvalidOperation(_))
    ));

    assert_eq!(intervals(&tree), before);
}
