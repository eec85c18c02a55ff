//! Fixtures and backend conformance scenarios shared by every `NodeStore` test suite.
//!
//! A backend crate instantiates the whole suite with
//! `nestedset_test_support::conformance_suite!(|| MyStore::new());`.

use nestedset_core::{
    BulkItem, Filter, NestedSetTree, Node, NodeKey, NodeStore, Order, Payload, TreeId, Value,
};

pub mod scenarios;

/// Install a `fmt` subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `(desc, depth, children_count)` in tree order for [`base_data`].
pub const UNCHANGED: &[(&str, u64, usize)] = &[
    ("1", 1, 0),
    ("2", 1, 4),
    ("21", 2, 0),
    ("22", 2, 0),
    ("23", 2, 1),
    ("231", 3, 0),
    ("24", 2, 0),
    ("3", 1, 0),
    ("4", 1, 1),
    ("41", 2, 0),
];

pub fn item(desc: &str) -> BulkItem {
    BulkItem::new(Payload::new().with("desc", desc))
}

/// `1, 2(21, 22, 23(231), 24), 3, 4(41)`.
pub fn base_data() -> Vec<BulkItem> {
    vec![
        item("1"),
        item("2").with_children(vec![
            item("21"),
            item("22"),
            item("23").with_children(vec![item("231")]),
            item("24"),
        ]),
        item("3"),
        item("4").with_children(vec![item("41")]),
    ]
}

/// Assign preorder ids starting at `first`.
pub fn with_ids(items: Vec<BulkItem>, first: u64) -> Vec<BulkItem> {
    fn assign(items: Vec<BulkItem>, next: &mut u64) -> Vec<BulkItem> {
        items
            .into_iter()
            .map(|mut item| {
                item.id = Some(NodeKey(*next));
                *next += 1;
                item.children = assign(std::mem::take(&mut item.children), next);
                item
            })
            .collect()
    }
    let mut next = first;
    assign(items, &mut next)
}

pub fn expected(rows: &[(&str, u64, usize)]) -> Vec<(String, u64, usize)> {
    rows.iter()
        .map(|(desc, depth, count)| (desc.to_string(), *depth, *count))
        .collect()
}

pub fn desc(node: &Node) -> String {
    node.get("desc")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Forest summary in tree order. Panics when any interval invariant is broken.
pub fn got<S: NodeStore>(tree: &NestedSetTree<S>) -> Vec<(String, u64, usize)> {
    tree.validate_invariants().expect("interval invariants");
    tree.tree(None)
        .expect("tree")
        .iter()
        .map(|node| {
            let count = tree.children_count(node).expect("children count");
            (desc(node), node.depth, count)
        })
        .collect()
}

/// Key of the single node whose `desc` equals `value`.
pub fn key_of<S: NodeStore>(tree: &NestedSetTree<S>, value: &str) -> NodeKey {
    let mut found = tree
        .store()
        .filter(&Filter::attr("desc", value), Order::Preorder)
        .expect("filter by desc");
    assert_eq!(found.len(), 1, "expected exactly one node with desc {value:?}");
    found.remove(0).key
}

pub fn node_of<S: NodeStore>(tree: &NestedSetTree<S>, value: &str) -> Node {
    tree.get(key_of(tree, value)).expect("node")
}

/// Every row's coordinates, keyed and in preorder.
pub fn intervals<S: NodeStore>(
    tree: &NestedSetTree<S>,
) -> Vec<(NodeKey, TreeId, u64, u64, u64)> {
    tree.tree(None)
        .expect("tree")
        .into_iter()
        .map(|n| (n.key, n.tree_id, n.lft, n.rgt, n.depth))
        .collect()
}

/// `(node, parent)` pairs in preorder, the input shape of `rebuild`.
pub fn topology<S: NodeStore>(tree: &NestedSetTree<S>) -> Vec<(NodeKey, Option<NodeKey>)> {
    tree.tree(None)
        .expect("tree")
        .iter()
        .map(|node| {
            let parent = tree.parent(node).expect("parent").map(|p| p.key);
            (node.key, parent)
        })
        .collect()
}

/// Emit one `#[test]` per conformance scenario, each with a fresh store from `$make`.
#[macro_export]
macro_rules! conformance_suite {
    ($make:expr) => {
        $crate::conformance_suite!(@tests $make;
            load_nested_data,
            load_base_data,
            empty_forest,
            delete_subtree_closes_gap,
            delete_collapses_nested_matches,
            delete_retires_tree_ids,
            add_sibling_placements,
            add_child_appends,
            ordered_roots,
            ordered_children_and_moves,
            position_errors,
            move_left_of_self_is_noop,
            move_stationary_tokens,
            move_into_leaf,
            move_subtree_across_trees,
            move_node_to_root_level,
            move_root_first,
            move_to_descendant_fails,
            move_between_siblings,
            dump_round_trips_with_ids,
            dump_subtree_strips_reserved_fields,
            keep_ids_errors,
            failed_load_writes_nothing,
            reference_fields_resolve,
            references_resolve_within_batch,
            torn_anchor_is_rejected,
            descendant_counts_match,
            navigation_queries,
            rebuild_repairs_torn_state,
            rebuild_rejects_bad_topology,
        );
    };
    (@tests $make:expr; $($name:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                $crate::init_tracing();
                $crate::scenarios::$name($make);
            }
        )*
    };
}
