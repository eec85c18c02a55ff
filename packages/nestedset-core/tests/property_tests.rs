use std::collections::HashMap;

use nestedset_core::{
    sorts_after, Error, MemoryNodeStore, NestedSetTree, Node, NodeKey, Payload, Position,
    TreeConfig,
};
use nestedset_test_support::topology;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    AddRoot,
    AddChild(usize),
    AddSibling(usize, Position),
    Move(usize, usize, Position),
    Delete(usize),
}

#[derive(Clone, Copy)]
enum Slot {
    Start,
    End,
    Before(NodeKey),
}

/// Adjacency-list model of the same forest.
#[derive(Default)]
struct Model {
    children: HashMap<Option<NodeKey>, Vec<NodeKey>>,
    parent: HashMap<NodeKey, Option<NodeKey>>,
}

impl Model {
    fn preorder(&self) -> Vec<(NodeKey, Option<NodeKey>)> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.kids(None).iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            out.push((key, self.parent[&key]));
            stack.extend(self.kids(Some(key)).iter().rev());
        }
        out
    }

    fn kids(&self, parent: Option<NodeKey>) -> &[NodeKey] {
        self.children
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn keys(&self) -> Vec<NodeKey> {
        self.preorder().into_iter().map(|(key, _)| key).collect()
    }

    /// `node == ancestor` or `node` lies below it.
    fn is_within(&self, node: NodeKey, ancestor: NodeKey) -> bool {
        let mut cursor = Some(node);
        while let Some(key) = cursor {
            if key == ancestor {
                return true;
            }
            cursor = self.parent[&key];
        }
        false
    }

    fn slot(&self, target: NodeKey, pos: Position) -> (Option<NodeKey>, Slot) {
        let parent = self.parent[&target];
        match pos {
            Position::FirstSibling => (parent, Slot::Start),
            Position::LastSibling => (parent, Slot::End),
            Position::Left => (parent, Slot::Before(target)),
            Position::Right => {
                let list = self.kids(parent);
                let idx = list.iter().position(|k| *k == target).unwrap();
                match list.get(idx + 1) {
                    Some(next) => (parent, Slot::Before(*next)),
                    None => (parent, Slot::End),
                }
            }
            Position::FirstChild => (Some(target), Slot::Start),
            Position::LastChild => (Some(target), Slot::End),
            other => panic!("unsorted model cannot place {other}"),
        }
    }

    fn place(&mut self, key: NodeKey, parent: Option<NodeKey>, slot: Slot) {
        if let Slot::Before(anchor) = slot {
            if anchor == key {
                return;
            }
        }
        self.detach(key);
        let list = self.children.entry(parent).or_default();
        match slot {
            Slot::Start => list.insert(0, key),
            Slot::End => list.push(key),
            Slot::Before(anchor) => {
                let idx = list.iter().position(|k| *k == anchor).unwrap();
                list.insert(idx, key);
            }
        }
        self.parent.insert(key, parent);
    }

    fn detach(&mut self, key: NodeKey) {
        if let Some(parent) = self.parent.get(&key) {
            if let Some(list) = self.children.get_mut(parent) {
                list.retain(|k| *k != key);
            }
        }
    }

    fn remove_subtree(&mut self, key: NodeKey) -> usize {
        self.detach(key);
        let mut stack = vec![key];
        let mut removed = 0;
        while let Some(key) = stack.pop() {
            removed += 1;
            self.parent.remove(&key);
            stack.extend(self.children.remove(&Some(key)).unwrap_or_default());
        }
        removed
    }
}

fn sibling_pos() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::FirstSibling),
        Just(Position::Left),
        Just(Position::Right),
        Just(Position::LastSibling),
    ]
}

fn move_pos() -> impl Strategy<Value = Position> {
    prop_oneof![
        sibling_pos(),
        Just(Position::FirstChild),
        Just(Position::LastChild),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::AddRoot),
        3 => any::<usize>().prop_map(Op::AddChild),
        2 => (any::<usize>(), sibling_pos()).prop_map(|(a, p)| Op::AddSibling(a, p)),
        4 => (any::<usize>(), any::<usize>(), move_pos()).prop_map(|(n, t, p)| Op::Move(n, t, p)),
        1 => any::<usize>().prop_map(Op::Delete),
    ]
}

fn payload(step: usize) -> Payload {
    Payload::new().with("desc", format!("n{step}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_operations_match_adjacency_model(ops in prop::collection::vec(op(), 1..40)) {
        let mut tree = NestedSetTree::new(MemoryNodeStore::new());
        let mut model = Model::default();

        for (step, op) in ops.into_iter().enumerate() {
            let keys = model.keys();
            let pick = |i: usize| keys[i % keys.len()];
            match op {
                Op::AddRoot => {
                    let node = tree.add_root(payload(step)).unwrap();
                    model.place(node.key, None, Slot::End);
                }
                _ if keys.is_empty() => continue,
                Op::AddChild(p) => {
                    let parent = pick(p);
                    let node = tree.add_child(parent, payload(step)).unwrap();
                    model.place(node.key, Some(parent), Slot::End);
                }
                Op::AddSibling(a, pos) => {
                    let anchor = pick(a);
                    let (parent, slot) = model.slot(anchor, pos);
                    let node = tree.add_sibling(anchor, Some(pos), payload(step)).unwrap();
                    model.place(node.key, parent, slot);
                }
                Op::Move(n, t, pos) => {
                    let node = pick(n);
                    let target = pick(t);
                    let forbidden = if pos.is_child() {
                        model.is_within(target, node)
                    } else {
                        target != node && model.is_within(target, node)
                    };
                    let result = tree.move_node(node, target, Some(pos));
                    if forbidden {
                        prop_assert!(matches!(result, Err(Error::InvalidMoveToDescendant)));
                    } else {
                        result.unwrap();
                        let (parent, slot) = model.slot(target, pos);
                        model.place(node, parent, slot);
                    }
                }
                Op::Delete(d) => {
                    let key = pick(d);
                    let removed = tree.delete_node(key).unwrap();
                    prop_assert_eq!(removed, model.remove_subtree(key));
                }
            }

            tree.validate_invariants().unwrap();
            prop_assert_eq!(topology(&tree), model.preorder());
        }

        for node in tree.tree(None).unwrap() {
            prop_assert_eq!(
                node.descendant_count() as usize,
                tree.descendants(&node).unwrap().len()
            );
        }

        let dumped = tree.dump_bulk(None, true).unwrap();
        let mut copy = NestedSetTree::new(MemoryNodeStore::new());
        copy.load_bulk(&dumped, None, true).unwrap();
        prop_assert_eq!(copy.dump_bulk(None, true).unwrap(), dumped);
    }
}

#[derive(Clone, Debug)]
enum SortedOp {
    AddRoot(i64),
    AddChild(usize, i64),
    AddSibling(usize, i64),
    Move(usize, usize, Position),
    Delete(usize),
}

fn sorted_op() -> impl Strategy<Value = SortedOp> {
    prop_oneof![
        1 => (0..5i64).prop_map(SortedOp::AddRoot),
        3 => (any::<usize>(), 0..5i64).prop_map(|(p, v)| SortedOp::AddChild(p, v)),
        2 => (any::<usize>(), 0..5i64).prop_map(|(a, v)| SortedOp::AddSibling(a, v)),
        3 => (
            any::<usize>(),
            any::<usize>(),
            prop_oneof![Just(Position::SortedSibling), Just(Position::SortedChild)],
        )
            .prop_map(|(n, t, p)| SortedOp::Move(n, t, p)),
        1 => any::<usize>().prop_map(SortedOp::Delete),
    ]
}

fn assert_sorted(keys: &[String], list: &[Node]) -> Result<(), TestCaseError> {
    for pair in list.windows(2) {
        prop_assert!(
            !sorts_after(keys, &pair[0].payload, &pair[1].payload),
            "{:?} sorts after {:?}",
            pair[0].payload,
            pair[1].payload
        );
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sorted_placements_keep_siblings_ordered(ops in prop::collection::vec(sorted_op(), 1..40)) {
        let config = TreeConfig::new().order_by(["val"]);
        let keys = config.ordering_keys.clone();
        let mut tree = NestedSetTree::with_config(MemoryNodeStore::new(), config);
        let sorted = |step: usize, val: i64| payload(step).with("val", val);

        for (step, op) in ops.into_iter().enumerate() {
            let nodes: Vec<NodeKey> = tree.tree(None).unwrap().into_iter().map(|n| n.key).collect();
            let pick = |i: usize| nodes[i % nodes.len()];
            match op {
                SortedOp::AddRoot(v) => {
                    tree.add_root(sorted(step, v)).unwrap();
                }
                _ if nodes.is_empty() => continue,
                SortedOp::AddChild(p, v) => {
                    tree.add_child(pick(p), sorted(step, v)).unwrap();
                }
                SortedOp::AddSibling(a, v) => {
                    tree.add_sibling(pick(a), None, sorted(step, v)).unwrap();
                }
                SortedOp::Move(n, t, pos) => {
                    let node = tree.get(pick(n)).unwrap();
                    let target = tree.get(pick(t)).unwrap();
                    let forbidden = target.is_descendant_of(&node)
                        || (pos.is_child() && target.key == node.key);
                    let result = tree.move_node(node.key, target.key, Some(pos));
                    if forbidden {
                        prop_assert!(matches!(result, Err(Error::InvalidMoveToDescendant)));
                    } else {
                        result.unwrap();
                    }
                }
                SortedOp::Delete(d) => {
                    tree.delete_node(pick(d)).unwrap();
                }
            }

            tree.validate_invariants().unwrap();
            assert_sorted(&keys, &tree.root_nodes().unwrap())?;
            for node in tree.tree(None).unwrap() {
                assert_sorted(&keys, &tree.children(&node).unwrap())?;
            }
        }
    }
}
