//! Detection and repair of torn interval numbering.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::filter::{Field, Filter, Order, Update};
use crate::ids::{NodeKey, TreeId};
use crate::node::Node;
use crate::traits::NodeStore;
use crate::tree::NestedSetTree;

fn inconsistent(msg: String) -> Error {
    warn!(%msg, "invariant violation");
    Error::InconsistentState(msg)
}

impl<S> NestedSetTree<S>
where
    S: NodeStore,
{
    /// Check every interval invariant, reporting the first violation found.
    ///
    /// Per tree: `rgt > lft`, used values exactly `{1..2N}`, a single root spanning `[1, 2N]`,
    /// no partially overlapping intervals, and `depth == 1 + |ancestors|`.
    pub fn validate_invariants(&self) -> Result<()> {
        let nodes = self.store.filter(&Filter::all(), Order::Preorder)?;
        let mut trees: BTreeMap<TreeId, Vec<&Node>> = BTreeMap::new();
        for node in &nodes {
            if node.rgt <= node.lft {
                return Err(inconsistent(format!(
                    "node {} has rgt {} <= lft {}",
                    node.key, node.rgt, node.lft
                )));
            }
            trees.entry(node.tree_id).or_default().push(node);
        }

        for (tree_id, members) in &trees {
            let n = members.len() as u64;
            let mut edges: Vec<u64> = members.iter().flat_map(|m| [m.lft, m.rgt]).collect();
            edges.sort_unstable();
            if !edges.iter().copied().eq(1..=2 * n) {
                return Err(inconsistent(format!(
                    "tree {tree_id} does not use exactly the values 1..={}",
                    2 * n
                )));
            }
            let root = members[0];
            if root.lft != 1 || root.rgt != 2 * n {
                return Err(inconsistent(format!(
                    "tree {tree_id} root {} does not span [1, {}]",
                    root.key,
                    2 * n
                )));
            }
            // Preorder walk with the chain of open intervals.
            let mut open: Vec<&Node> = Vec::new();
            for &node in members {
                while let Some(top) = open.last() {
                    if node.lft < top.rgt {
                        break;
                    }
                    open.pop();
                }
                if let Some(top) = open.last() {
                    if node.rgt > top.rgt {
                        return Err(inconsistent(format!(
                            "node {} overlaps node {} without nesting",
                            node.key, top.key
                        )));
                    }
                }
                let expected = open.len() as u64 + 1;
                if node.depth != expected {
                    return Err(inconsistent(format!(
                        "node {} has depth {} but {} ancestors",
                        node.key,
                        node.depth,
                        expected - 1
                    )));
                }
                open.push(node);
            }
        }
        Ok(())
    }

    /// Recompute every node's `tree_id`, `lft`, `rgt` and `depth` from an authoritative
    /// topology of `(node, parent)` pairs.
    ///
    /// Roots and children keep the relative order in which they are listed. The listing must
    /// cover every stored node exactly once.
    pub fn rebuild(&mut self, topology: &[(NodeKey, Option<NodeKey>)]) -> Result<()> {
        let stored: HashSet<NodeKey> = self
            .store
            .filter(&Filter::all(), Order::Preorder)?
            .into_iter()
            .map(|n| n.key)
            .collect();

        let mut listed = HashSet::with_capacity(topology.len());
        let mut roots = Vec::new();
        let mut children: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
        for &(key, parent) in topology {
            if !stored.contains(&key) {
                return Err(Error::NotFound(format!("node {key}")));
            }
            if !listed.insert(key) {
                return Err(Error::InvalidOperation(format!("node {key} listed twice")));
            }
            match parent {
                Some(parent) if !stored.contains(&parent) => {
                    return Err(Error::NotFound(format!("parent {parent} of {key}")));
                }
                Some(parent) => children.entry(parent).or_default().push(key),
                None => roots.push(key),
            }
        }
        if listed.len() != stored.len() {
            return Err(Error::InvalidOperation(format!(
                "topology lists {} of {} stored nodes",
                listed.len(),
                stored.len()
            )));
        }

        // (key, tree_id, lft, rgt, depth), computed fully before the first write.
        let mut numbering: Vec<(NodeKey, TreeId, u64, u64, u64)> = Vec::new();
        for (idx, root) in roots.iter().enumerate() {
            let tree_id = idx as TreeId + 1;
            let mut counter = 0u64;
            let mut stack: Vec<(NodeKey, u64, bool)> = vec![(*root, 1, false)];
            let mut open: HashMap<NodeKey, usize> = HashMap::new();
            while let Some((key, depth, closing)) = stack.pop() {
                counter += 1;
                if closing {
                    numbering[open[&key]].3 = counter;
                    continue;
                }
                open.insert(key, numbering.len());
                numbering.push((key, tree_id, counter, 0, depth));
                stack.push((key, depth, true));
                if let Some(kids) = children.get(&key) {
                    stack.extend(kids.iter().rev().map(|kid| (*kid, depth + 1, false)));
                }
            }
        }
        if numbering.len() != stored.len() {
            return Err(Error::InvalidOperation(
                "topology contains a cycle unreachable from any root".into(),
            ));
        }

        for (key, tree_id, lft, rgt, depth) in &numbering {
            self.store.bulk_update(
                &Filter::key(*key),
                &[
                    Update::Set(Field::TreeId, *tree_id),
                    Update::Set(Field::Lft, *lft),
                    Update::Set(Field::Rgt, *rgt),
                    Update::Set(Field::Depth, *depth),
                ],
            )?;
        }
        debug!(nodes = numbering.len(), trees = roots.len(), "rebuilt numbering");
        Ok(())
    }
}
