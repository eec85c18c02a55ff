//! Read-only structural queries derived from interval membership.

use crate::error::{Error, Result};
use crate::filter::{Field, Filter, Order};
use crate::node::Node;
use crate::traits::NodeStore;
use crate::tree::NestedSetTree;

impl<S> NestedSetTree<S>
where
    S: NodeStore,
{
    /// All roots, ordered by `tree_id`.
    pub fn root_nodes(&self) -> Result<Vec<Node>> {
        self.store.filter(&Filter::all().is(Field::Lft, 1), Order::Preorder)
    }

    pub fn first_root_node(&self) -> Result<Option<Node>> {
        Ok(self.root_nodes()?.into_iter().next())
    }

    pub fn last_root_node(&self) -> Result<Option<Node>> {
        Ok(self
            .store
            .filter(&Filter::all().is(Field::Lft, 1), Order::ReversePreorder)?
            .into_iter()
            .next())
    }

    /// `parent` followed by its descendants in preorder, or the whole forest.
    pub fn tree(&self, parent: Option<&Node>) -> Result<Vec<Node>> {
        let filter = match parent {
            None => Filter::all(),
            Some(parent) => Filter::all()
                .tree(parent.tree_id)
                .between(Field::Lft, parent.lft, parent.rgt - 1),
        };
        self.store.filter(&filter, Order::Preorder)
    }

    pub fn ancestors(&self, node: &Node) -> Result<Vec<Node>> {
        if node.is_root() {
            return Ok(Vec::new());
        }
        self.store.filter(
            &Filter::all()
                .tree(node.tree_id)
                .lt(Field::Lft, node.lft)
                .gt(Field::Rgt, node.rgt),
            Order::Preorder,
        )
    }

    pub fn descendants(&self, node: &Node) -> Result<Vec<Node>> {
        if node.is_leaf() {
            return Ok(Vec::new());
        }
        self.store.filter(&descendants_filter(node), Order::Preorder)
    }

    pub fn children(&self, node: &Node) -> Result<Vec<Node>> {
        if node.is_leaf() {
            return Ok(Vec::new());
        }
        self.store.filter(
            &descendants_filter(node).is(Field::Depth, node.depth + 1),
            Order::Preorder,
        )
    }

    pub fn children_count(&self, node: &Node) -> Result<usize> {
        Ok(self.children(node)?.len())
    }

    pub fn first_child(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.children(node)?.into_iter().next())
    }

    pub fn last_child(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.children(node)?.pop())
    }

    /// Nearest ancestor; `None` for roots.
    pub fn parent(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.ancestors(node)?.pop())
    }

    pub fn root(&self, node: &Node) -> Result<Node> {
        if node.is_root() {
            return Ok(node.clone());
        }
        self.store
            .filter(
                &Filter::all().tree(node.tree_id).is(Field::Lft, 1),
                Order::Preorder,
            )?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::InconsistentState(format!("tree {} has no root", node.tree_id))
            })
    }

    /// Every node sharing this node's parent, the node included. Roots are siblings of each other.
    pub fn siblings(&self, node: &Node) -> Result<Vec<Node>> {
        if node.is_root() {
            return self.root_nodes();
        }
        let parent = self.parent(node)?.ok_or_else(|| {
            Error::InconsistentState(format!(
                "node {} at lft {} has no enclosing interval",
                node.key, node.lft
            ))
        })?;
        self.children(&parent)
    }

    pub fn first_sibling(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.siblings(node)?.into_iter().next())
    }

    pub fn last_sibling(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.siblings(node)?.pop())
    }

    pub fn is_child_of(&self, node: &Node, parent: &Node) -> Result<bool> {
        Ok(node.depth == parent.depth + 1 && node.is_descendant_of(parent))
    }

    pub fn is_sibling_of(&self, node: &Node, other: &Node) -> Result<bool> {
        if node.is_root() && other.is_root() {
            return Ok(true);
        }
        if node.is_root() || other.is_root() || node.tree_id != other.tree_id {
            return Ok(false);
        }
        let a = self.parent(node)?;
        let b = self.parent(other)?;
        Ok(a.map(|n| n.key) == b.map(|n| n.key))
    }
}

fn descendants_filter(node: &Node) -> Filter {
    Filter::all()
        .tree(node.tree_id)
        .gt(Field::Lft, node.lft)
        .lt(Field::Lft, node.rgt)
}

/// Rebuild nesting from a preorder listing using interval containment only.
///
/// Calls `attach(parent_index, child_index)` for every non-top node, where indexes refer to
/// positions in `nodes`; top-level nodes get `None` as parent.
pub(crate) fn nest_preorder(nodes: &[Node], mut attach: impl FnMut(Option<usize>, usize)) {
    let mut open: Vec<usize> = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        while let Some(&top) = open.last() {
            if nodes[top].is_ancestor_of(node) {
                break;
            }
            open.pop();
        }
        attach(open.last().copied(), idx);
        open.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeKey;
    use crate::node::Payload;

    fn node(key: u64, tree_id: u64, lft: u64, rgt: u64) -> Node {
        Node {
            key: NodeKey(key),
            tree_id,
            lft,
            rgt,
            depth: 1,
            payload: Payload::new(),
        }
    }

    #[test]
    fn nest_preorder_follows_containment() {
        // 1(2, 3(4)), 5
        let nodes = vec![
            node(1, 1, 1, 8),
            node(2, 1, 2, 3),
            node(3, 1, 4, 7),
            node(4, 1, 5, 6),
            node(5, 2, 1, 2),
        ];
        let mut edges = Vec::new();
        nest_preorder(&nodes, |parent, child| {
            edges.push((parent.map(|p| nodes[p].key.0), nodes[child].key.0))
        });
        assert_eq!(
            edges,
            vec![(None, 1), (Some(1), 2), (Some(1), 3), (Some(3), 4), (None, 5)]
        );
    }
}
