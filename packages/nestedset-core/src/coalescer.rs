use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::filter::{Field, Filter, Order, Update};
use crate::ids::{NodeKey, TreeId};
use crate::node::Node;
use crate::traits::NodeStore;
use crate::tree::NestedSetTree;

impl<S> NestedSetTree<S>
where
    S: NodeStore,
{
    /// Delete every subtree rooted at a node matching `filter`.
    ///
    /// Matches nested inside other matches collapse into their topmost match, so each subtree
    /// is removed exactly once. Retired `tree_id`s are not reused.
    pub fn delete(&mut self, filter: &Filter) -> Result<usize> {
        let matches = self.store.filter(filter, Order::Preorder)?;
        let mut tops: Vec<Node> = Vec::new();
        for node in matches {
            if !tops.iter().any(|top| top.is_ancestor_of(&node)) {
                tops.push(node);
            }
        }

        let mut removed = 0;
        let mut ranges: Vec<(TreeId, u64, u64)> = Vec::with_capacity(tops.len());
        for top in &tops {
            let gone = self.store.bulk_delete(
                &Filter::all()
                    .tree(top.tree_id)
                    .between(Field::Lft, top.lft, top.rgt),
            )?;
            removed += gone.len();
            ranges.push((top.tree_id, top.lft, top.rgt));
        }

        // Right to left, so earlier closes never shift a range still waiting to be closed.
        ranges.sort_unstable_by(|a, b| b.cmp(a));
        for (tree_id, lft, rgt) in ranges {
            self.close_gap(lft, rgt, tree_id)?;
        }
        debug!(subtrees = tops.len(), removed, "deleted");
        Ok(removed)
    }

    pub fn delete_node(&mut self, key: NodeKey) -> Result<usize> {
        match self.delete(&Filter::key(key))? {
            0 => Err(Error::NotFound(format!("node {key}"))),
            n => Ok(n),
        }
    }

    /// Renumber the tree after the interval `[lft, rgt]` was vacated.
    pub(crate) fn close_gap(&mut self, lft: u64, rgt: u64, tree_id: TreeId) -> Result<()> {
        let span = rgt.checked_sub(lft).ok_or_else(|| {
            Error::InconsistentState(format!("gap [{lft}, {rgt}] in tree {tree_id} is inverted"))
        })?;
        let gap = i64::try_from(span + 1)
            .map_err(|_| Error::InvalidOperation("gap size overflow".into()))?;
        trace!(tree_id, lft, rgt, "close gap");
        self.store.bulk_update(
            &Filter::all().tree(tree_id).gt(Field::Rgt, lft),
            &[Update::Inc(Field::Rgt, -gap)],
        )?;
        self.store.bulk_update(
            &Filter::all().tree(tree_id).gt(Field::Lft, lft),
            &[Update::Inc(Field::Lft, -gap)],
        )?;
        Ok(())
    }
}
