use tracing::debug;

use crate::bulk::BulkItem;
use crate::config::TreeConfig;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::ids::{NodeKey, TreeId};
use crate::node::{Node, NodeDraft, NodeRecord};
use crate::position::Position;
use crate::traits::{Hierarchy, NodeStore};

/// Nested-set forest facade over a `NodeStore`.
///
/// Each node stores `(tree_id, lft, rgt, depth)`; parents are never stored and always derived
/// from interval containment. Mutations take keys, re-read the anchors, and then issue scoped
/// bulk updates against the store. There is no cross-call transaction: a failure between
/// steps leaves a torn state that `validate_invariants` reports and `rebuild` repairs.
pub struct NestedSetTree<S>
where
    S: NodeStore,
{
    pub(crate) store: S,
    pub(crate) config: TreeConfig,
}

impl<S> NestedSetTree<S>
where
    S: NodeStore,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, TreeConfig::default())
    }

    pub fn with_config(store: S, config: TreeConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access. Writes through it bypass every interval invariant.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Fresh snapshot of a node.
    pub fn get(&self, key: NodeKey) -> Result<Node> {
        self.store
            .get(key)?
            .ok_or_else(|| Error::NotFound(format!("node {key}")))
    }

    /// Snapshot of a node a mutation is about to compute coordinates from.
    ///
    /// Rejects rows whose interval is torn instead of deriving writes from them.
    pub(crate) fn anchor(&self, key: NodeKey) -> Result<Node> {
        let node = self.get(key)?;
        if node.lft == 0 || node.rgt <= node.lft {
            return Err(Error::InconsistentState(format!(
                "node {key} has interval [{}, {}]",
                node.lft, node.rgt
            )));
        }
        Ok(node)
    }

    pub(crate) fn is_ordered(&self) -> bool {
        self.config.is_ordered()
    }

    /// Reject drafts that claim a key already present in the store.
    pub(crate) fn check_draft(&self, draft: &NodeDraft) -> Result<()> {
        if let Some(key) = draft.key {
            if self.store.get(key)?.is_some() {
                return Err(Error::NodeAlreadySaved(key));
            }
        }
        Ok(())
    }

    pub(crate) fn persist(
        &mut self,
        draft: NodeDraft,
        tree_id: TreeId,
        lft: u64,
        depth: u64,
    ) -> Result<Node> {
        let record = NodeRecord {
            tree_id,
            lft,
            rgt: lft + 1,
            depth,
            payload: draft.payload,
        };
        let key = self.store.create(draft.key, record.clone())?;
        debug!(%key, tree_id, lft, depth, "created node");
        Ok(Node::from_record(key, record))
    }
}

impl<S> Hierarchy for NestedSetTree<S>
where
    S: NodeStore,
{
    fn add_root(&mut self, draft: NodeDraft) -> Result<Node> {
        NestedSetTree::add_root(self, draft)
    }

    fn add_child(&mut self, parent: NodeKey, draft: NodeDraft) -> Result<Node> {
        NestedSetTree::add_child(self, parent, draft)
    }

    fn add_sibling(
        &mut self,
        anchor: NodeKey,
        pos: Option<Position>,
        draft: NodeDraft,
    ) -> Result<Node> {
        NestedSetTree::add_sibling(self, anchor, pos, draft)
    }

    fn move_node(
        &mut self,
        node: NodeKey,
        target: NodeKey,
        pos: Option<Position>,
    ) -> Result<()> {
        NestedSetTree::move_node(self, node, target, pos)
    }

    fn delete(&mut self, filter: &Filter) -> Result<usize> {
        NestedSetTree::delete(self, filter)
    }

    fn load_bulk(
        &mut self,
        items: &[BulkItem],
        parent: Option<NodeKey>,
        keep_ids: bool,
    ) -> Result<Vec<NodeKey>> {
        NestedSetTree::load_bulk(self, items, parent, keep_ids)
    }

    fn dump_bulk(&self, parent: Option<NodeKey>, keep_ids: bool) -> Result<Vec<BulkItem>> {
        NestedSetTree::dump_bulk(self, parent, keep_ids)
    }

    fn get_node(&self, key: NodeKey) -> Result<Node> {
        self.get(key)
    }

    fn root_nodes(&self) -> Result<Vec<Node>> {
        NestedSetTree::root_nodes(self)
    }

    fn tree(&self, parent: Option<&Node>) -> Result<Vec<Node>> {
        NestedSetTree::tree(self, parent)
    }

    fn ancestors(&self, node: &Node) -> Result<Vec<Node>> {
        NestedSetTree::ancestors(self, node)
    }

    fn descendants(&self, node: &Node) -> Result<Vec<Node>> {
        NestedSetTree::descendants(self, node)
    }

    fn children(&self, node: &Node) -> Result<Vec<Node>> {
        NestedSetTree::children(self, node)
    }

    fn siblings(&self, node: &Node) -> Result<Vec<Node>> {
        NestedSetTree::siblings(self, node)
    }

    fn parent(&self, node: &Node) -> Result<Option<Node>> {
        NestedSetTree::parent(self, node)
    }

    fn root(&self, node: &Node) -> Result<Node> {
        NestedSetTree::root(self, node)
    }

    fn get_depth(&self, node: &Node) -> u64 {
        node.get_depth()
    }

    fn is_root(&self, node: &Node) -> Result<bool> {
        Ok(node.is_root())
    }

    fn is_leaf(&self, node: &Node) -> Result<bool> {
        Ok(node.is_leaf())
    }

    fn last_root_node(&self) -> Result<Option<Node>> {
        NestedSetTree::last_root_node(self)
    }
}
