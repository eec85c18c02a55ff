use crate::bulk::BulkItem;
use crate::error::Result;
use crate::filter::{Filter, Order, Update};
use crate::ids::NodeKey;
use crate::node::{Node, NodeDraft, NodeRecord, Value};
use crate::position::Position;

/// Document store the tree is encoded into.
///
/// Every method is a single store call; the core composes them into multi-step
/// mutations without any cross-call transaction.
pub trait NodeStore {
    /// Persist a new row. `key` forces the assigned key and must fail when it is taken.
    fn create(&mut self, key: Option<NodeKey>, record: NodeRecord) -> Result<NodeKey>;
    fn get(&self, key: NodeKey) -> Result<Option<Node>>;
    fn filter(&self, filter: &Filter, order: Order) -> Result<Vec<Node>>;
    /// Apply every update to the rows matched before the call, atomically. Returns the row count.
    fn bulk_update(&mut self, filter: &Filter, updates: &[Update]) -> Result<usize>;
    /// Remove matching rows and return their last snapshots.
    fn bulk_delete(&mut self, filter: &Filter) -> Result<Vec<Node>>;

    /// Resolve a reference-typed payload field.
    ///
    /// The default treats `Int`/`Ref` values as keys of this same store.
    fn lookup(&self, _field: &str, raw: &Value) -> Result<Option<Value>> {
        let key = match raw {
            Value::Ref(key) => *key,
            Value::Int(i) if *i >= 0 => NodeKey(*i as u64),
            _ => return Ok(None),
        };
        Ok(self.get(key)?.map(|_| Value::Ref(key)))
    }
}

/// Full node contract of a hierarchy, independent of how the hierarchy is encoded.
///
/// The nested-set tree implements it; derived helpers have default implementations.
pub trait Hierarchy {
    fn add_root(&mut self, draft: NodeDraft) -> Result<Node>;
    fn add_child(&mut self, parent: NodeKey, draft: NodeDraft) -> Result<Node>;
    fn add_sibling(
        &mut self,
        anchor: NodeKey,
        pos: Option<Position>,
        draft: NodeDraft,
    ) -> Result<Node>;
    fn move_node(&mut self, node: NodeKey, target: NodeKey, pos: Option<Position>)
        -> Result<()>;
    /// Remove every matching subtree; returns the number of removed nodes.
    fn delete(&mut self, filter: &Filter) -> Result<usize>;

    fn load_bulk(
        &mut self,
        items: &[BulkItem],
        parent: Option<NodeKey>,
        keep_ids: bool,
    ) -> Result<Vec<NodeKey>>;
    fn dump_bulk(&self, parent: Option<NodeKey>, keep_ids: bool) -> Result<Vec<BulkItem>>;

    fn get_node(&self, key: NodeKey) -> Result<Node>;
    fn root_nodes(&self) -> Result<Vec<Node>>;
    /// `parent` and its descendants, or the whole forest.
    fn tree(&self, parent: Option<&Node>) -> Result<Vec<Node>>;
    fn ancestors(&self, node: &Node) -> Result<Vec<Node>>;
    fn descendants(&self, node: &Node) -> Result<Vec<Node>>;
    fn children(&self, node: &Node) -> Result<Vec<Node>>;
    fn siblings(&self, node: &Node) -> Result<Vec<Node>>;
    fn parent(&self, node: &Node) -> Result<Option<Node>>;
    fn root(&self, node: &Node) -> Result<Node>;
    fn get_depth(&self, node: &Node) -> u64;

    fn is_root(&self, node: &Node) -> Result<bool> {
        Ok(self.root(node)?.key == node.key)
    }

    fn is_leaf(&self, node: &Node) -> Result<bool> {
        Ok(self.children(node)?.is_empty())
    }

    fn children_count(&self, node: &Node) -> Result<usize> {
        Ok(self.children(node)?.len())
    }

    fn first_child(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.children(node)?.into_iter().next())
    }

    fn last_child(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.children(node)?.pop())
    }

    fn first_root_node(&self) -> Result<Option<Node>> {
        Ok(self.root_nodes()?.into_iter().next())
    }

    fn last_root_node(&self) -> Result<Option<Node>> {
        Ok(self.root_nodes()?.pop())
    }

    fn first_sibling(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.siblings(node)?.into_iter().next())
    }

    fn last_sibling(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.siblings(node)?.pop())
    }
}
