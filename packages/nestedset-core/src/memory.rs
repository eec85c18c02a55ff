use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::filter::{Filter, Order, Update};
use crate::ids::NodeKey;
use crate::node::{Node, NodeRecord};
use crate::traits::NodeStore;

/// In-memory map-backed store for tests and embedding without a database.
#[derive(Clone, Debug, Default)]
pub struct MemoryNodeStore {
    rows: BTreeMap<NodeKey, Node>,
    next_key: u64,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn allocate_key(&mut self) -> NodeKey {
        self.next_key += 1;
        NodeKey(self.next_key)
    }
}

impl NodeStore for MemoryNodeStore {
    fn create(&mut self, key: Option<NodeKey>, record: NodeRecord) -> Result<NodeKey> {
        let key = match key {
            Some(key) => {
                if self.rows.contains_key(&key) {
                    return Err(Error::Storage(format!("key {key} already in use")));
                }
                self.next_key = self.next_key.max(key.0);
                key
            }
            None => self.allocate_key(),
        };
        self.rows.insert(key, Node::from_record(key, record));
        Ok(key)
    }

    fn get(&self, key: NodeKey) -> Result<Option<Node>> {
        Ok(self.rows.get(&key).cloned())
    }

    fn filter(&self, filter: &Filter, order: Order) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self
            .rows
            .values()
            .filter(|node| filter.matches(node))
            .cloned()
            .collect();
        match order {
            Order::Preorder => nodes.sort_by_key(|n| (n.tree_id, n.lft)),
            Order::ReversePreorder => {
                nodes.sort_by_key(|n| std::cmp::Reverse((n.tree_id, n.lft)))
            }
        }
        Ok(nodes)
    }

    fn bulk_update(&mut self, filter: &Filter, updates: &[Update]) -> Result<usize> {
        let keys: Vec<NodeKey> = self
            .rows
            .values()
            .filter(|node| filter.matches(node))
            .map(|node| node.key)
            .collect();
        // Stage every row first so a failing update leaves the map untouched.
        let mut staged = Vec::with_capacity(keys.len());
        for key in &keys {
            let mut node = self.rows[key].clone();
            for update in updates {
                update.apply(&mut node).ok_or_else(|| {
                    Error::Storage(format!(
                        "{:?} would make {} of {key} negative",
                        update,
                        update.field().column()
                    ))
                })?;
            }
            staged.push(node);
        }
        for node in staged {
            self.rows.insert(node.key, node);
        }
        Ok(keys.len())
    }

    fn bulk_delete(&mut self, filter: &Filter) -> Result<Vec<Node>> {
        let keys: Vec<NodeKey> = self
            .rows
            .values()
            .filter(|node| filter.matches(node))
            .map(|node| node.key)
            .collect();
        Ok(keys.iter().filter_map(|key| self.rows.remove(key)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Field;
    use crate::node::Payload;

    fn record(tree_id: u64, lft: u64, rgt: u64) -> NodeRecord {
        NodeRecord {
            tree_id,
            lft,
            rgt,
            depth: 1,
            payload: Payload::new(),
        }
    }

    #[test]
    fn forced_keys_are_unique_and_advance_allocation() {
        let mut store = MemoryNodeStore::new();
        let forced = store.create(Some(NodeKey(10)), record(1, 1, 2)).unwrap();
        assert_eq!(forced, NodeKey(10));
        assert!(store.create(Some(NodeKey(10)), record(2, 1, 2)).is_err());
        assert_eq!(store.create(None, record(2, 1, 2)).unwrap(), NodeKey(11));
    }

    #[test]
    fn bulk_update_uses_pre_update_matches() {
        let mut store = MemoryNodeStore::new();
        store.create(None, record(1, 1, 4)).unwrap();
        store.create(None, record(1, 2, 3)).unwrap();

        let filter = Filter::all().tree(1).ge(Field::Lft, 1);
        let count = store
            .bulk_update(&filter, &[Update::Set(Field::TreeId, 2), Update::Inc(Field::Lft, 1)])
            .unwrap();
        assert_eq!(count, 2);
        let moved = store.filter(&Filter::all().tree(2), Order::Preorder).unwrap();
        assert_eq!(moved.iter().map(|n| n.lft).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn failed_update_is_not_partially_applied() {
        let mut store = MemoryNodeStore::new();
        store.create(None, record(1, 1, 4)).unwrap();
        store.create(None, record(1, 2, 3)).unwrap();
        let err = store.bulk_update(&Filter::all(), &[Update::Inc(Field::Lft, -2)]);
        assert!(err.is_err());
        let lfts: Vec<u64> = store
            .filter(&Filter::all(), Order::Preorder)
            .unwrap()
            .iter()
            .map(|n| n.lft)
            .collect();
        assert_eq!(lfts, vec![1, 2]);
    }

    #[test]
    fn reverse_preorder_and_delete() {
        let mut store = MemoryNodeStore::new();
        store.create(None, record(1, 1, 2)).unwrap();
        store.create(None, record(2, 1, 2)).unwrap();
        let rev = store.filter(&Filter::all(), Order::ReversePreorder).unwrap();
        assert_eq!(rev[0].tree_id, 2);

        let removed = store.bulk_delete(&Filter::all().tree(1)).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
