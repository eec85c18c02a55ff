use std::collections::HashSet;

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::NodeKey;
use crate::navigator::nest_preorder;
use crate::node::{NodeDraft, Payload, Value};
use crate::traits::NodeStore;
use crate::tree::NestedSetTree;

/// Nested representation of a subtree used by `load_bulk` and `dump_bulk`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BulkItem {
    pub data: Payload,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub id: Option<NodeKey>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub children: Vec<BulkItem>,
}

impl BulkItem {
    pub fn new(data: Payload) -> Self {
        Self {
            data,
            id: None,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: NodeKey) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_children(mut self, children: Vec<BulkItem>) -> Self {
        self.children = children;
        self
    }
}

impl<S> NestedSetTree<S>
where
    S: NodeStore,
{
    /// Load nested items in preorder under `parent`, or as new roots.
    ///
    /// With `keep_ids` every item must carry an unused `id`. Every item is checked before the
    /// first node is created. Returns the created keys in creation order.
    pub fn load_bulk(
        &mut self,
        items: &[BulkItem],
        parent: Option<NodeKey>,
        keep_ids: bool,
    ) -> Result<Vec<NodeKey>> {
        if let Some(parent) = parent {
            self.anchor(parent)?;
        }
        let mut drafts = self.prepare_bulk(items, keep_ids)?.into_iter();

        let mut added = Vec::with_capacity(drafts.len());
        let mut stack: Vec<(Option<NodeKey>, &BulkItem)> =
            items.iter().rev().map(|item| (parent, item)).collect();
        while let Some((parent, item)) = stack.pop() {
            let draft = drafts.next().ok_or_else(|| {
                Error::InconsistentState("bulk item without a prepared draft".into())
            })?;
            let node = match parent {
                Some(parent) => self.add_child(parent, draft)?,
                None => self.add_root(draft)?,
            };
            added.push(node.key);
            stack.extend(item.children.iter().rev().map(|child| (Some(node.key), child)));
        }
        debug!(count = added.len(), "bulk loaded");
        Ok(added)
    }

    /// Build the drafts of `items` in preorder without writing anything.
    fn prepare_bulk(&self, items: &[BulkItem], keep_ids: bool) -> Result<Vec<NodeDraft>> {
        let mut drafts = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<&BulkItem> = items.iter().rev().collect();
        while let Some(item) = stack.pop() {
            let mut data = item.data.clone();
            self.resolve_references(&mut data, &seen)?;
            let mut draft = NodeDraft::new(data);
            if keep_ids {
                let id = item.id.ok_or_else(|| {
                    Error::InvalidOperation("bulk item without id while keeping ids".into())
                })?;
                if !seen.insert(id) {
                    return Err(Error::NodeAlreadySaved(id));
                }
                draft = draft.with_key(id);
                self.check_draft(&draft)?;
            }
            drafts.push(draft);
            stack.extend(item.children.iter().rev());
        }
        Ok(drafts)
    }

    /// Resolve reference fields against the store, or against `batch`: the ids of items that
    /// precede this one in the same load and will exist by the time it is created.
    fn resolve_references(&self, data: &mut Payload, batch: &HashSet<NodeKey>) -> Result<()> {
        for field in &self.config.reference_fields {
            let Some(raw) = data.get(field) else {
                continue;
            };
            if raw.is_null() {
                continue;
            }
            let earlier = match raw {
                Value::Ref(key) => Some(*key),
                Value::Int(i) => u64::try_from(*i).ok().map(NodeKey),
                _ => None,
            }
            .filter(|key| batch.contains(key));
            let resolved = match earlier {
                Some(key) => Value::Ref(key),
                None => self.store.lookup(field, raw)?.ok_or_else(|| {
                    Error::NotFound(format!("reference {field} = {raw:?}"))
                })?,
            };
            data.insert(field.clone(), resolved);
        }
        Ok(())
    }

    /// Dump `parent` (included) and its descendants, or the whole forest.
    pub fn dump_bulk(&self, parent: Option<NodeKey>, keep_ids: bool) -> Result<Vec<BulkItem>> {
        let nodes = match parent {
            Some(key) => {
                let parent = self.get(key)?;
                self.tree(Some(&parent))?
            }
            None => self.tree(None)?,
        };

        let mut slots: Vec<Option<BulkItem>> = nodes
            .iter()
            .map(|node| {
                Some(BulkItem {
                    data: node.payload.clone().without_reserved(),
                    id: keep_ids.then_some(node.key),
                    children: Vec::new(),
                })
            })
            .collect();
        let mut edges = Vec::with_capacity(nodes.len());
        nest_preorder(&nodes, |parent, child| edges.push((parent, child)));

        // Children come after their parent in preorder; attach bottom-up.
        let mut top = Vec::new();
        for (parent, child) in edges.into_iter().rev() {
            let item = slots[child].take().ok_or_else(|| {
                Error::InconsistentState("node attached twice while dumping".into())
            })?;
            match parent {
                Some(parent) => match slots[parent].as_mut() {
                    Some(parent) => parent.children.insert(0, item),
                    None => {
                        return Err(Error::InconsistentState(
                            "parent consumed before its children".into(),
                        ))
                    }
                },
                None => top.push(item),
            }
        }
        top.reverse();
        Ok(top)
    }
}
