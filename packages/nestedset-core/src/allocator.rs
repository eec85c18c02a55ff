//! Interval allocation: insert and move, built on scoped shifts of `lft`/`rgt`/`tree_id`.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::filter::{Field, Filter, Update};
use crate::ids::{NodeKey, TreeId};
use crate::node::{Node, NodeDraft, Payload};
use crate::position::{self, Placement, Position};
use crate::traits::NodeStore;
use crate::tree::NestedSetTree;

fn delta(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| Error::InvalidOperation("shift amount overflow".into()))
}

/// Where a moved subtree lands once the hole is open.
struct Landing {
    tree_id: TreeId,
    lft: u64,
    depth: u64,
}

impl<S> NestedSetTree<S>
where
    S: NodeStore,
{
    /// Open `amount` slots at `from` inside one tree.
    ///
    /// `rgt >= from` always moves; `lft` moves when `>= from` (`include_equal_left`) or `> from`.
    pub(crate) fn shift_right(
        &mut self,
        tree_id: TreeId,
        from: u64,
        include_equal_left: bool,
        amount: u64,
    ) -> Result<()> {
        let amount = delta(amount)?;
        trace!(tree_id, from, include_equal_left, amount, "shift right");
        self.store.bulk_update(
            &Filter::all().tree(tree_id).ge(Field::Rgt, from),
            &[Update::Inc(Field::Rgt, amount)],
        )?;
        let lft = Filter::all().tree(tree_id);
        let lft = if include_equal_left {
            lft.ge(Field::Lft, from)
        } else {
            lft.gt(Field::Lft, from)
        };
        self.store.bulk_update(&lft, &[Update::Inc(Field::Lft, amount)])?;
        Ok(())
    }

    /// Free the `tree_id` slot `from` by renumbering every tree at or after it.
    pub(crate) fn shift_trees_right(&mut self, from: TreeId) -> Result<()> {
        trace!(from, "shift trees right");
        self.store.bulk_update(
            &Filter::all().ge(Field::TreeId, from),
            &[Update::Inc(Field::TreeId, 1)],
        )?;
        Ok(())
    }

    /// Close the `tree_id` hole left by an emptied tree.
    fn compact_trees_after(&mut self, emptied: TreeId) -> Result<()> {
        trace!(emptied, "compact trees");
        self.store.bulk_update(
            &Filter::all().gt(Field::TreeId, emptied),
            &[Update::Inc(Field::TreeId, -1)],
        )?;
        Ok(())
    }

    fn anchor_parent(&self, node: &Node) -> Result<Node> {
        self.parent(node)?.ok_or_else(|| {
            Error::InconsistentState(format!("non-root node {} has no parent", node.key))
        })
    }

    /// Add a new tree after the last one, or in sorted position when ordering keys are set.
    pub fn add_root(&mut self, draft: impl Into<NodeDraft>) -> Result<Node> {
        let draft = draft.into();
        self.check_draft(&draft)?;
        let last_root = self.last_root_node()?;
        if let Some(last_root) = &last_root {
            if self.is_ordered() {
                return self.insert_sibling(last_root, Position::SortedSibling, draft);
            }
        }
        let tree_id = last_root.map_or(1, |root| root.tree_id + 1);
        self.persist(draft, tree_id, 1, 1)
    }

    pub fn add_child(&mut self, parent: NodeKey, draft: impl Into<NodeDraft>) -> Result<Node> {
        let draft = draft.into();
        let parent = self.anchor(parent)?;
        self.check_draft(&draft)?;
        if !parent.is_leaf() {
            let pos = if self.is_ordered() {
                Position::SortedSibling
            } else {
                Position::LastSibling
            };
            let last_child = self.last_child(&parent)?.ok_or_else(|| {
                Error::InconsistentState(format!(
                    "node {} spans an interval but has no children",
                    parent.key
                ))
            })?;
            return self.insert_sibling(&last_child, pos, draft);
        }
        self.shift_right(parent.tree_id, parent.rgt, false, 2)?;
        self.persist(draft, parent.tree_id, parent.lft + 1, parent.depth + 1)
    }

    pub fn add_sibling(
        &mut self,
        anchor: NodeKey,
        pos: Option<Position>,
        draft: impl Into<NodeDraft>,
    ) -> Result<Node> {
        let draft = draft.into();
        let anchor = self.anchor(anchor)?;
        let pos = position::prepare(pos, self.is_ordered(), position::ADD_SIBLING)?;
        self.check_draft(&draft)?;
        self.insert_sibling(&anchor, pos, draft)
    }

    fn insert_sibling(&mut self, anchor: &Node, pos: Position, draft: NodeDraft) -> Result<Node> {
        let (placement, target) = self.resolve(anchor, pos, &draft.payload)?;
        let (placement, target) = self.normalize(placement, target)?;

        if target.is_root() {
            let tree_id = match placement {
                Placement::LastSibling => self.next_tree_id()?,
                _ => {
                    self.shift_trees_right(target.tree_id)?;
                    target.tree_id
                }
            };
            return self.persist(draft, tree_id, 1, 1);
        }

        let lft = self.open_sibling_slot(&target, placement, 2)?;
        self.persist(draft, target.tree_id, lft, target.depth)
    }

    /// Turn a token into `(placement, target)`, scanning siblings for sorted tokens.
    fn resolve(
        &self,
        anchor: &Node,
        pos: Position,
        candidate: &Payload,
    ) -> Result<(Placement, Node)> {
        if pos == Position::SortedSibling {
            let siblings = self.siblings(anchor)?;
            return position::resolve_sorted(&self.config.ordering_keys, siblings, candidate)
                .ok_or_else(|| {
                    Error::InconsistentState(format!("node {} has no siblings", anchor.key))
                });
        }
        Ok((Placement::from_position(pos)?, anchor.clone()))
    }

    /// Rewrite `right` as `left` of the next sibling (or `last-sibling`), `left` of the leftmost
    /// as `first-sibling`, and retarget `first-sibling` to the first sibling.
    fn normalize(&self, placement: Placement, target: Node) -> Result<(Placement, Node)> {
        if placement == Placement::LastSibling {
            return Ok((placement, target));
        }
        let siblings = self.siblings(&target)?;
        let idx = siblings
            .iter()
            .position(|s| s.key == target.key)
            .ok_or_else(|| {
                Error::InconsistentState(format!(
                    "node {} is missing from its sibling list",
                    target.key
                ))
            })?;
        Ok(match placement {
            Placement::Right => match siblings.get(idx + 1) {
                Some(next) => (Placement::Left, next.clone()),
                None => (Placement::LastSibling, target),
            },
            Placement::Left if idx == 0 => (Placement::FirstSibling, target),
            Placement::Left => (Placement::Left, target),
            _ => (Placement::FirstSibling, siblings[0].clone()),
        })
    }

    fn next_tree_id(&self) -> Result<TreeId> {
        Ok(self.last_root_node()?.map_or(1, |root| root.tree_id + 1))
    }

    /// Open `width` slots next to a non-root `target` and return the first one.
    fn open_sibling_slot(
        &mut self,
        target: &Node,
        placement: Placement,
        width: u64,
    ) -> Result<u64> {
        let lft = match placement {
            Placement::LastSibling => {
                let parent = self.anchor_parent(target)?;
                self.shift_right(target.tree_id, parent.rgt, false, width)?;
                parent.rgt
            }
            Placement::FirstSibling => {
                self.shift_right(target.tree_id, target.lft - 1, false, width)?;
                target.lft
            }
            Placement::Left => {
                self.shift_right(target.tree_id, target.lft, true, width)?;
                target.lft
            }
            Placement::Right => {
                return Err(Error::InconsistentState(
                    "right placement must be normalized before allocating".into(),
                ))
            }
        };
        Ok(lft)
    }

    /// Relocate the subtree rooted at `node` relative to `target`.
    pub fn move_node(
        &mut self,
        node: NodeKey,
        target: NodeKey,
        pos: Option<Position>,
    ) -> Result<()> {
        let node = self.anchor(node)?;
        let mut target = self.anchor(target)?;
        let mut pos = position::prepare(pos, self.is_ordered(), position::MOVE)?;

        // Set when the subtree becomes the only child of a leaf.
        let mut new_parent: Option<Node> = None;
        if pos.is_child() {
            if target.key == node.key {
                return Err(Error::InvalidMoveToDescendant);
            }
            if target.is_leaf() {
                new_parent = Some(target.clone());
                pos = Position::LastChild;
            } else {
                target = self.last_child(&target)?.ok_or_else(|| {
                    Error::InconsistentState(format!("node {} has no last child", target.key))
                })?;
                pos = pos.sibling_equivalent();
            }
        }

        if target.is_descendant_of(&node) {
            return Err(Error::InvalidMoveToDescendant);
        }

        if target.key == node.key && self.is_stationary(&node, pos)? {
            debug!(key = %node.key, %pos, "move leaves node in place");
            return Ok(());
        }

        let width = node.width();
        let landing = match new_parent {
            Some(parent) => {
                self.shift_right(parent.tree_id, parent.rgt, false, width)?;
                Landing {
                    tree_id: parent.tree_id,
                    lft: parent.rgt,
                    depth: parent.depth + 1,
                }
            }
            None => {
                let (placement, target) = self.resolve(&target, pos, &node.payload)?;
                let (placement, target) = self.normalize(placement, target)?;
                self.open_landing(&target, placement, width)?
            }
        };

        // The shift may have renumbered the subtree itself.
        let from = self.anchor(node.key)?;
        let offset = landing.lft as i64 - from.lft as i64;
        let depth_delta = landing.depth as i64 - from.depth as i64;
        debug!(
            key = %from.key,
            from_tree = from.tree_id,
            from_lft = from.lft,
            to_tree = landing.tree_id,
            to_lft = landing.lft,
            "moving subtree"
        );
        self.store.bulk_update(
            &Filter::all()
                .tree(from.tree_id)
                .between(Field::Lft, from.lft, from.rgt),
            &[
                Update::Set(Field::TreeId, landing.tree_id),
                Update::Inc(Field::Lft, offset),
                Update::Inc(Field::Rgt, offset),
                Update::Inc(Field::Depth, depth_delta),
            ],
        )?;
        self.close_gap(from.lft, from.rgt, from.tree_id)?;
        if from.is_root() {
            self.compact_trees_after(from.tree_id)?;
        }
        Ok(())
    }

    fn is_stationary(&self, node: &Node, pos: Position) -> Result<bool> {
        Ok(match pos {
            Position::Left => true,
            Position::Right | Position::LastSibling => {
                self.last_sibling(node)?.map(|s| s.key) == Some(node.key)
            }
            Position::FirstSibling => {
                self.first_sibling(node)?.map(|s| s.key) == Some(node.key)
            }
            _ => false,
        })
    }

    fn open_landing(&mut self, target: &Node, placement: Placement, width: u64) -> Result<Landing> {
        if target.is_root() {
            let tree_id = match placement {
                Placement::LastSibling => self.next_tree_id()?,
                _ => {
                    self.shift_trees_right(target.tree_id)?;
                    target.tree_id
                }
            };
            return Ok(Landing {
                tree_id,
                lft: 1,
                depth: 1,
            });
        }
        let lft = self.open_sibling_slot(target, placement, width)?;
        Ok(Landing {
            tree_id: target.tree_id,
            lft,
            depth: target.depth,
        })
    }
}
