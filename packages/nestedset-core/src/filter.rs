use crate::ids::{NodeKey, TreeId};
use crate::node::{Node, Value};

/// Interval columns a store must be able to filter and update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    TreeId,
    Lft,
    Rgt,
    Depth,
}

impl Field {
    pub const fn column(self) -> &'static str {
        match self {
            Field::TreeId => "tree_id",
            Field::Lft => "lft",
            Field::Rgt => "rgt",
            Field::Depth => "depth",
        }
    }

    pub fn read(self, node: &Node) -> u64 {
        match self {
            Field::TreeId => node.tree_id,
            Field::Lft => node.lft,
            Field::Rgt => node.rgt,
            Field::Depth => node.depth,
        }
    }

    pub fn write(self, node: &mut Node, value: u64) {
        match self {
            Field::TreeId => node.tree_id = value,
            Field::Lft => node.lft = value,
            Field::Rgt => node.rgt = value,
            Field::Depth => node.depth = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    pub const fn operator(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        }
    }

    pub fn eval(self, lhs: u64, rhs: u64) -> bool {
        match self {
            Cmp::Eq => lhs == rhs,
            Cmp::Lt => lhs < rhs,
            Cmp::Le => lhs <= rhs,
            Cmp::Gt => lhs > rhs,
            Cmp::Ge => lhs >= rhs,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cond {
    Field(Field, Cmp, u64),
    Key(NodeKey),
    KeyIn(Vec<NodeKey>),
    /// Payload attribute equality.
    Attr(String, Value),
}

impl Cond {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Cond::Field(field, cmp, value) => cmp.eval(field.read(node), *value),
            Cond::Key(key) => node.key == *key,
            Cond::KeyIn(keys) => keys.contains(&node.key),
            Cond::Attr(name, value) => node.payload.get_or_null(name) == value,
        }
    }
}

/// Conjunction of conditions; the empty filter matches every node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conds: Vec<Cond>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn key(key: NodeKey) -> Self {
        Self::all().and(Cond::Key(key))
    }

    pub fn keys(keys: impl IntoIterator<Item = NodeKey>) -> Self {
        Self::all().and(Cond::KeyIn(keys.into_iter().collect()))
    }

    pub fn attr(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(Cond::Attr(name.into(), value.into()))
    }

    pub fn and(mut self, cond: Cond) -> Self {
        self.conds.push(cond);
        self
    }

    pub fn and_attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Cond::Attr(name.into(), value.into()))
    }

    pub fn tree(self, tree_id: TreeId) -> Self {
        self.is(Field::TreeId, tree_id)
    }

    pub fn is(self, field: Field, value: u64) -> Self {
        self.and(Cond::Field(field, Cmp::Eq, value))
    }

    pub fn lt(self, field: Field, value: u64) -> Self {
        self.and(Cond::Field(field, Cmp::Lt, value))
    }

    pub fn le(self, field: Field, value: u64) -> Self {
        self.and(Cond::Field(field, Cmp::Le, value))
    }

    pub fn gt(self, field: Field, value: u64) -> Self {
        self.and(Cond::Field(field, Cmp::Gt, value))
    }

    pub fn ge(self, field: Field, value: u64) -> Self {
        self.and(Cond::Field(field, Cmp::Ge, value))
    }

    /// Inclusive range.
    pub fn between(self, field: Field, lo: u64, hi: u64) -> Self {
        self.ge(field, lo).le(field, hi)
    }

    pub fn conditions(&self) -> &[Cond] {
        &self.conds
    }

    pub fn has_attr_conditions(&self) -> bool {
        self.conds.iter().any(|c| matches!(c, Cond::Attr(..)))
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.conds.iter().all(|c| c.matches(node))
    }
}

/// Row order returned by `NodeStore::filter`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// `tree_id asc, lft asc`.
    #[default]
    Preorder,
    /// `tree_id desc, lft desc`.
    ReversePreorder,
}

/// Scoped field write applied by `NodeStore::bulk_update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Update {
    /// Add a signed delta; negative values decrement.
    Inc(Field, i64),
    Set(Field, u64),
}

impl Update {
    pub fn field(self) -> Field {
        match self {
            Update::Inc(field, _) | Update::Set(field, _) => field,
        }
    }

    /// Applies the update to an in-memory snapshot, refusing to go below zero.
    pub fn apply(self, node: &mut Node) -> Option<()> {
        match self {
            Update::Inc(field, delta) => {
                let next = field.read(node).checked_add_signed(delta)?;
                field.write(node, next);
            }
            Update::Set(field, value) => field.write(node, value),
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Payload;

    fn sample() -> Node {
        Node {
            key: NodeKey(7),
            tree_id: 2,
            lft: 3,
            rgt: 8,
            depth: 2,
            payload: Payload::from([("desc", "23")]),
        }
    }

    #[test]
    fn conjunction_of_conditions() {
        let node = sample();
        assert!(Filter::all().matches(&node));
        assert!(Filter::all().tree(2).between(Field::Lft, 3, 8).matches(&node));
        assert!(!Filter::all().tree(2).gt(Field::Lft, 3).matches(&node));
        assert!(Filter::attr("desc", "23").tree(2).matches(&node));
        assert!(!Filter::attr("desc", "24").matches(&node));
        assert!(Filter::keys([NodeKey(1), NodeKey(7)]).matches(&node));
        assert!(Filter::attr("missing", Value::Null).matches(&node));
    }

    #[test]
    fn updates_refuse_underflow() {
        let mut node = sample();
        assert!(Update::Inc(Field::Lft, -2).apply(&mut node).is_some());
        assert_eq!(node.lft, 1);
        assert!(Update::Inc(Field::Lft, -2).apply(&mut node).is_none());
        Update::Set(Field::TreeId, 9).apply(&mut node).unwrap();
        assert_eq!(node.tree_id, 9);
    }
}
