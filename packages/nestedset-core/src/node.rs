use std::cmp::Ordering;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::{NodeKey, TreeId};

/// Field names owned by the interval encoding. They never survive into dumped payloads.
pub const RESERVED_FIELDS: &[&str] = &["key", "id", "tree_id", "lft", "rgt", "depth"];

/// A single payload attribute.
///
/// Serializes as plain JSON; `Ref` is written as `{"$ref": key}`, so an object holding only a
/// `$ref` field reads back as a reference rather than a `Map`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Resolved reference to another node.
    Ref(#[cfg_attr(feature = "serde", serde(with = "ref_key"))] NodeKey),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

#[cfg(feature = "serde")]
mod ref_key {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::ids::NodeKey;

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Tagged {
        #[serde(rename = "$ref")]
        key: NodeKey,
    }

    pub fn serialize<S: Serializer>(key: &NodeKey, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged { key: *key }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NodeKey, D::Error> {
        Tagged::deserialize(deserializer).map(|tagged| tagged.key)
    }
}

impl Value {
    /// Ordering used by sorted placement.
    ///
    /// Numbers compare across `Int`/`Float` and lists compare element-wise; maps and values of
    /// different kinds are incomparable and yield `None`, so they are neither greater nor equal.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Ref(a), Value::Ref(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<NodeKey> for Value {
    fn from(value: NodeKey) -> Self {
        Value::Ref(value)
    }
}

const NULL: Value = Value::Null;

/// Opaque attribute map carried by every node.
///
/// The core only reads the configured ordering keys and reference fields.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Missing fields read as `Null`.
    pub fn get_or_null(&self, field: &str) -> &Value {
        self.0.get(field).unwrap_or(&NULL)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn without_reserved(mut self) -> Self {
        for field in RESERVED_FIELDS {
            self.0.remove(*field);
        }
        self
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Payload {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Interval coordinates of a node, without its key.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRecord {
    pub tree_id: TreeId,
    pub lft: u64,
    pub rgt: u64,
    pub depth: u64,
    pub payload: Payload,
}

/// A persisted node snapshot.
///
/// Snapshots go stale as soon as any structural mutation runs; re-read through the tree
/// before relying on the coordinates again.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub key: NodeKey,
    pub tree_id: TreeId,
    pub lft: u64,
    pub rgt: u64,
    pub depth: u64,
    pub payload: Payload,
}

impl Node {
    pub fn from_record(key: NodeKey, record: NodeRecord) -> Self {
        Self {
            key,
            tree_id: record.tree_id,
            lft: record.lft,
            rgt: record.rgt,
            depth: record.depth,
            payload: record.payload,
        }
    }

    pub fn is_root(&self) -> bool {
        self.lft == 1
    }

    pub fn is_leaf(&self) -> bool {
        self.rgt.checked_sub(self.lft) == Some(1)
    }

    pub fn get_depth(&self) -> u64 {
        self.depth
    }

    pub fn descendant_count(&self) -> u64 {
        self.rgt.saturating_sub(self.lft).saturating_sub(1) / 2
    }

    /// Interval containment: `other` lies strictly inside `self` in the same tree.
    pub fn is_ancestor_of(&self, other: &Node) -> bool {
        self.tree_id == other.tree_id && self.lft < other.lft && other.rgt < self.rgt
    }

    pub fn is_descendant_of(&self, other: &Node) -> bool {
        other.is_ancestor_of(self)
    }

    /// Width of the subtree rooted here, in interval slots.
    pub fn width(&self) -> u64 {
        self.rgt.saturating_sub(self.lft) + 1
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }
}

/// A node that has not been persisted yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeDraft {
    /// Forces the store key; must not be in use.
    pub key: Option<NodeKey>,
    pub payload: Payload,
}

impl NodeDraft {
    pub fn new(payload: Payload) -> Self {
        Self { key: None, payload }
    }

    pub fn with_key(mut self, key: NodeKey) -> Self {
        self.key = Some(key);
        self
    }
}

impl From<Payload> for NodeDraft {
    fn from(payload: Payload) -> Self {
        Self::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(tree_id: TreeId, lft: u64, rgt: u64) -> Node {
        Node {
            key: NodeKey(lft),
            tree_id,
            lft,
            rgt,
            depth: 1,
            payload: Payload::new(),
        }
    }

    #[test]
    fn interval_predicates() {
        let root = node(1, 1, 8);
        let inner = node(1, 2, 5);
        let leaf = node(1, 3, 4);
        let other_tree = node(2, 3, 4);

        assert!(root.is_root());
        assert!(!inner.is_root());
        assert!(leaf.is_leaf());
        assert_eq!(root.descendant_count(), 3);
        assert_eq!(inner.width(), 4);
        assert!(root.is_ancestor_of(&leaf));
        assert!(leaf.is_descendant_of(&inner));
        assert!(!root.is_ancestor_of(&other_tree));
        assert!(!root.is_ancestor_of(&root));
    }

    #[test]
    fn mixed_kinds_are_incomparable() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::Int(1).compare(&Value::from("1")), None);
        assert_eq!(Value::Null.compare(&Value::Null), Some(Ordering::Equal));
    }

    #[test]
    fn torn_intervals_do_not_underflow() {
        let torn = node(1, 40, 9);
        assert!(!torn.is_leaf());
        assert_eq!(torn.descendant_count(), 0);
        assert_eq!(torn.width(), 1);
    }

    #[test]
    fn lists_compare_element_wise() {
        let short = Value::from(vec![Value::Int(1), Value::from("a")]);
        let long = Value::from(vec![Value::Int(1), Value::from("a"), Value::Null]);
        let bigger = Value::from(vec![Value::Int(2)]);
        assert_eq!(short.compare(&long), Some(Ordering::Less));
        assert_eq!(bigger.compare(&long), Some(Ordering::Greater));
        assert_eq!(short.compare(&Value::Map(BTreeMap::new())), None);
    }

    #[test]
    fn reserved_fields_are_stripped() {
        let payload = Payload::from([("desc", Value::from("x")), ("lft", Value::Int(3))])
            .with("tree_id", 1);
        let stripped = payload.without_reserved();
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped.get("desc"), Some(&Value::from("x")));
    }
}
