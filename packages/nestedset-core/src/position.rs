use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::node::{Node, Payload};

/// Placement token describing where a new or moved node attaches relative to an anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Position {
    FirstSibling,
    Left,
    Right,
    LastSibling,
    SortedSibling,
    FirstChild,
    LastChild,
    SortedChild,
}

impl Position {
    pub const fn as_str(self) -> &'static str {
        match self {
            Position::FirstSibling => "first-sibling",
            Position::Left => "left",
            Position::Right => "right",
            Position::LastSibling => "last-sibling",
            Position::SortedSibling => "sorted-sibling",
            Position::FirstChild => "first-child",
            Position::LastChild => "last-child",
            Position::SortedChild => "sorted-child",
        }
    }

    pub const fn is_child(self) -> bool {
        matches!(
            self,
            Position::FirstChild | Position::LastChild | Position::SortedChild
        )
    }

    pub const fn is_sorted(self) -> bool {
        matches!(self, Position::SortedSibling | Position::SortedChild)
    }

    /// The sibling token equivalent to a child token when aimed at the last child.
    pub const fn sibling_equivalent(self) -> Position {
        match self {
            Position::FirstChild => Position::FirstSibling,
            Position::LastChild => Position::LastSibling,
            Position::SortedChild => Position::SortedSibling,
            other => other,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "first-sibling" => Position::FirstSibling,
            "left" => Position::Left,
            "right" => Position::Right,
            "last-sibling" => Position::LastSibling,
            "sorted-sibling" => Position::SortedSibling,
            "first-child" => Position::FirstChild,
            "last-child" => Position::LastChild,
            "sorted-child" => Position::SortedChild,
            other => return Err(Error::InvalidPosition(format!("unknown token {other:?}"))),
        })
    }
}

/// Primitive direction after resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    FirstSibling,
    Left,
    Right,
    LastSibling,
}

impl Placement {
    pub(crate) fn from_position(pos: Position) -> Result<Self> {
        match pos {
            Position::FirstSibling => Ok(Placement::FirstSibling),
            Position::Left => Ok(Placement::Left),
            Position::Right => Ok(Placement::Right),
            Position::LastSibling => Ok(Placement::LastSibling),
            other => Err(Error::InvalidPosition(format!(
                "{other} has no direct sibling placement"
            ))),
        }
    }
}

/// Tokens a caller may pass, and the sorted subset required once ordering keys are set.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Allowed {
    pub method: &'static str,
    pub valid: &'static [Position],
    pub sorted: &'static [Position],
}

pub(crate) const ADD_SIBLING: Allowed = Allowed {
    method: "add_sibling",
    valid: &[
        Position::FirstSibling,
        Position::Left,
        Position::Right,
        Position::LastSibling,
        Position::SortedSibling,
    ],
    sorted: &[Position::SortedSibling],
};

pub(crate) const MOVE: Allowed = Allowed {
    method: "move",
    valid: &[
        Position::FirstSibling,
        Position::Left,
        Position::Right,
        Position::LastSibling,
        Position::SortedSibling,
        Position::FirstChild,
        Position::LastChild,
        Position::SortedChild,
    ],
    sorted: &[Position::SortedSibling, Position::SortedChild],
};

/// Validate a requested token against the allowed set and the ordering mode.
pub(crate) fn prepare(pos: Option<Position>, ordered: bool, allowed: Allowed) -> Result<Position> {
    let pos = pos.unwrap_or(if ordered {
        Position::SortedSibling
    } else {
        Position::LastSibling
    });
    if !allowed.valid.contains(&pos) {
        return Err(Error::InvalidPosition(format!(
            "{pos} is not accepted by {}",
            allowed.method
        )));
    }
    let sorted = allowed.sorted.contains(&pos);
    if ordered && !sorted {
        let names: Vec<&str> = allowed.sorted.iter().map(|p| p.as_str()).collect();
        return Err(Error::InvalidPosition(format!(
            "must use {} in {} when ordering keys are configured",
            names.join(" or "),
            allowed.method
        )));
    }
    if sorted && !ordered {
        return Err(Error::MissingNodeOrderBy(format!(
            "{pos} needs ordering keys in the tree config"
        )));
    }
    Ok(pos)
}

/// Whether `existing` sorts strictly after `candidate`: `k1 > v1`, or `k1 == v1 && k2 > v2`,
/// and so on.
pub fn sorts_after(keys: &[String], existing: &Payload, candidate: &Payload) -> bool {
    for key in keys {
        match existing
            .get_or_null(key)
            .compare(candidate.get_or_null(key))
        {
            Some(Ordering::Greater) => return true,
            Some(Ordering::Equal) => continue,
            Some(Ordering::Less) | None => return false,
        }
    }
    false
}

/// Resolve a sorted placement against siblings in interval order.
///
/// Returns `(Left, first greater sibling)` or `(LastSibling, last sibling)`; `None` when the
/// sibling list is empty.
pub fn resolve_sorted(
    keys: &[String],
    siblings: Vec<Node>,
    candidate: &Payload,
) -> Option<(Placement, Node)> {
    let mut last = None;
    for sibling in siblings {
        if sorts_after(keys, &sibling.payload, candidate) {
            return Some((Placement::Left, sibling));
        }
        last = Some(sibling);
    }
    last.map(|node| (Placement::LastSibling, node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeKey;

    fn keys() -> Vec<String> {
        vec!["val1".into(), "val2".into(), "desc".into()]
    }

    fn sibling(key: u64, val1: i64, val2: i64, desc: &str) -> Node {
        Node {
            key: NodeKey(key),
            tree_id: key,
            lft: 1,
            rgt: 2,
            depth: 1,
            payload: Payload::new()
                .with("val1", val1)
                .with("val2", val2)
                .with("desc", desc),
        }
    }

    #[test]
    fn tokens_round_trip_through_strings() {
        for pos in MOVE.valid {
            assert_eq!(pos.as_str().parse::<Position>().unwrap(), *pos);
        }
        assert!(matches!(
            "middle".parse::<Position>(),
            Err(Error::InvalidPosition(_))
        ));
    }

    #[test]
    fn default_token_follows_ordering_mode() {
        assert_eq!(prepare(None, false, ADD_SIBLING).unwrap(), Position::LastSibling);
        assert_eq!(prepare(None, true, MOVE).unwrap(), Position::SortedSibling);
    }

    #[test]
    fn rejects_tokens_outside_the_allowed_set() {
        assert!(matches!(
            prepare(Some(Position::FirstChild), false, ADD_SIBLING),
            Err(Error::InvalidPosition(_))
        ));
        assert!(matches!(
            prepare(Some(Position::Left), true, ADD_SIBLING),
            Err(Error::InvalidPosition(_))
        ));
        assert!(matches!(
            prepare(Some(Position::SortedChild), false, MOVE),
            Err(Error::MissingNodeOrderBy(_))
        ));
        assert_eq!(
            prepare(Some(Position::SortedChild), true, MOVE).unwrap(),
            Position::SortedChild
        );
    }

    #[test]
    fn sorted_resolution_is_lexicographic_and_stable() {
        let siblings = vec![
            sibling(1, 1, 4, "bcd"),
            sibling(2, 2, 5, "zxy"),
            sibling(3, 3, 3, "zxy"),
        ];
        let candidate = Payload::new().with("val1", 2).with("val2", 5).with("desc", "zxy");
        let (placement, target) = resolve_sorted(&keys(), siblings.clone(), &candidate).unwrap();
        assert_eq!(placement, Placement::Left);
        assert_eq!(target.key, NodeKey(3));

        let candidate = Payload::new().with("val1", 9).with("val2", 0).with("desc", "a");
        let (placement, target) = resolve_sorted(&keys(), siblings, &candidate).unwrap();
        assert_eq!(placement, Placement::LastSibling);
        assert_eq!(target.key, NodeKey(3));

        assert!(resolve_sorted(&keys(), Vec::new(), &candidate).is_none());
    }
}
