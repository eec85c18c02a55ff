use thiserror::Error;

use crate::ids::NodeKey;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("missing node ordering keys: {0}")]
    MissingNodeOrderBy(String),
    #[error("node {0} is already saved")]
    NodeAlreadySaved(NodeKey),
    #[error("cannot move a node to one of its descendants")]
    InvalidMoveToDescendant,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}
