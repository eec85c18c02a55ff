#![forbid(unsafe_code)]
//! Nested-set forest encoding over pluggable document stores.
//! Every node carries `(tree_id, lft, rgt, depth)`; structure is derived from interval
//! containment, and mutations are expressed as scoped bulk updates so any store that can
//! filter and bulk-update rows can host a forest.

mod allocator;
pub mod bulk;
mod coalescer;
pub mod config;
mod diagnostic;
pub mod error;
pub mod filter;
pub mod ids;
pub mod memory;
mod navigator;
pub mod node;
pub mod position;
pub mod traits;
pub mod tree;

pub use bulk::BulkItem;
pub use config::TreeConfig;
pub use error::{Error, Result};
pub use filter::{Cmp, Cond, Field, Filter, Order, Update};
pub use ids::{NodeKey, TreeId};
pub use memory::MemoryNodeStore;
pub use node::{Node, NodeDraft, NodeRecord, Payload, Value, RESERVED_FIELDS};
pub use position::{resolve_sorted, sorts_after, Placement, Position};
pub use traits::{Hierarchy, NodeStore};
pub use tree::NestedSetTree;
