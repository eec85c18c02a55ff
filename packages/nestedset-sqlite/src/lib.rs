#![forbid(unsafe_code)]
//! SQLite storage for nested-set forests.
//! `SqliteNodeStore` implements `nestedset_core::NodeStore` over a single `nodes` table, so a
//! `NestedSetTree` can run unchanged against an in-memory or on-disk SQLite database.

mod storage;

pub use storage::SqliteNodeStore;

use nestedset_core::{NestedSetTree, TreeConfig};

/// Open an on-disk forest at `path` with the given tree settings.
pub fn open_forest(
    path: &str,
    config: TreeConfig,
) -> nestedset_core::Result<NestedSetTree<SqliteNodeStore>> {
    Ok(NestedSetTree::with_config(SqliteNodeStore::new(path)?, config))
}
