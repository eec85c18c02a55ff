use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, trace};

use nestedset_core::{
    error::Error, Cond, Filter, Node, NodeKey, NodeRecord, NodeStore, Order, Payload, Update,
};

const COLUMNS: &str = "key, tree_id, lft, rgt, depth, payload";

fn sql_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn to_sql_int(value: u64) -> nestedset_core::Result<i64> {
    i64::try_from(value).map_err(|_| Error::Storage(format!("{value} does not fit in INTEGER")))
}

fn from_sql_int(value: i64) -> nestedset_core::Result<u64> {
    u64::try_from(value).map_err(|_| Error::Storage(format!("negative column value {value}")))
}

/// Raw row as read from `nodes`, before the payload JSON is decoded.
type RawRow = (i64, i64, i64, i64, i64, String);

fn decode(row: RawRow) -> nestedset_core::Result<Node> {
    let (key, tree_id, lft, rgt, depth, payload) = row;
    let payload: Payload =
        serde_json::from_str(&payload).map_err(|e| Error::Storage(e.to_string()))?;
    Ok(Node {
        key: NodeKey(from_sql_int(key)?),
        tree_id: from_sql_int(tree_id)?,
        lft: from_sql_int(lft)?,
        rgt: from_sql_int(rgt)?,
        depth: from_sql_int(depth)?,
        payload,
    })
}

/// `WHERE` clause for the interval and key conditions of a filter.
///
/// Payload attribute conditions are not compiled; callers re-check them in Rust.
struct Clause {
    sql: String,
    params: Vec<SqlValue>,
}

impl Clause {
    fn compile(filter: &Filter) -> nestedset_core::Result<Self> {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for cond in filter.conditions() {
            match cond {
                Cond::Field(field, cmp, value) => {
                    parts.push(format!("{} {} ?", field.column(), cmp.operator()));
                    params.push(SqlValue::Integer(to_sql_int(*value)?));
                }
                Cond::Key(key) => {
                    parts.push("key = ?".to_string());
                    params.push(SqlValue::Integer(to_sql_int(key.0)?));
                }
                Cond::KeyIn(keys) if keys.is_empty() => parts.push("0".to_string()),
                Cond::KeyIn(keys) => {
                    parts.push(format!("key IN ({})", vec!["?"; keys.len()].join(", ")));
                    for key in keys {
                        params.push(SqlValue::Integer(to_sql_int(key.0)?));
                    }
                }
                Cond::Attr(..) => {}
            }
        }
        let sql = if parts.is_empty() {
            "1".to_string()
        } else {
            parts.join(" AND ")
        };
        Ok(Self { sql, params })
    }

    fn keys(keys: &[NodeKey]) -> nestedset_core::Result<Self> {
        Self::compile(&Filter::keys(keys.iter().copied()))
    }
}

fn select(conn: &Connection, filter: &Filter, order: Order) -> nestedset_core::Result<Vec<Node>> {
    let clause = Clause::compile(filter)?;
    let direction = match order {
        Order::Preorder => "ASC",
        Order::ReversePreorder => "DESC",
    };
    let sql = format!(
        "SELECT {COLUMNS} FROM nodes WHERE {} ORDER BY tree_id {direction}, lft {direction}",
        clause.sql
    );
    trace!(%sql, "select nodes");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params_from_iter(clause.params.iter()), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })
        .map_err(sql_err)?;

    let mut nodes = Vec::new();
    for row in rows {
        let node = decode(row.map_err(sql_err)?)?;
        if filter.matches(&node) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

/// Keys bound per `key IN (...)` statement, well under SQLite's variable limit.
const KEY_CHUNK: usize = 500;

fn key_chunks(keys: &[NodeKey]) -> nestedset_core::Result<Vec<Clause>> {
    keys.chunks(KEY_CHUNK).map(Clause::keys).collect()
}

/// Narrow a filter carrying attribute conditions down to the keys it matches right now.
///
/// Yields one clause per statement; rows are matched by exactly one of them.
fn scope(conn: &Connection, filter: &Filter) -> nestedset_core::Result<Vec<Clause>> {
    if !filter.has_attr_conditions() {
        return Ok(vec![Clause::compile(filter)?]);
    }
    let keys: Vec<NodeKey> = select(conn, filter, Order::Preorder)?
        .into_iter()
        .map(|n| n.key)
        .collect();
    key_chunks(&keys)
}

/// SQLite-backed `NodeStore` keeping one row per node in a `nodes` table, payload as JSON.
pub struct SqliteNodeStore {
    conn: Connection,
}

impl SqliteNodeStore {
    pub fn new_in_memory() -> nestedset_core::Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::from_connection(conn)
    }

    pub fn new(path: &str) -> nestedset_core::Result<Self> {
        let conn = Connection::open(path).map_err(sql_err)?;
        debug!(path, "opened sqlite node store");
        Self::from_connection(conn)
    }

    /// Adopt an open connection, creating the schema when missing.
    pub fn from_connection(conn: Connection) -> nestedset_core::Result<Self> {
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&mut self) -> nestedset_core::Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS nodes (
                    key INTEGER PRIMARY KEY AUTOINCREMENT,
                    tree_id INTEGER NOT NULL CHECK (tree_id >= 0),
                    lft INTEGER NOT NULL CHECK (lft >= 0),
                    rgt INTEGER NOT NULL CHECK (rgt >= 0),
                    depth INTEGER NOT NULL CHECK (depth >= 0),
                    payload TEXT NOT NULL DEFAULT '{}'
                );
                CREATE INDEX IF NOT EXISTS idx_nodes_tree_lft ON nodes(tree_id, lft);
                CREATE INDEX IF NOT EXISTS idx_nodes_rgt ON nodes(rgt);
                CREATE INDEX IF NOT EXISTS idx_nodes_depth ON nodes(depth);",
            )
            .map_err(sql_err)?;
        Ok(())
    }
}

impl NodeStore for SqliteNodeStore {
    fn create(
        &mut self,
        key: Option<NodeKey>,
        record: NodeRecord,
    ) -> nestedset_core::Result<NodeKey> {
        let payload =
            serde_json::to_string(&record.payload).map_err(|e| Error::Storage(e.to_string()))?;
        let forced = key.map(|k| to_sql_int(k.0)).transpose()?;
        self.conn
            .execute(
                "INSERT INTO nodes (key, tree_id, lft, rgt, depth, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    forced,
                    to_sql_int(record.tree_id)?,
                    to_sql_int(record.lft)?,
                    to_sql_int(record.rgt)?,
                    to_sql_int(record.depth)?,
                    payload,
                ],
            )
            .map_err(sql_err)?;
        Ok(NodeKey(from_sql_int(self.conn.last_insert_rowid())?))
    }

    fn get(&self, key: NodeKey) -> nestedset_core::Result<Option<Node>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {COLUMNS} FROM nodes WHERE key = ?1"))
            .map_err(sql_err)?;
        let row: Option<RawRow> = stmt
            .query_row([to_sql_int(key.0)?], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .optional()
            .map_err(sql_err)?;
        row.map(decode).transpose()
    }

    fn filter(&self, filter: &Filter, order: Order) -> nestedset_core::Result<Vec<Node>> {
        select(&self.conn, filter, order)
    }

    fn bulk_update(
        &mut self,
        filter: &Filter,
        updates: &[Update],
    ) -> nestedset_core::Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction().map_err(sql_err)?;

        let mut sets = Vec::with_capacity(updates.len());
        let mut set_params = Vec::with_capacity(updates.len());
        for update in updates {
            let column = update.field().column();
            match update {
                Update::Inc(_, delta) => {
                    sets.push(format!("{column} = {column} + ?"));
                    set_params.push(SqlValue::Integer(*delta));
                }
                Update::Set(_, value) => {
                    sets.push(format!("{column} = ?"));
                    set_params.push(SqlValue::Integer(to_sql_int(*value)?));
                }
            }
        }
        let sets = sets.join(", ");

        let mut changed = 0;
        for clause in scope(&tx, filter)? {
            let sql = format!("UPDATE nodes SET {sets} WHERE {}", clause.sql);
            trace!(%sql, "bulk update");
            let params = set_params.iter().chain(clause.params.iter());
            changed += tx.execute(&sql, params_from_iter(params)).map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(changed)
    }

    fn bulk_delete(&mut self, filter: &Filter) -> nestedset_core::Result<Vec<Node>> {
        let tx = self.conn.transaction().map_err(sql_err)?;
        let removed = select(&tx, filter, Order::Preorder)?;
        let keys: Vec<NodeKey> = removed.iter().map(|n| n.key).collect();
        trace!(count = keys.len(), "bulk delete");
        for clause in key_chunks(&keys)? {
            let sql = format!("DELETE FROM nodes WHERE {}", clause.sql);
            tx.execute(&sql, params_from_iter(clause.params.iter()))
                .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestedset_core::{Field, Value};

    fn record(tree_id: u64, lft: u64, rgt: u64, desc: &str) -> NodeRecord {
        NodeRecord {
            tree_id,
            lft,
            rgt,
            depth: 1,
            payload: Payload::new().with("desc", desc),
        }
    }

    #[test]
    fn payload_survives_json_column() {
        let mut store = SqliteNodeStore::new_in_memory().unwrap();
        let payload = Payload::new()
            .with("desc", "x")
            .with("n", 3)
            .with("ratio", 0.5)
            .with("flag", true)
            .with("owner", NodeKey(9))
            .with("none", Value::Null)
            .with("tags", vec![Value::from("x"), Value::Float(1.5)]);
        let key = store
            .create(
                None,
                NodeRecord {
                    tree_id: 1,
                    lft: 1,
                    rgt: 2,
                    depth: 1,
                    payload: payload.clone(),
                },
            )
            .unwrap();
        assert_eq!(store.get(key).unwrap().unwrap().payload, payload);
        assert!(store.get(NodeKey(404)).unwrap().is_none());
    }

    #[test]
    fn forced_keys_collide_as_storage_errors() {
        let mut store = SqliteNodeStore::new_in_memory().unwrap();
        store.create(Some(NodeKey(5)), record(1, 1, 2, "a")).unwrap();
        assert!(matches!(
            store.create(Some(NodeKey(5)), record(2, 1, 2, "b")),
            Err(Error::Storage(_))
        ));
        assert_eq!(store.create(None, record(2, 1, 2, "c")).unwrap(), NodeKey(6));
    }

    #[test]
    fn updates_see_pre_update_values() {
        let mut store = SqliteNodeStore::new_in_memory().unwrap();
        store.create(None, record(1, 1, 4, "root")).unwrap();
        store.create(None, record(1, 2, 3, "leaf")).unwrap();

        let changed = store
            .bulk_update(
                &Filter::all().tree(1).ge(Field::Lft, 2),
                &[Update::Set(Field::TreeId, 2), Update::Inc(Field::Lft, 5)],
            )
            .unwrap();
        assert_eq!(changed, 1);
        let moved = store.filter(&Filter::all().tree(2), Order::Preorder).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].lft, 7);
    }

    #[test]
    fn negative_results_fail_without_partial_writes() {
        let mut store = SqliteNodeStore::new_in_memory().unwrap();
        store.create(None, record(1, 1, 4, "root")).unwrap();
        store.create(None, record(1, 2, 3, "leaf")).unwrap();
        assert!(store
            .bulk_update(&Filter::all(), &[Update::Inc(Field::Lft, -2)])
            .is_err());
        let lfts: Vec<u64> = store
            .filter(&Filter::all(), Order::Preorder)
            .unwrap()
            .iter()
            .map(|n| n.lft)
            .collect();
        assert_eq!(lfts, vec![1, 2]);
    }

    #[test]
    fn attribute_filters_scope_updates_and_deletes() {
        let mut store = SqliteNodeStore::new_in_memory().unwrap();
        store.create(None, record(1, 1, 2, "keep")).unwrap();
        store.create(None, record(2, 1, 2, "drop")).unwrap();
        store.create(None, record(3, 1, 2, "drop")).unwrap();

        let changed = store
            .bulk_update(&Filter::attr("desc", "keep"), &[Update::Inc(Field::Depth, 1)])
            .unwrap();
        assert_eq!(changed, 1);

        let removed = store.bulk_delete(&Filter::attr("desc", "drop")).unwrap();
        assert_eq!(removed.iter().map(|n| n.tree_id).collect::<Vec<_>>(), vec![2, 3]);
        let left = store.filter(&Filter::all(), Order::ReversePreorder).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].depth, 2);
        assert!(store.filter(&Filter::keys([]), Order::Preorder).unwrap().is_empty());
    }

    #[test]
    fn attribute_scopes_larger_than_one_statement() {
        let mut store = SqliteNodeStore::new_in_memory().unwrap();
        let count = KEY_CHUNK as u64 * 2 + 7;
        for tree_id in 1..=count {
            store.create(None, record(tree_id, 1, 2, "bulk")).unwrap();
        }

        let changed = store
            .bulk_update(&Filter::attr("desc", "bulk"), &[Update::Inc(Field::Depth, 1)])
            .unwrap();
        assert_eq!(changed as u64, count);

        let removed = store.bulk_delete(&Filter::attr("desc", "bulk")).unwrap();
        assert_eq!(removed.len() as u64, count);
        assert!(removed.iter().all(|n| n.depth == 2));
        assert!(store.filter(&Filter::all(), Order::Preorder).unwrap().is_empty());
    }
}
