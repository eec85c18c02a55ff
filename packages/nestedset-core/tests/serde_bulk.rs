#![cfg(feature = "serde")]

use std::collections::BTreeMap;

use nestedset_core::{
    BulkItem, MemoryNodeStore, NestedSetTree, NodeKey, Payload, TreeConfig, Value,
};
use nestedset_test_support::{base_data, with_ids};

#[test]
fn bulk_items_round_trip_through_json() {
    let data = with_ids(base_data(), 1);
    let json = serde_json::to_string(&data).unwrap();
    let parsed: Vec<BulkItem> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, data);

    let mut tree = NestedSetTree::new(MemoryNodeStore::new());
    tree.load_bulk(&parsed, None, true).unwrap();
    let dumped = serde_json::to_value(tree.dump_bulk(None, true).unwrap()).unwrap();
    assert_eq!(dumped, serde_json::to_value(&data).unwrap());
}

#[test]
fn items_without_ids_or_children_omit_those_fields() {
    let json = serde_json::to_value(&base_data()[0]).unwrap();
    assert_eq!(json, serde_json::json!({ "data": { "desc": "1" } }));
}

#[test]
fn payload_values_keep_their_kind() {
    let payload = Payload::new()
        .with("none", Value::Null)
        .with("flag", true)
        .with("count", 3)
        .with("ratio", 2.5)
        .with("name", "x")
        .with("owner", NodeKey(7))
        .with("tags", vec![Value::from("a"), Value::Int(1)])
        .with(
            "meta",
            Value::Map(BTreeMap::from([("k".to_string(), Value::from("v"))])),
        );
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "none": null,
            "flag": true,
            "count": 3,
            "ratio": 2.5,
            "name": "x",
            "owner": { "$ref": 7 },
            "tags": ["a", 1],
            "meta": { "k": "v" },
        })
    );
    let parsed: Payload = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, payload);
}

#[test]
fn tree_config_loads_from_partial_json() {
    let config: TreeConfig = serde_json::from_str(r#"{ "ordering_keys": ["desc"] }"#).unwrap();
    assert_eq!(config, TreeConfig::new().order_by(["desc"]));
    assert!(config.reference_fields.is_empty());
}
