use std::sync::Arc;

use lace_graph::{Node, OpRegistry, fingerprint, from_flat, op_names, to_flat};
use lace_types::{Type, Value};

fn sample_graph(reg: &OpRegistry) -> lace_graph::NodeRef {
    let row = Node::constant(Value::Dict(vec![
        ("id".to_string(), Value::Int(7)),
        ("name".to_string(), Value::Text("laceweight".to_string())),
    ]));
    let name = reg.field(row, "name").unwrap();
    reg.apply(op_names::EQ, vec![name, Node::constant("laceweight")])
        .unwrap()
}

#[test]
fn json_round_trip_preserves_structure_and_identity() {
    let reg = OpRegistry::with_defaults();
    let root = sample_graph(&reg);

    let flat = to_flat(&[root.clone()]);
    let json = flat.to_json().unwrap();
    let rebuilt = from_flat(&lace_graph::FlatGraph::from_json(&json).unwrap()).unwrap();

    assert_eq!(rebuilt.len(), 1);
    assert_eq!(&*rebuilt[0], &*root);
    assert_eq!(fingerprint(&rebuilt[0]), fingerprint(&root));
    assert_eq!(rebuilt[0].ty(), &Type::BOOL);
}

#[test]
fn binary_round_trip_matches_json_round_trip() {
    let reg = OpRegistry::with_defaults();
    let root = sample_graph(&reg);

    let flat = to_flat(&[root]);
    let bytes = flat.to_bytes().unwrap();
    let decoded = lace_graph::FlatGraph::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, flat);
}

#[test]
fn shared_subgraphs_deduplicate_across_roots() {
    let reg = OpRegistry::with_defaults();
    let row = Node::constant(Value::Dict(vec![("id".to_string(), Value::Int(1))]));
    let id = reg.field(row, "id").unwrap();
    let eq = reg
        .apply(op_names::EQ, vec![id.clone(), Node::constant(1i64)])
        .unwrap();
    let ne = reg
        .apply(op_names::NE, vec![id.clone(), Node::constant(1i64)])
        .unwrap();

    let flat = to_flat(&[eq, ne]);
    // row, key, pick, 1, eq, ne: the pick chain and the constant are shared.
    assert_eq!(flat.nodes.len(), 6);

    let rebuilt = from_flat(&flat).unwrap();
    let eq_lhs = &rebuilt[0].inputs()[0];
    let ne_lhs = &rebuilt[1].inputs()[0];
    assert!(Arc::ptr_eq(eq_lhs, ne_lhs));
}

#[test]
fn flattening_a_rebuilt_graph_is_stable() {
    let reg = OpRegistry::with_defaults();
    let root = sample_graph(&reg);

    let flat = to_flat(&[root]);
    let rebuilt = from_flat(&flat).unwrap();
    let reflat = to_flat(&rebuilt);
    assert_eq!(reflat, flat);
}

#[test]
fn typed_null_constants_survive_the_wire() {
    let node = Node::constant_typed(Type::optional(Type::TEXT), Value::Null).unwrap();
    let rebuilt = from_flat(&to_flat(&[node.clone()])).unwrap();
    assert_eq!(rebuilt[0].ty(), &Type::optional(Type::TEXT));
    assert_eq!(rebuilt[0].as_const(), Some(&Value::Null));
    assert_eq!(fingerprint(&rebuilt[0]), fingerprint(&node));
}
