//! Tests for schema types, name resolution and context tree compilation.

use avro_tokens::reader::{ContextNode, ContextTree, ScalarDecoder};
use avro_tokens::schema::*;
use avro_tokens::SchemaError;

// ============================================================================
// Schema Type Tests
// ============================================================================

#[test]
fn test_primitive_types() {
    assert!(AvroSchema::Null.is_primitive());
    assert!(AvroSchema::Boolean.is_primitive());
    assert!(AvroSchema::Int.is_primitive());
    assert!(AvroSchema::Long.is_primitive());
    assert!(AvroSchema::Float.is_primitive());
    assert!(AvroSchema::Double.is_primitive());
    assert!(AvroSchema::Bytes.is_primitive());
    assert!(AvroSchema::String.is_primitive());
    assert!(!AvroSchema::Named("X".into()).is_primitive());
}

#[test]
fn test_named_types() {
    assert!(AvroSchema::Record(RecordSchema::new("R", vec![])).is_named());
    assert!(AvroSchema::Enum(EnumSchema::new("E", vec!["A".into()])).is_named());
    assert!(AvroSchema::Fixed(FixedSchema::new("F", 2)).is_named());
    // A reference names a type but does not define one
    assert!(!AvroSchema::Named("R".into()).is_named());
    assert!(!AvroSchema::Map(Box::new(AvroSchema::Int)).is_named());
}

#[test]
fn test_schema_json_is_accepted_by_apache_avro() {
    let schema = AvroSchema::Record(
        RecordSchema::new(
            "Order",
            vec![
                FieldSchema::new("id", AvroSchema::Fixed(FixedSchema::new("OrderId", 8))),
                FieldSchema::new(
                    "status",
                    AvroSchema::Enum(EnumSchema::new("Status", vec!["OPEN".into(), "DONE".into()])),
                ),
                FieldSchema::new(
                    "lines",
                    AvroSchema::Array(Box::new(AvroSchema::Map(Box::new(AvroSchema::Double)))),
                ),
                FieldSchema::new(
                    "note",
                    AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::String]),
                )
                .with_default(serde_json::Value::Null),
                FieldSchema::new("copy", AvroSchema::Named("OrderId".into())),
            ],
        )
        .with_namespace("shop"),
    );

    let parsed = apache_avro::Schema::parse_str(&schema.to_json());
    assert!(parsed.is_ok(), "{:?}: {}", parsed.err(), schema);
}

// ============================================================================
// Name Resolution Tests
// ============================================================================

#[test]
fn test_resolution_context_registers_nested_names() {
    let inner = AvroSchema::Enum(EnumSchema::new("Color", vec!["RED".into()]));
    let schema = AvroSchema::Record(
        RecordSchema::new("Paint", vec![FieldSchema::new("color", inner)])
            .with_namespace("art"),
    );

    let context = SchemaResolutionContext::build_from_schema(&schema).unwrap();
    assert!(context.contains("art.Paint"));
    assert!(context.contains("art.Color"));
    assert_eq!(context.len(), 2);

    let (fullname, _) = context.lookup("Color", Some("art")).unwrap();
    assert_eq!(fullname, "art.Color");
    assert!(context.lookup("Color", Some("other")).is_none());
}

#[test]
fn test_conflicting_redefinition_is_rejected() {
    let schema = AvroSchema::Record(RecordSchema::new(
        "Twice",
        vec![
            FieldSchema::new("a", AvroSchema::Fixed(FixedSchema::new("F", 4))),
            FieldSchema::new("b", AvroSchema::Fixed(FixedSchema::new("F", 8))),
        ],
    ));
    assert!(matches!(
        ContextTree::build(&schema),
        Err(SchemaError::MalformedSchema(_))
    ));
}

#[test]
fn test_reference_across_namespaces() {
    let shared = AvroSchema::Fixed(FixedSchema::new("Hash", 4).with_namespace("common"));
    let schema = AvroSchema::Record(
        RecordSchema::new(
            "Blob",
            vec![
                FieldSchema::new("first", shared),
                FieldSchema::new("second", AvroSchema::Named("common.Hash".into())),
            ],
        )
        .with_namespace("store"),
    );

    let tree = ContextTree::build(&schema).unwrap();
    let hash = tree.named_node("common.Hash").unwrap();
    assert_eq!(
        tree.node(hash),
        &ContextNode::Dedicated(ScalarDecoder::Fixed { size: 4 })
    );
    assert!(tree.named_node("store.Blob").is_some());
}

// ============================================================================
// Structural Validation Tests
// ============================================================================

fn assert_malformed(schema: AvroSchema) {
    match ContextTree::build(&schema) {
        Err(SchemaError::MalformedSchema(_)) => {}
        other => panic!("Expected MalformedSchema for {}, got {:?}", schema, other),
    }
}

#[test]
fn test_malformed_unions() {
    assert_malformed(AvroSchema::Union(vec![]));
    assert_malformed(AvroSchema::Union(vec![
        AvroSchema::Null,
        AvroSchema::Union(vec![AvroSchema::Int]),
    ]));
    assert_malformed(AvroSchema::Union(vec![AvroSchema::String, AvroSchema::String]));
    assert_malformed(AvroSchema::Union(vec![
        AvroSchema::Array(Box::new(AvroSchema::Int)),
        AvroSchema::Array(Box::new(AvroSchema::String)),
    ]));
}

#[test]
fn test_union_of_distinct_named_types_is_valid() {
    let schema = AvroSchema::Union(vec![
        AvroSchema::Fixed(FixedSchema::new("A", 1)),
        AvroSchema::Fixed(FixedSchema::new("B", 1)),
    ]);
    assert!(ContextTree::build(&schema).is_ok());
}

#[test]
fn test_malformed_enums() {
    assert_malformed(AvroSchema::Enum(EnumSchema::new("Empty", vec![])));
    assert_malformed(AvroSchema::Enum(EnumSchema::new(
        "Dup",
        vec!["A".into(), "A".into()],
    )));
}

#[test]
fn test_unresolved_reference() {
    assert_malformed(AvroSchema::Record(RecordSchema::new(
        "Holder",
        vec![FieldSchema::new("x", AvroSchema::Named("Missing".into()))],
    )));
}

#[test]
fn test_unsupported_logical_types() {
    for base in [
        AvroSchema::Record(RecordSchema::new("R", vec![])),
        AvroSchema::Map(Box::new(AvroSchema::Int)),
        AvroSchema::Logical(LogicalType::new(AvroSchema::Int, LogicalTypeName::Date)),
    ] {
        let schema = AvroSchema::Logical(LogicalType::new(base, LogicalTypeName::Uuid));
        assert!(matches!(
            ContextTree::build(&schema),
            Err(SchemaError::UnsupportedType(_))
        ));
    }
}

#[test]
fn test_decimal_over_fixed_is_supported() {
    let schema = AvroSchema::Logical(LogicalType::new(
        AvroSchema::Fixed(FixedSchema::new("Money", 8)),
        LogicalTypeName::Decimal {
            precision: 10,
            scale: 2,
        },
    ));
    let tree = ContextTree::build(&schema).unwrap();
    assert_eq!(
        tree.node(tree.root()),
        &ContextNode::Dedicated(ScalarDecoder::Fixed { size: 8 })
    );
}

// ============================================================================
// Compilation Tests
// ============================================================================

#[test]
fn test_tree_size_is_bounded_by_schema() {
    // Deeply self-referential shape: Tree { kids: map<array<union{null, Tree}>> }
    let schema = AvroSchema::Record(RecordSchema::new(
        "Tree",
        vec![FieldSchema::new(
            "kids",
            AvroSchema::Map(Box::new(AvroSchema::Array(Box::new(AvroSchema::Union(
                vec![AvroSchema::Null, AvroSchema::Named("Tree".into())],
            ))))),
        )],
    ));
    let tree = ContextTree::build(&schema).unwrap();
    // record, null, union, array, map
    assert_eq!(tree.len(), 5);
    for (_, node) in tree.nodes() {
        if let ContextNode::Union { branches } = node {
            assert_eq!(branches[1], tree.root());
        }
    }
}

#[test]
fn test_each_build_starts_fresh() {
    let schema = AvroSchema::Record(RecordSchema::new(
        "Solo",
        vec![FieldSchema::new("n", AvroSchema::Long)],
    ));
    let first = ContextTree::build(&schema).unwrap();
    let second = ContextTree::build(&schema).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(first.node(first.root()), second.node(second.root()));
}
