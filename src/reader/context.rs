//! Schema-to-context compilation.
//!
//! [`ContextTree::build`] walks a schema once and produces an arena of
//! [`ContextNode`]s. Every Avro type maps to one of three shapes:
//!
//! | Schema type                                   | Node                               |
//! |-----------------------------------------------|------------------------------------|
//! | null, boolean, int, long, float, double, string | shared static scalar decoder     |
//! | bytes, fixed, enum                            | dedicated scalar decoder           |
//! | array, map, record, union                     | structured node with child node ids |
//!
//! Named types are memoized by full name for the duration of one build. A
//! record's node id is registered before its fields are compiled, so a
//! field that refers back to the record (directly or through unions,
//! arrays and maps) resolves to the existing id instead of recursing. The
//! tree size is therefore bounded by the schema, never by the depth of the
//! data it will decode.
//!
//! The compiled tree is immutable and can be shared between any number of
//! token streams, on any threads.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::scalar::{
    ScalarDecoder, BOOLEAN_DECODER, DOUBLE_DECODER, FLOAT_DECODER, INT_DECODER, LONG_DECODER,
    NULL_DECODER, STRING_DECODER,
};
use crate::error::SchemaError;
use crate::schema::{
    namespace_of, qualify, validate_enum, validate_record, validate_union, AvroSchema,
    RecordSchema, SchemaResolutionContext,
};

/// Index of a node in a [`ContextTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A compiled decoding context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextNode {
    /// Shared singleton for a parameterless primitive
    Scalar(&'static ScalarDecoder),
    /// Per-occurrence decoder for bytes, fixed and enum
    Dedicated(ScalarDecoder),
    Array { items: NodeId },
    /// Keys are always strings
    Map { values: NodeId },
    Record(RecordNode),
    /// Branch index is read from the stream at decode time
    Union { branches: Vec<NodeId> },
}

/// Compiled record: fields in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordNode {
    pub name: String,
    pub fields: Vec<FieldNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: Arc<str>,
    pub node: NodeId,
}

impl ContextNode {
    /// Whether decoding this node opens a scope (array, map or record).
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            ContextNode::Array { .. } | ContextNode::Map { .. } | ContextNode::Record(_)
        )
    }

    pub fn scalar(&self) -> Option<&ScalarDecoder> {
        match self {
            ContextNode::Scalar(s) => Some(s),
            ContextNode::Dedicated(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ContextNode::Scalar(s) => s.type_name(),
            ContextNode::Dedicated(s) => s.type_name(),
            ContextNode::Array { .. } => "array",
            ContextNode::Map { .. } => "map",
            ContextNode::Record(_) => "record",
            ContextNode::Union { .. } => "union",
        }
    }
}

/// Immutable arena of compiled contexts rooted at the top-level schema.
#[derive(Debug, Clone)]
pub struct ContextTree {
    nodes: Vec<ContextNode>,
    root: NodeId,
    named: HashMap<String, NodeId>,
}

impl ContextTree {
    /// Compile `schema` into a context tree.
    ///
    /// # Errors
    /// - `SchemaError::MalformedSchema` for structural defects: duplicate
    ///   field names, empty or ambiguous unions, unions nested directly in
    ///   unions, empty or duplicate enum symbols, unresolved references,
    ///   conflicting redefinitions of a name
    /// - `SchemaError::UnsupportedType` for a logical annotation over a
    ///   type that cannot carry one
    pub fn build(schema: &AvroSchema) -> Result<Self, SchemaError> {
        ContextBuilder::new(schema)?.build(schema)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ContextNode {
        &self.nodes[id.0]
    }

    /// Number of compiled nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node compiled for a named type, by full name.
    pub fn named_node(&self, fullname: &str) -> Option<NodeId> {
        self.named.get(fullname).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ContextNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Whether every value of `node` encodes to zero bytes: null, empty
    /// fixed, and records built only from those.
    pub fn is_zero_width(&self, node: NodeId) -> bool {
        self.zero_width(node, &mut Vec::new())
    }

    fn zero_width(&self, node: NodeId, visiting: &mut Vec<NodeId>) -> bool {
        match self.node(node) {
            ContextNode::Scalar(s) => {
                matches!(s, ScalarDecoder::Null | ScalarDecoder::Fixed { size: 0 })
            }
            ContextNode::Dedicated(s) => {
                matches!(s, ScalarDecoder::Null | ScalarDecoder::Fixed { size: 0 })
            }
            ContextNode::Record(record) => {
                if visiting.contains(&node) {
                    return false;
                }
                visiting.push(node);
                let zero = record
                    .fields
                    .iter()
                    .all(|field| self.zero_width(field.node, visiting));
                visiting.pop();
                zero
            }
            _ => false,
        }
    }
}

/// One-shot compiler from schema to [`ContextTree`].
///
/// The memoization tables live here and are dropped with the builder, so
/// every compilation starts from a private cache.
struct ContextBuilder {
    registry: SchemaResolutionContext,
    nodes: Vec<ContextNode>,
    named: HashMap<String, NodeId>,
    shared: HashMap<&'static str, NodeId>,
}

impl ContextBuilder {
    fn new(schema: &AvroSchema) -> Result<Self, SchemaError> {
        Ok(Self {
            registry: SchemaResolutionContext::build_from_schema(schema)?,
            nodes: Vec::new(),
            named: HashMap::new(),
            shared: HashMap::new(),
        })
    }

    fn build(mut self, schema: &AvroSchema) -> Result<ContextTree, SchemaError> {
        let root = self.compile(schema, None)?;
        debug!(
            nodes = self.nodes.len(),
            named_types = self.named.len(),
            root_type = self.nodes[root.0].type_name(),
            "Compiled context tree"
        );
        Ok(ContextTree {
            nodes: self.nodes,
            root,
            named: self.named,
        })
    }

    fn push(&mut self, node: ContextNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Reuse the single node for a shared primitive decoder.
    fn shared_scalar(&mut self, decoder: &'static ScalarDecoder) -> NodeId {
        let key = decoder.type_name();
        if let Some(&id) = self.shared.get(key) {
            return id;
        }
        let id = self.push(ContextNode::Scalar(decoder));
        self.shared.insert(key, id);
        id
    }

    fn compile(&mut self, schema: &AvroSchema, ns: Option<&str>) -> Result<NodeId, SchemaError> {
        match schema {
            AvroSchema::Null => Ok(self.shared_scalar(&NULL_DECODER)),
            AvroSchema::Boolean => Ok(self.shared_scalar(&BOOLEAN_DECODER)),
            AvroSchema::Int => Ok(self.shared_scalar(&INT_DECODER)),
            AvroSchema::Long => Ok(self.shared_scalar(&LONG_DECODER)),
            AvroSchema::Float => Ok(self.shared_scalar(&FLOAT_DECODER)),
            AvroSchema::Double => Ok(self.shared_scalar(&DOUBLE_DECODER)),
            AvroSchema::String => Ok(self.shared_scalar(&STRING_DECODER)),

            AvroSchema::Bytes => Ok(self.push(ContextNode::Dedicated(ScalarDecoder::Bytes))),

            AvroSchema::Fixed(fixed) => {
                let fullname = qualify(&fixed.name, ns);
                if let Some(&id) = self.named.get(&fullname) {
                    return Ok(id);
                }
                let id = self.push(ContextNode::Dedicated(ScalarDecoder::Fixed {
                    size: fixed.size,
                }));
                self.named.insert(fullname, id);
                Ok(id)
            }

            AvroSchema::Enum(enum_schema) => {
                let fullname = qualify(&enum_schema.name, ns);
                if let Some(&id) = self.named.get(&fullname) {
                    return Ok(id);
                }
                validate_enum(enum_schema)?;
                let id = self.push(ContextNode::Dedicated(ScalarDecoder::Enum {
                    symbols: enum_schema.symbols.clone().into(),
                }));
                self.named.insert(fullname, id);
                Ok(id)
            }

            AvroSchema::Array(items) => {
                let items = self.compile(items, ns)?;
                Ok(self.push(ContextNode::Array { items }))
            }

            AvroSchema::Map(values) => {
                let values = self.compile(values, ns)?;
                Ok(self.push(ContextNode::Map { values }))
            }

            AvroSchema::Record(record) => self.compile_record(record, ns),

            AvroSchema::Union(variants) => {
                let registry = &self.registry;
                validate_union(variants, |branch| match branch {
                    AvroSchema::Record(r) => Some(qualify(&r.name, ns)),
                    AvroSchema::Enum(e) => Some(qualify(&e.name, ns)),
                    AvroSchema::Fixed(f) => Some(qualify(&f.name, ns)),
                    AvroSchema::Named(reference) => Some(
                        registry
                            .lookup(reference, ns)
                            .map(|(fullname, _)| fullname)
                            .unwrap_or_else(|| reference.clone()),
                    ),
                    _ => None,
                })?;

                let branches = variants
                    .iter()
                    .map(|variant| self.compile(variant, ns))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.push(ContextNode::Union { branches }))
            }

            AvroSchema::Named(reference) => self.compile_reference(reference, ns),

            AvroSchema::Logical(logical) => {
                let base = logical.base.as_ref();
                let effective = match base {
                    AvroSchema::Named(reference) => self
                        .registry
                        .lookup(reference, ns)
                        .map(|(_, target)| target)
                        .unwrap_or(base),
                    _ => base,
                };
                // An unresolved reference stays Named and fails in compile
                let decodable = effective.is_primitive()
                    || matches!(effective, AvroSchema::Fixed(_) | AvroSchema::Named(_));
                if !decodable {
                    return Err(SchemaError::UnsupportedType(format!(
                        "Logical type '{}' over {} has no decoding strategy",
                        logical.logical_type.name(),
                        effective.type_name()
                    )));
                }
                self.compile(base, ns)
            }
        }
    }

    fn compile_record(
        &mut self,
        record: &RecordSchema,
        ns: Option<&str>,
    ) -> Result<NodeId, SchemaError> {
        let fullname = qualify(&record.name, ns);
        if let Some(&id) = self.named.get(&fullname) {
            trace!(name = %fullname, "Reusing compiled record");
            return Ok(id);
        }
        validate_record(record)?;

        // Register before compiling fields so self references terminate
        let id = self.push(ContextNode::Record(RecordNode {
            name: fullname.clone(),
            fields: Vec::new(),
        }));
        self.named.insert(fullname.clone(), id);

        let inner_ns = namespace_of(&fullname);
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let node = self.compile(&field.schema, inner_ns)?;
            fields.push(FieldNode {
                name: Arc::from(field.name.as_str()),
                node,
            });
        }

        if let ContextNode::Record(slot) = &mut self.nodes[id.0] {
            slot.fields = fields;
        }
        Ok(id)
    }

    fn compile_reference(
        &mut self,
        reference: &str,
        ns: Option<&str>,
    ) -> Result<NodeId, SchemaError> {
        let (fullname, target) = match self.registry.lookup(reference, ns) {
            Some((fullname, target)) => (fullname, target),
            None => {
                return Err(SchemaError::MalformedSchema(format!(
                    "Unresolved named type reference: '{}'",
                    reference
                )))
            }
        };
        if let Some(&id) = self.named.get(&fullname) {
            trace!(name = %fullname, "Resolved reference to compiled type");
            return Ok(id);
        }

        // Declared later in traversal order; compile the declaration now
        // in its own namespace.
        let target = target.clone();
        let enclosing = namespace_of(&fullname).map(str::to_string);
        self.compile(&target, enclosing.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumSchema, FieldSchema, FixedSchema, LogicalType, LogicalTypeName};

    fn linked_list() -> AvroSchema {
        AvroSchema::Record(RecordSchema::new(
            "Node",
            vec![
                FieldSchema::new("value", AvroSchema::Int),
                FieldSchema::new(
                    "next",
                    AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Named("Node".into())]),
                ),
            ],
        ))
    }

    #[test]
    fn test_zero_width_nodes() {
        let schema = AvroSchema::Record(RecordSchema::new(
            "Holder",
            vec![
                FieldSchema::new(
                    "marker",
                    AvroSchema::Record(RecordSchema::new(
                        "Marker",
                        vec![
                            FieldSchema::new("nothing", AvroSchema::Null),
                            FieldSchema::new("tag", AvroSchema::Fixed(FixedSchema::new("Tag", 0))),
                        ],
                    )),
                ),
                FieldSchema::new("count", AvroSchema::Int),
            ],
        ));
        let tree = ContextTree::build(&schema).unwrap();
        assert!(tree.is_zero_width(tree.named_node("Marker").unwrap()));
        assert!(!tree.is_zero_width(tree.root()));

        let list = ContextTree::build(&linked_list()).unwrap();
        assert!(!list.is_zero_width(list.root()));
    }

    #[test]
    fn test_primitive_root() {
        let tree = ContextTree::build(&AvroSchema::Long).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(tree.root()), &ContextNode::Scalar(&LONG_DECODER));
    }

    #[test]
    fn test_shared_scalars_are_reused() {
        let schema = AvroSchema::Record(RecordSchema::new(
            "Pair",
            vec![
                FieldSchema::new("a", AvroSchema::Int),
                FieldSchema::new("b", AvroSchema::Int),
                FieldSchema::new("c", AvroSchema::Array(Box::new(AvroSchema::Int))),
            ],
        ));
        let tree = ContextTree::build(&schema).unwrap();

        let ContextNode::Record(record) = tree.node(tree.root()) else {
            panic!("Expected record root");
        };
        assert_eq!(record.fields[0].node, record.fields[1].node);
        let ContextNode::Array { items } = tree.node(record.fields[2].node) else {
            panic!("Expected array");
        };
        assert_eq!(*items, record.fields[0].node);
        // record + int + array
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_shared_scalar_points_at_static() {
        let tree = ContextTree::build(&AvroSchema::String).unwrap();
        match tree.node(tree.root()) {
            ContextNode::Scalar(s) => assert!(std::ptr::eq(*s, &STRING_DECODER)),
            other => panic!("Expected shared scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_bytes_gets_dedicated_instances() {
        let schema = AvroSchema::Record(RecordSchema::new(
            "Blobs",
            vec![
                FieldSchema::new("a", AvroSchema::Bytes),
                FieldSchema::new("b", AvroSchema::Bytes),
            ],
        ));
        let tree = ContextTree::build(&schema).unwrap();
        let ContextNode::Record(record) = tree.node(tree.root()) else {
            panic!("Expected record root");
        };
        assert_ne!(record.fields[0].node, record.fields[1].node);
        assert_eq!(
            tree.node(record.fields[0].node),
            &ContextNode::Dedicated(ScalarDecoder::Bytes)
        );
    }

    #[test]
    fn test_recursive_record_is_bounded() {
        let tree = ContextTree::build(&linked_list()).unwrap();

        // record, int, null, union
        assert_eq!(tree.len(), 4);
        let root = tree.root();
        let ContextNode::Record(record) = tree.node(root) else {
            panic!("Expected record root");
        };
        let ContextNode::Union { branches } = tree.node(record.fields[1].node) else {
            panic!("Expected union");
        };
        assert_eq!(branches[1], root);
        assert_eq!(tree.named_node("Node"), Some(root));
    }

    #[test]
    fn test_mutually_recursive_records() {
        // Tree { children: array<Branch> }, Branch { tree: union{null, Tree} }
        let branch = AvroSchema::Record(RecordSchema::new(
            "Branch",
            vec![FieldSchema::new(
                "tree",
                AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Named("Tree".into())]),
            )],
        ));
        let tree_schema = AvroSchema::Record(
            RecordSchema::new(
                "Tree",
                vec![FieldSchema::new("children", AvroSchema::Array(Box::new(branch)))],
            )
            .with_namespace("org.forest"),
        );

        let tree = ContextTree::build(&tree_schema).unwrap();
        assert!(tree.named_node("org.forest.Tree").is_some());
        // Branch inherits the namespace
        assert!(tree.named_node("org.forest.Branch").is_some());
        // Tree, Branch, null, union, array
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_forward_reference_is_resolved() {
        // The reference appears before the declaration in field order
        let schema = AvroSchema::Record(RecordSchema::new(
            "Holder",
            vec![
                FieldSchema::new("first", AvroSchema::Named("Id".into())),
                FieldSchema::new("second", AvroSchema::Fixed(FixedSchema::new("Id", 4))),
            ],
        ));
        let tree = ContextTree::build(&schema).unwrap();
        let ContextNode::Record(record) = tree.node(tree.root()) else {
            panic!("Expected record root");
        };
        assert_eq!(record.fields[0].node, record.fields[1].node);
    }

    #[test]
    fn test_enum_symbols_compiled() {
        let schema = AvroSchema::Enum(EnumSchema::new(
            "Suit",
            vec!["SPADES".into(), "HEARTS".into()],
        ));
        let tree = ContextTree::build(&schema).unwrap();
        match tree.node(tree.root()) {
            ContextNode::Dedicated(ScalarDecoder::Enum { symbols }) => {
                assert_eq!(symbols.len(), 2);
                assert_eq!(symbols[1], "HEARTS");
            }
            other => panic!("Expected enum decoder, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_compiles_as_base() {
        let schema = AvroSchema::Logical(LogicalType::new(AvroSchema::Int, LogicalTypeName::Date));
        let tree = ContextTree::build(&schema).unwrap();
        assert_eq!(tree.node(tree.root()), &ContextNode::Scalar(&INT_DECODER));
    }

    // ========================================================================
    // Build failures
    // ========================================================================

    #[test]
    fn test_empty_union_is_malformed() {
        let result = ContextTree::build(&AvroSchema::Union(vec![]));
        assert!(matches!(result, Err(SchemaError::MalformedSchema(_))));
    }

    #[test]
    fn test_duplicate_field_is_malformed() {
        let schema = AvroSchema::Record(RecordSchema::new(
            "Dup",
            vec![
                FieldSchema::new("x", AvroSchema::Int),
                FieldSchema::new("x", AvroSchema::Long),
            ],
        ));
        assert!(matches!(
            ContextTree::build(&schema),
            Err(SchemaError::MalformedSchema(_))
        ));
    }

    #[test]
    fn test_unresolved_reference_is_malformed() {
        let schema = AvroSchema::Array(Box::new(AvroSchema::Named("Ghost".into())));
        let err = ContextTree::build(&schema).unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_nested_duplicate_field_fails_whole_build() {
        let inner = AvroSchema::Record(RecordSchema::new(
            "Inner",
            vec![
                FieldSchema::new("y", AvroSchema::Int),
                FieldSchema::new("y", AvroSchema::Int),
            ],
        ));
        let outer = AvroSchema::Record(RecordSchema::new(
            "Outer",
            vec![FieldSchema::new("inner", AvroSchema::Map(Box::new(inner)))],
        ));
        assert!(ContextTree::build(&outer).is_err());
    }

    #[test]
    fn test_logical_over_record_is_unsupported() {
        let schema = AvroSchema::Logical(LogicalType::new(
            AvroSchema::Array(Box::new(AvroSchema::Int)),
            LogicalTypeName::Duration,
        ));
        assert!(matches!(
            ContextTree::build(&schema),
            Err(SchemaError::UnsupportedType(_))
        ));
    }
}
