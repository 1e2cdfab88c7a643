//! Registry of named types for resolving `Named` references.
//!
//! Avro names nested inside a record inherit the record's namespace unless
//! they carry their own. The registry applies that rule when it collects
//! declarations, and [`SchemaResolutionContext::lookup`] applies it again
//! when a reference is resolved, so both sides agree on full names.

use std::collections::HashMap;

use crate::error::SchemaError;
use crate::schema::{AvroSchema, TypeName};

/// Full name of a declared type, inheriting `enclosing` when the
/// declaration has neither its own namespace nor a dotted name.
pub fn qualify(name: &TypeName, enclosing: Option<&str>) -> String {
    if name.name.contains('.') {
        return name.name.clone();
    }
    match (name.namespace.as_deref(), enclosing) {
        (Some(ns), _) if !ns.is_empty() => format!("{}.{}", ns, name.name),
        (Some(_), _) => name.name.clone(),
        (None, Some(ns)) if !ns.is_empty() => format!("{}.{}", ns, name.name),
        (None, _) => name.name.clone(),
    }
}

/// Namespace that names nested inside `name` resolve against.
pub fn namespace_of(fullname: &str) -> Option<&str> {
    fullname.rsplit_once('.').map(|(ns, _)| ns)
}

/// Named type declarations collected from one schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    /// Declarations by fully qualified name
    named_types: HashMap<String, AvroSchema>,
}

impl SchemaResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration under its full name.
    ///
    /// Registering a different definition under a name that is already
    /// taken is a schema defect. Identical re-declarations are accepted.
    pub fn register(&mut self, fullname: String, schema: AvroSchema) -> Result<(), SchemaError> {
        match self.named_types.get(&fullname) {
            Some(existing) if *existing != schema => Err(SchemaError::MalformedSchema(format!(
                "Named type '{}' is defined more than once",
                fullname
            ))),
            Some(_) => Ok(()),
            None => {
                self.named_types.insert(fullname, schema);
                Ok(())
            }
        }
    }

    pub fn get(&self, fullname: &str) -> Option<&AvroSchema> {
        self.named_types.get(fullname)
    }

    pub fn contains(&self, fullname: &str) -> bool {
        self.named_types.contains_key(fullname)
    }

    pub fn len(&self) -> usize {
        self.named_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named_types.is_empty()
    }

    /// Resolve a reference as written in the schema to its full name.
    ///
    /// Unqualified references are tried in the enclosing namespace first,
    /// then as-is.
    pub fn lookup(&self, reference: &str, enclosing: Option<&str>) -> Option<(String, &AvroSchema)> {
        if !reference.contains('.') {
            if let Some(ns) = enclosing.filter(|ns| !ns.is_empty()) {
                let qualified = format!("{}.{}", ns, reference);
                if let Some(schema) = self.named_types.get(&qualified) {
                    return Some((qualified, schema));
                }
            }
        }
        self.named_types
            .get(reference)
            .map(|schema| (reference.to_string(), schema))
    }

    /// Collect every record, enum and fixed declared anywhere in `schema`.
    pub fn build_from_schema(schema: &AvroSchema) -> Result<Self, SchemaError> {
        let mut context = Self::new();
        context.extract_named_types(schema, None)?;
        Ok(context)
    }

    fn extract_named_types(
        &mut self,
        schema: &AvroSchema,
        enclosing: Option<&str>,
    ) -> Result<(), SchemaError> {
        match schema {
            AvroSchema::Record(record) => {
                let fullname = qualify(&record.name, enclosing);
                self.register(fullname.clone(), schema.clone())?;
                let inner = namespace_of(&fullname);
                for field in &record.fields {
                    self.extract_named_types(&field.schema, inner)?;
                }
            }
            AvroSchema::Enum(enum_schema) => {
                self.register(qualify(&enum_schema.name, enclosing), schema.clone())?;
            }
            AvroSchema::Fixed(fixed_schema) => {
                self.register(qualify(&fixed_schema.name, enclosing), schema.clone())?;
            }
            AvroSchema::Array(item_schema) => {
                self.extract_named_types(item_schema, enclosing)?;
            }
            AvroSchema::Map(value_schema) => {
                self.extract_named_types(value_schema, enclosing)?;
            }
            AvroSchema::Union(variants) => {
                for variant in variants {
                    self.extract_named_types(variant, enclosing)?;
                }
            }
            AvroSchema::Logical(logical) => {
                self.extract_named_types(&logical.base, enclosing)?;
            }
            // Primitives and references declare nothing
            _ => {}
        }
        Ok(())
    }
}
