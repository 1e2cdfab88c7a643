//! Structural checks applied while a schema is compiled.
//!
//! These catch defects that a schema parser may let through but that would
//! make decoding ambiguous or impossible.

use std::collections::HashSet;

use crate::error::SchemaError;
use crate::schema::{AvroSchema, EnumSchema, RecordSchema};

/// Reject records with duplicate field names.
pub fn validate_record(record: &RecordSchema) -> Result<(), SchemaError> {
    let mut seen = HashSet::with_capacity(record.fields.len());
    for field in &record.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::MalformedSchema(format!(
                "Record '{}' has duplicate field name '{}'",
                record.fullname(),
                field.name
            )));
        }
    }
    Ok(())
}

/// Reject enums without symbols or with repeated symbols.
pub fn validate_enum(enum_schema: &EnumSchema) -> Result<(), SchemaError> {
    if enum_schema.symbols.is_empty() {
        return Err(SchemaError::MalformedSchema(format!(
            "Enum '{}' has no symbols",
            enum_schema.fullname()
        )));
    }
    let mut seen = HashSet::with_capacity(enum_schema.symbols.len());
    for symbol in &enum_schema.symbols {
        if !seen.insert(symbol.as_str()) {
            return Err(SchemaError::MalformedSchema(format!(
                "Enum '{}' has duplicate symbol '{}'",
                enum_schema.fullname(),
                symbol
            )));
        }
    }
    Ok(())
}

/// Reject empty unions, directly nested unions and ambiguous branches.
///
/// Two branches are ambiguous when they share an unnamed type keyword
/// (`["int", "int"]`, two arrays, two maps) or the same declared name.
/// `qualify` maps a named branch (declaration or reference) to its full name.
pub fn validate_union<F>(variants: &[AvroSchema], qualify: F) -> Result<(), SchemaError>
where
    F: Fn(&AvroSchema) -> Option<String>,
{
    if variants.is_empty() {
        return Err(SchemaError::MalformedSchema(
            "Union must have at least one branch".to_string(),
        ));
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(variants.len());
    for variant in variants {
        let key = match variant {
            AvroSchema::Union(_) => {
                return Err(SchemaError::MalformedSchema(
                    "Union may not immediately contain another union".to_string(),
                ))
            }
            AvroSchema::Logical(logical) => branch_key(&logical.base, &qualify),
            other => branch_key(other, &qualify),
        };
        if !seen.insert(key.clone()) {
            return Err(SchemaError::MalformedSchema(format!(
                "Union contains more than one branch of type '{}'",
                key
            )));
        }
    }
    Ok(())
}

fn branch_key<F>(schema: &AvroSchema, qualify: &F) -> String
where
    F: Fn(&AvroSchema) -> Option<String>,
{
    match schema {
        AvroSchema::Record(_) | AvroSchema::Enum(_) | AvroSchema::Fixed(_) | AvroSchema::Named(_) => {
            qualify(schema).unwrap_or_else(|| schema.type_name().to_string())
        }
        other => other.type_name().to_string(),
    }
}
