//! Avro schema model.
//!
//! This module defines the schema tree the context builder compiles, the
//! named-type registry used to resolve references (including recursive
//! ones), and the structural checks run at build time.

mod resolution;
mod types;
mod validate;

pub use resolution::{namespace_of, qualify, SchemaResolutionContext};
pub use types::*;
pub use validate::{validate_enum, validate_record, validate_union};
