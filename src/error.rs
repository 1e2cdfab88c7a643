//! Error types for schema-driven Avro decoding

use std::io;
use thiserror::Error;

/// Errors raised while building a context tree from a schema.
///
/// Schema errors are detected before any byte is read. No partially built
/// tree is ever returned alongside one.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Structural defect in the schema (duplicate fields, empty union, ...)
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),
    /// Schema node with no decoding strategy
    #[error("Unsupported schema type: {0}")]
    UnsupportedType(String),
}

/// Errors that can occur while decoding bytes against a schema.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The byte cursor ran out in the middle of a value
    #[error("Truncated input")]
    TruncatedInput,
    /// Union branch index outside the branch list
    #[error("Union index {index} out of range (0..{branches})")]
    InvalidUnionIndex { index: i64, branches: usize },
    /// A decoded control value (length, count, index) is out of range
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    /// Varint longer than 10 bytes
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// String is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Structures nested deeper than the configured limit
    #[error("Nesting depth exceeds limit of {0}")]
    NestingTooDeep(usize),
    /// IO error from a stream-backed decoder
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::TruncatedInput,
            _ => DecodeError::Io(err),
        }
    }
}

/// Top-level error returned by a token stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Decode error at a specific context path and byte offset
    #[error("Decode error at {path} (offset {offset}): {source}")]
    Decode {
        path: String,
        offset: u64,
        #[source]
        source: DecodeError,
    },

    /// The stream already failed and cannot produce further tokens
    #[error("Token stream is unusable after an earlier error")]
    Poisoned,
}

impl StreamError {
    /// The underlying decode error, if this is one.
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            StreamError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}
