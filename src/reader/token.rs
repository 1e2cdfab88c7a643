//! Tokens produced by the token stream.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// One decoded unit of an Avro value.
///
/// Tokens are plain output values. They hold no reference back into the
/// decoding state.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `null`
    Null,
    /// `boolean`
    Boolean(bool),
    /// `int` and `long`
    Int(i64),
    /// `float` (widened) and `double`
    Float(f64),
    /// `string`, and the symbol of an `enum`
    String(String),
    /// `bytes` and `fixed`
    Bytes(Bytes),
    StartArray,
    EndArray,
    StartObject,
    EndObject,
    /// Record field name (from the schema) or map key (from the wire)
    FieldName(Arc<str>),
    /// The root value is complete
    EndOfStream,
}

/// Fieldless mirror of [`Token`], convenient for matching and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    ValueNull,
    ValueBoolean,
    ValueNumberInt,
    ValueNumberFloat,
    ValueString,
    ValueEmbeddedBytes,
    StartArray,
    EndArray,
    StartObject,
    EndObject,
    FieldName,
    EndOfStream,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Null => TokenKind::ValueNull,
            Token::Boolean(_) => TokenKind::ValueBoolean,
            Token::Int(_) => TokenKind::ValueNumberInt,
            Token::Float(_) => TokenKind::ValueNumberFloat,
            Token::String(_) => TokenKind::ValueString,
            Token::Bytes(_) => TokenKind::ValueEmbeddedBytes,
            Token::StartArray => TokenKind::StartArray,
            Token::EndArray => TokenKind::EndArray,
            Token::StartObject => TokenKind::StartObject,
            Token::EndObject => TokenKind::EndObject,
            Token::FieldName(_) => TokenKind::FieldName,
            Token::EndOfStream => TokenKind::EndOfStream,
        }
    }

    pub fn field_name(name: &str) -> Self {
        Token::FieldName(Arc::from(name))
    }

    /// START_ARRAY or START_OBJECT
    pub fn is_struct_start(&self) -> bool {
        matches!(self, Token::StartArray | Token::StartObject)
    }

    /// END_ARRAY or END_OBJECT
    pub fn is_struct_end(&self) -> bool {
        matches!(self, Token::EndArray | Token::EndObject)
    }

    /// A complete scalar value
    pub fn is_scalar_value(&self) -> bool {
        matches!(
            self,
            Token::Null
                | Token::Boolean(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::String(_)
                | Token::Bytes(_)
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => f.write_str("VALUE_NULL"),
            Token::Boolean(b) => write!(f, "VALUE_BOOLEAN({})", b),
            Token::Int(i) => write!(f, "VALUE_NUMBER_INT({})", i),
            Token::Float(v) => write!(f, "VALUE_NUMBER_FLOAT({})", v),
            Token::String(s) => write!(f, "VALUE_STRING({:?})", s),
            Token::Bytes(b) => write!(f, "VALUE_EMBEDDED_BYTES({} bytes)", b.len()),
            Token::StartArray => f.write_str("START_ARRAY"),
            Token::EndArray => f.write_str("END_ARRAY"),
            Token::StartObject => f.write_str("START_OBJECT"),
            Token::EndObject => f.write_str("END_OBJECT"),
            Token::FieldName(n) => write!(f, "FIELD_NAME({:?})", n),
            Token::EndOfStream => f.write_str("END_OF_STREAM"),
        }
    }
}
