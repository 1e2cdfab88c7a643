//! Scalar decoders: one per Avro primitive type.
//!
//! Each decoder consumes exactly one encoded value and produces exactly one
//! token. Decoders for `null`, `boolean`, `int`, `long`, `float`, `double`
//! and `string` carry no parameters and exist once, as statics shared by
//! every context tree and every stream. `bytes`, `fixed` and `enum` get a
//! dedicated instance per schema occurrence since their length or symbol
//! table varies.

use std::sync::Arc;

use super::binary::BinaryDecoder;
use super::token::Token;
use crate::error::DecodeError;

/// Stateless decoder for one scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarDecoder {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Fixed { size: usize },
    Enum { symbols: Arc<[String]> },
}

pub static NULL_DECODER: ScalarDecoder = ScalarDecoder::Null;
pub static BOOLEAN_DECODER: ScalarDecoder = ScalarDecoder::Boolean;
pub static INT_DECODER: ScalarDecoder = ScalarDecoder::Int;
pub static LONG_DECODER: ScalarDecoder = ScalarDecoder::Long;
pub static FLOAT_DECODER: ScalarDecoder = ScalarDecoder::Float;
pub static DOUBLE_DECODER: ScalarDecoder = ScalarDecoder::Double;
pub static STRING_DECODER: ScalarDecoder = ScalarDecoder::String;

impl ScalarDecoder {
    /// Decode one value from `decoder`.
    #[inline]
    pub fn decode<D: BinaryDecoder + ?Sized>(&self, decoder: &mut D) -> Result<Token, DecodeError> {
        match self {
            // null has no binary representation
            ScalarDecoder::Null => Ok(Token::Null),
            ScalarDecoder::Boolean => decoder.read_boolean().map(Token::Boolean),
            ScalarDecoder::Int => decoder.read_int().map(|v| Token::Int(v as i64)),
            ScalarDecoder::Long => decoder.read_long().map(Token::Int),
            ScalarDecoder::Float => decoder.read_float().map(|v| Token::Float(v as f64)),
            ScalarDecoder::Double => decoder.read_double().map(Token::Float),
            ScalarDecoder::String => decoder.read_string().map(Token::String),
            ScalarDecoder::Bytes => decoder.read_bytes().map(Token::Bytes),
            ScalarDecoder::Fixed { size } => decoder.read_fixed(*size).map(Token::Bytes),
            ScalarDecoder::Enum { symbols } => {
                read_symbol(symbols, decoder).map(|symbol| Token::String(symbol.clone()))
            }
        }
    }

    /// Consume one value without producing a token.
    pub fn skip<D: BinaryDecoder + ?Sized>(&self, decoder: &mut D) -> Result<(), DecodeError> {
        match self {
            ScalarDecoder::Null => Ok(()),
            ScalarDecoder::Boolean => decoder.read_boolean().map(|_| ()),
            ScalarDecoder::Int => decoder.read_int().map(|_| ()),
            ScalarDecoder::Long => decoder.read_long().map(|_| ()),
            ScalarDecoder::Enum { symbols } => read_symbol(symbols, decoder).map(|_| ()),
            ScalarDecoder::Float => decoder.skip(4),
            ScalarDecoder::Double => decoder.skip(8),
            ScalarDecoder::String | ScalarDecoder::Bytes => decoder.skip_bytes(),
            ScalarDecoder::Fixed { size } => decoder.skip(*size),
        }
    }

    /// Whether this decoder is one of the shared singletons.
    pub fn is_shared(&self) -> bool {
        !matches!(
            self,
            ScalarDecoder::Bytes | ScalarDecoder::Fixed { .. } | ScalarDecoder::Enum { .. }
        )
    }

    /// Avro type keyword this decoder reads.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarDecoder::Null => "null",
            ScalarDecoder::Boolean => "boolean",
            ScalarDecoder::Int => "int",
            ScalarDecoder::Long => "long",
            ScalarDecoder::Float => "float",
            ScalarDecoder::Double => "double",
            ScalarDecoder::String => "string",
            ScalarDecoder::Bytes => "bytes",
            ScalarDecoder::Fixed { .. } => "fixed",
            ScalarDecoder::Enum { .. } => "enum",
        }
    }
}

/// Read an enum index and look up its symbol.
fn read_symbol<'s, D: BinaryDecoder + ?Sized>(
    symbols: &'s [String],
    decoder: &mut D,
) -> Result<&'s String, DecodeError> {
    let index = decoder.read_int()?;
    usize::try_from(index)
        .ok()
        .and_then(|i| symbols.get(i))
        .ok_or_else(|| {
            DecodeError::CorruptData(format!(
                "Enum index {} out of range (0..{})",
                index,
                symbols.len()
            ))
        })
}
