//! Token stream reader components
//!
//! This module turns a schema into a compiled context tree and drives that
//! tree over Avro binary input, one token at a time.

pub mod binary;
pub mod context;
mod frame;
pub mod scalar;
pub mod stream;
pub mod token;
pub mod varint;

pub use binary::{BinaryDecoder, BytesDecoder, ReadDecoder, SliceDecoder};
pub use context::{ContextNode, ContextTree, FieldNode, NodeId, RecordNode};
pub use frame::{ContextKind, ValueMode};
pub use scalar::{
    ScalarDecoder, BOOLEAN_DECODER, DOUBLE_DECODER, FLOAT_DECODER, INT_DECODER, LONG_DECODER,
    NULL_DECODER, STRING_DECODER,
};
pub use stream::{ContextView, DecoderConfig, TokenStream, DEFAULT_MAX_DEPTH};
pub use token::{Token, TokenKind};
pub use varint::{decode_varint, decode_zigzag, encode_varint, encode_zigzag};
