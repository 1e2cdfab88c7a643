//! Schema-driven Avro binary decoding as a stream of tokens
//!
//! This library compiles an Avro schema into an immutable tree of decoding
//! contexts and walks Avro binary data with it, producing JSON-like tokens
//! (START_OBJECT, FIELD_NAME, VALUE_STRING, ...) on demand. No intermediate
//! value tree is materialized.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use avro_tokens::{AvroSchema, ContextTree, SliceDecoder, Token, TokenStream};
//!
//! let schema = AvroSchema::Array(Box::new(AvroSchema::Long));
//! let tree = Arc::new(ContextTree::build(&schema).unwrap());
//!
//! // One block of two items (1, 2), then the terminating zero count
//! let data = [0x04, 0x02, 0x04, 0x00];
//! let mut stream = TokenStream::new(Arc::clone(&tree), SliceDecoder::new(&data));
//!
//! assert_eq!(stream.next_token().unwrap(), Token::StartArray);
//! assert_eq!(stream.next_token().unwrap(), Token::Int(1));
//! assert_eq!(stream.next_token().unwrap(), Token::Int(2));
//! assert_eq!(stream.next_token().unwrap(), Token::EndArray);
//! assert_eq!(stream.next_token().unwrap(), Token::EndOfStream);
//! ```

pub mod error;
pub mod reader;
pub mod schema;

// Re-export main types
pub use error::{DecodeError, SchemaError, StreamError};
pub use reader::{
    BinaryDecoder, BytesDecoder, ContextKind, ContextTree, ContextView, DecoderConfig,
    ReadDecoder, SliceDecoder, Token, TokenKind, TokenStream, ValueMode,
};
pub use schema::{
    AvroSchema, EnumSchema, FieldSchema, FixedSchema, LogicalType, LogicalTypeName, RecordSchema,
    SchemaResolutionContext,
};
