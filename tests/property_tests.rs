//! Property-based tests for the token stream.
//!
//! Values are encoded with the `apache-avro` crate and decoded back through
//! a token stream, so the wire format is checked against an independent
//! implementation rather than against our own encoder.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use apache_avro::types::Value;
use proptest::prelude::*;

use avro_tokens::reader::{
    decode_zigzag, encode_zigzag, BinaryDecoder, BytesDecoder, ContextTree, ReadDecoder,
    SliceDecoder, Token, TokenStream,
};
use avro_tokens::schema::*;

// ============================================================================
// Helpers
// ============================================================================

/// Encode `value` with apache-avro using the JSON rendering of `schema`.
fn encode(schema: &AvroSchema, value: Value) -> Vec<u8> {
    let reference = apache_avro::Schema::parse_str(&schema.to_json()).unwrap();
    apache_avro::to_avro_datum(&reference, value).unwrap()
}

fn decode(schema: &AvroSchema, data: &[u8]) -> Vec<Token> {
    TokenStream::from_schema(schema, SliceDecoder::new(data))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Debug renderings of the tokens produced before the stream ended, and
/// whether it ended in an error. Debug text keeps NaN comparable.
fn outcome<D: BinaryDecoder>(stream: TokenStream<D>) -> (Vec<String>, bool) {
    let mut tokens = Vec::new();
    let mut failed = false;
    for item in stream {
        match item {
            Ok(token) => tokens.push(format!("{:?}", token)),
            Err(_) => failed = true,
        }
    }
    (tokens, failed)
}

fn scalar_round_trip(schema: AvroSchema, value: Value, expected: Token) {
    let data = encode(&schema, value);
    assert_eq!(decode(&schema, &data), vec![expected, Token::EndOfStream]);
}

// ============================================================================
// Primitive Round Trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_int_round_trip(v in any::<i32>()) {
        scalar_round_trip(AvroSchema::Int, Value::Int(v), Token::Int(v as i64));
    }

    #[test]
    fn prop_long_round_trip(v in any::<i64>()) {
        scalar_round_trip(AvroSchema::Long, Value::Long(v), Token::Int(v));
    }

    #[test]
    fn prop_float_widens_exactly(v in -1.0e6f32..1.0e6f32) {
        scalar_round_trip(AvroSchema::Float, Value::Float(v), Token::Float(v as f64));
    }

    #[test]
    fn prop_double_round_trip(v in -1.0e12f64..1.0e12f64) {
        scalar_round_trip(AvroSchema::Double, Value::Double(v), Token::Float(v));
    }

    #[test]
    fn prop_string_round_trip(s in ".{0,64}") {
        scalar_round_trip(AvroSchema::String, Value::String(s.clone()), Token::String(s));
    }

    #[test]
    fn prop_bytes_round_trip(b in prop::collection::vec(any::<u8>(), 0..128)) {
        scalar_round_trip(AvroSchema::Bytes, Value::Bytes(b.clone()), Token::Bytes(b.into()));
    }

    #[test]
    fn prop_boolean_round_trip(v in any::<bool>()) {
        scalar_round_trip(AvroSchema::Boolean, Value::Boolean(v), Token::Boolean(v));
    }

    #[test]
    fn prop_zigzag_matches_reference(v in any::<i64>()) {
        let data = encode(&AvroSchema::Long, Value::Long(v));
        prop_assert_eq!(&encode_zigzag(v), &data);
        let mut cursor = &data[..];
        prop_assert_eq!(decode_zigzag(&mut cursor).unwrap(), v);
    }
}

// ============================================================================
// Record Round Trips
// ============================================================================

fn sample_schema() -> AvroSchema {
    AvroSchema::Record(
        RecordSchema::new(
            "Sample",
            vec![
                FieldSchema::new("id", AvroSchema::Long),
                FieldSchema::new("name", AvroSchema::String),
                FieldSchema::new("tags", AvroSchema::Array(Box::new(AvroSchema::String))),
                FieldSchema::new(
                    "score",
                    AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Double]),
                ),
                FieldSchema::new("attrs", AvroSchema::Map(Box::new(AvroSchema::Int))),
                FieldSchema::new(
                    "level",
                    AvroSchema::Enum(EnumSchema::new(
                        "Level",
                        vec!["LOW".into(), "MID".into(), "HIGH".into()],
                    )),
                ),
            ],
        )
        .with_namespace("prop.test"),
    )
}

#[derive(Debug, Clone)]
struct Sample {
    id: i64,
    name: String,
    tags: Vec<String>,
    score: Option<f64>,
    attrs: HashMap<String, i32>,
    level: u32,
}

fn arb_sample() -> impl Strategy<Value = Sample> {
    (
        any::<i64>(),
        "[a-z]{0,12}",
        prop::collection::vec("[a-z]{0,6}", 0..6),
        prop::option::of(-1.0e9f64..1.0e9f64),
        prop::collection::hash_map("[a-z]{1,4}", any::<i32>(), 0..5),
        0u32..3,
    )
        .prop_map(|(id, name, tags, score, attrs, level)| Sample {
            id,
            name,
            tags,
            score,
            attrs,
            level,
        })
}

/// Build the apache-avro value and the token sequence it must decode to.
///
/// Map entries are listed in the order the encoder will iterate them.
fn sample_value_and_tokens(sample: &Sample) -> (Value, Vec<Token>) {
    let symbols = ["LOW", "MID", "HIGH"];
    let attrs: HashMap<String, Value> = sample
        .attrs
        .iter()
        .map(|(k, v)| (k.clone(), Value::Int(*v)))
        .collect();

    let mut tokens = vec![
        Token::StartObject,
        Token::field_name("id"),
        Token::Int(sample.id),
        Token::field_name("name"),
        Token::String(sample.name.clone()),
        Token::field_name("tags"),
        Token::StartArray,
    ];
    tokens.extend(sample.tags.iter().cloned().map(Token::String));
    tokens.push(Token::EndArray);
    tokens.push(Token::field_name("score"));
    tokens.push(sample.score.map_or(Token::Null, Token::Float));
    tokens.push(Token::field_name("attrs"));
    tokens.push(Token::StartObject);
    for (key, value) in &attrs {
        tokens.push(Token::field_name(key));
        if let Value::Int(v) = value {
            tokens.push(Token::Int(*v as i64));
        }
    }
    tokens.push(Token::EndObject);
    tokens.push(Token::field_name("level"));
    tokens.push(Token::String(symbols[sample.level as usize].to_string()));
    tokens.push(Token::EndObject);
    tokens.push(Token::EndOfStream);

    let score = match sample.score {
        Some(v) => Value::Union(1, Box::new(Value::Double(v))),
        None => Value::Union(0, Box::new(Value::Null)),
    };
    let value = Value::Record(vec![
        ("id".to_string(), Value::Long(sample.id)),
        ("name".to_string(), Value::String(sample.name.clone())),
        (
            "tags".to_string(),
            Value::Array(sample.tags.iter().cloned().map(Value::String).collect()),
        ),
        ("score".to_string(), score),
        ("attrs".to_string(), Value::Map(attrs)),
        (
            "level".to_string(),
            Value::Enum(sample.level, symbols[sample.level as usize].to_string()),
        ),
    ]);
    (value, tokens)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_record_round_trip(sample in arb_sample()) {
        let schema = sample_schema();
        let (value, expected) = sample_value_and_tokens(&sample);
        let data = encode(&schema, value);
        prop_assert_eq!(decode(&schema, &data), expected);
    }

    #[test]
    fn prop_skip_record_consumes_whole_value(sample in arb_sample()) {
        let schema = sample_schema();
        let (value, _) = sample_value_and_tokens(&sample);
        let data = encode(&schema, value);

        let mut stream = TokenStream::from_schema(&schema, SliceDecoder::new(&data)).unwrap();
        prop_assert_eq!(stream.next_token().unwrap(), Token::StartObject);
        prop_assert_eq!(stream.skip_children().unwrap(), Some(Token::EndObject));
        prop_assert_eq!(stream.next_token().unwrap(), Token::EndOfStream);
        prop_assert_eq!(stream.bytes_consumed(), data.len() as u64);
    }

    /// Arbitrary input never panics, and every decoder reaches the same
    /// tokens and the same verdict.
    #[test]
    fn prop_decoders_agree_on_arbitrary_input(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let tree = Arc::new(ContextTree::build(&sample_schema()).unwrap());

        let from_slice = outcome(TokenStream::new(Arc::clone(&tree), SliceDecoder::new(&data)));
        let from_bytes = outcome(TokenStream::new(Arc::clone(&tree), BytesDecoder::new(data.clone())));
        let from_reader = outcome(TokenStream::new(
            Arc::clone(&tree),
            ReadDecoder::new(Cursor::new(data.clone())),
        ));

        prop_assert_eq!(&from_slice, &from_bytes);
        prop_assert_eq!(&from_slice, &from_reader);
    }
}
