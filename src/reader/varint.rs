//! Varint and zig-zag primitives of the Avro binary encoding.
//!
//! Avro encodes every int, long, length prefix, block count and union index
//! as a zig-zag mapped, little-endian base-128 varint:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - Zig-zag maps 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...
//! - Encoding formula: (n << 1) ^ (n >> 63)
//! - Decoding formula: (n >> 1) ^ -(n & 1)

use crate::error::DecodeError;

/// Longest legal encoding of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode an unsigned varint from a byte source.
///
/// `next_byte` is called once per encoded byte. This is the shared core of
/// the slice-backed and stream-backed decoders.
///
/// # Errors
/// - Whatever `next_byte` returns when input runs out
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_varint_with<F>(mut next_byte: F) -> Result<u64, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = next_byte()?;
        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
        if shift >= 64 {
            return Err(DecodeError::InvalidVarint);
        }
    }
}

/// Decode an unsigned varint, advancing the slice past it.
///
/// # Errors
/// - `DecodeError::TruncatedInput` if the input ends inside the varint
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    decode_varint_with(|| {
        let slice: &[u8] = *data;
        match slice.split_first() {
            Some((&byte, rest)) => {
                *data = rest;
                Ok(byte)
            }
            None => Err(DecodeError::TruncatedInput),
        }
    })
}

/// Map a zig-zag encoded value back to its signed form.
#[inline]
pub fn zigzag_decode(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64))
}

/// Decode a zig-zag encoded signed varint, advancing the slice past it.
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_varint(data).map(zigzag_decode)
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode an unsigned integer as a varint.
#[inline]
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(MAX_VARINT_LEN);
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        result.push(byte);
        if value == 0 {
            break;
        }
    }
    result
}

/// Encode a signed integer as a zig-zag varint.
#[inline]
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    encode_varint(((value << 1) ^ (value >> 63)) as u64)
}
