//! Byte-level Avro primitives behind the [`BinaryDecoder`] trait.
//!
//! The token stream never touches bytes directly; it asks a `BinaryDecoder`
//! for one primitive at a time. Every implementation is forward-only:
//! nothing here rewinds.
//!
//! Three cursors are provided:
//! - [`SliceDecoder`] over a borrowed `&[u8]`
//! - [`BytesDecoder`] over `bytes::Bytes`, returning zero-copy views
//! - [`ReadDecoder`] over any `std::io::BufRead`, for non-seekable streams

use std::io::{self, BufRead, Read};

use bytes::Bytes;

use super::varint::{decode_varint_with, zigzag_decode};
use crate::error::DecodeError;

/// Forward-only source of Avro binary primitives.
///
/// Every read fails with [`DecodeError::TruncatedInput`] when the input
/// ends before the value does. Reads never return partial values.
pub trait BinaryDecoder {
    /// Read a boolean (one byte, 0 or 1).
    fn read_boolean(&mut self) -> Result<bool, DecodeError>;

    /// Read a zig-zag varint long.
    fn read_long(&mut self) -> Result<i64, DecodeError>;

    /// Read a 4-byte little-endian IEEE 754 float.
    fn read_float(&mut self) -> Result<f32, DecodeError>;

    /// Read an 8-byte little-endian IEEE 754 double.
    fn read_double(&mut self) -> Result<f64, DecodeError>;

    /// Read exactly `len` raw bytes.
    fn read_fixed(&mut self, len: usize) -> Result<Bytes, DecodeError>;

    /// Discard exactly `len` raw bytes.
    fn skip(&mut self, len: usize) -> Result<(), DecodeError>;

    /// Whether the input is exhausted.
    ///
    /// Takes `&mut self` because stream-backed decoders may need to fill
    /// their buffer to answer.
    fn is_at_end(&mut self) -> Result<bool, DecodeError>;

    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    /// Read a zig-zag varint int, rejecting values outside the i32 range.
    fn read_int(&mut self) -> Result<i32, DecodeError> {
        let long = self.read_long()?;
        i32::try_from(long).map_err(|_| {
            DecodeError::CorruptData(format!("Integer overflow: {} does not fit in i32", long))
        })
    }

    /// Read a length prefix. Negative lengths are corrupt data.
    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_long()?;
        if len < 0 {
            return Err(DecodeError::CorruptData(format!(
                "Negative length prefix: {}",
                len
            )));
        }
        usize::try_from(len)
            .map_err(|_| DecodeError::CorruptData(format!("Length prefix too large: {}", len)))
    }

    /// Read a length-prefixed byte sequence.
    fn read_bytes(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.read_length()?;
        self.read_fixed(len)
    }

    /// Read a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(DecodeError::from)
    }

    /// Skip a length-prefixed byte sequence or string.
    fn skip_bytes(&mut self) -> Result<(), DecodeError> {
        let len = self.read_length()?;
        self.skip(len)
    }
}

impl<D: BinaryDecoder + ?Sized> BinaryDecoder for &mut D {
    fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        (**self).read_boolean()
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        (**self).read_long()
    }

    fn read_float(&mut self) -> Result<f32, DecodeError> {
        (**self).read_float()
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        (**self).read_double()
    }

    fn read_fixed(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        (**self).read_fixed(len)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        (**self).skip(len)
    }

    fn is_at_end(&mut self) -> Result<bool, DecodeError> {
        (**self).is_at_end()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        (**self).read_string()
    }
}

fn decode_bool_byte(byte: u8) -> Result<bool, DecodeError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::CorruptData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

// ============================================================================
// SliceDecoder
// ============================================================================

/// Decoder over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceDecoder<'a> {
    data: &'a [u8],
    offset: u64,
}

impl<'a> SliceDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }

    /// Take `len` bytes without copying.
    pub fn read_fixed_ref(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < len {
            return Err(DecodeError::TruncatedInput);
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        self.offset += len as u64;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_fixed_ref(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

impl BinaryDecoder for SliceDecoder<'_> {
    fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        let [byte] = self.read_array::<1>()?;
        decode_bool_byte(byte)
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        let data = &mut self.data;
        let offset = &mut self.offset;
        let unsigned = decode_varint_with(|| {
            let slice: &[u8] = *data;
            match slice.split_first() {
                Some((&byte, rest)) => {
                    *data = rest;
                    *offset += 1;
                    Ok(byte)
                }
                None => Err(DecodeError::TruncatedInput),
            }
        })?;
        Ok(zigzag_decode(unsigned))
    }

    fn read_float(&mut self) -> Result<f32, DecodeError> {
        self.read_array::<4>().map(f32::from_le_bytes)
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        self.read_array::<8>().map(f64::from_le_bytes)
    }

    fn read_fixed(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        self.read_fixed_ref(len).map(Bytes::copy_from_slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.read_fixed_ref(len).map(|_| ())
    }

    fn is_at_end(&mut self) -> Result<bool, DecodeError> {
        Ok(self.data.is_empty())
    }

    fn position(&self) -> u64 {
        self.offset
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_length()?;
        let bytes = self.read_fixed_ref(len)?;
        String::from_utf8(bytes.to_vec()).map_err(DecodeError::from)
    }
}

// ============================================================================
// BytesDecoder
// ============================================================================

/// Decoder over a shared `Bytes` buffer.
///
/// `read_bytes` and `read_fixed` return views into the original buffer
/// instead of copies.
#[derive(Debug, Clone)]
pub struct BytesDecoder {
    buf: Bytes,
    pos: usize,
}

impl BytesDecoder {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::TruncatedInput);
        }
        let view = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(view)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        if self.remaining() < N {
            return Err(DecodeError::TruncatedInput);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}

impl BinaryDecoder for BytesDecoder {
    fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        let [byte] = self.take_array::<1>()?;
        decode_bool_byte(byte)
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        let buf = &self.buf;
        let pos = &mut self.pos;
        let unsigned = decode_varint_with(|| match buf.get(*pos) {
            Some(&byte) => {
                *pos += 1;
                Ok(byte)
            }
            None => Err(DecodeError::TruncatedInput),
        })?;
        Ok(zigzag_decode(unsigned))
    }

    fn read_float(&mut self) -> Result<f32, DecodeError> {
        self.take_array::<4>().map(f32::from_le_bytes)
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        self.take_array::<8>().map(f64::from_le_bytes)
    }

    fn read_fixed(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        self.take(len)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::TruncatedInput);
        }
        self.pos += len;
        Ok(())
    }

    fn is_at_end(&mut self) -> Result<bool, DecodeError> {
        Ok(self.pos >= self.buf.len())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }
}

// ============================================================================
// ReadDecoder
// ============================================================================

/// Decoder over a buffered, forward-only reader.
///
/// Length-prefixed values are read incrementally, so a corrupt length
/// prefix fails with `TruncatedInput` at the end of the stream instead of
/// allocating the claimed size up front.
#[derive(Debug)]
pub struct ReadDecoder<R> {
    reader: R,
    offset: u64,
}

impl<R: BufRead> ReadDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    /// Recover the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let byte = match self.reader.fill_buf()?.first() {
            Some(&byte) => byte,
            None => return Err(DecodeError::TruncatedInput),
        };
        self.reader.consume(1);
        self.offset += 1;
        Ok(byte)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        self.reader.read_exact(&mut out)?;
        self.offset += N as u64;
        Ok(out)
    }
}

impl<R: BufRead> BinaryDecoder for ReadDecoder<R> {
    fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        let byte = self.read_byte()?;
        decode_bool_byte(byte)
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        decode_varint_with(|| self.read_byte()).map(zigzag_decode)
    }

    fn read_float(&mut self) -> Result<f32, DecodeError> {
        self.read_array::<4>().map(f32::from_le_bytes)
    }

    fn read_double(&mut self) -> Result<f64, DecodeError> {
        self.read_array::<8>().map(f64::from_le_bytes)
    }

    fn read_fixed(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        let mut buf = Vec::new();
        let read = (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        self.offset += read as u64;
        if read < len {
            return Err(DecodeError::TruncatedInput);
        }
        Ok(Bytes::from(buf))
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        let skipped = io::copy(&mut (&mut self.reader).take(len as u64), &mut io::sink())?;
        self.offset += skipped;
        if skipped < len as u64 {
            return Err(DecodeError::TruncatedInput);
        }
        Ok(())
    }

    fn is_at_end(&mut self) -> Result<bool, DecodeError> {
        Ok(self.reader.fill_buf()?.is_empty())
    }

    fn position(&self) -> u64 {
        self.offset
    }
}
