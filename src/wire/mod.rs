//! Declarative binary serializer for ITv2 message bodies.
//!
//! Every message on the wire is mapped to and from bytes through this
//! module. A message type declares its fields once, in wire order, each
//! tagged with a codec marker from [`fields`]; the [`wire_message!`]
//! macro expands the declaration into [`WireRecord`] implementations, so
//! the byte layout is fixed at compile time and a missing or mismatched
//! codec is a compile error.
//!
//! Field-level decode failures carry the offending field's name.
//!
//! [`wire_message!`]: crate::wire_message

mod macros;

pub mod fields;
pub mod time;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

pub use fields::{
    Bcd, BcdPrefixed, BcdTail, Be, Compact, En, Packed, Raw, RawPrefixed, RawTail, Rec, Stamp,
    Utf16, Utf16Table,
};
pub use time::{PanelDate, PanelDateTime, PanelTime};

/// Deserialization and serialization failures, attributed to a field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("field `{field}`: need {needed} byte(s), {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("field `{field}`: length {len} exceeds maximum {max}")]
    LengthOverflow {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("field `{field}`: unknown discriminant {value:#06x}")]
    UnknownDiscriminant { field: &'static str, value: u32 },

    #[error("field `{field}`: {value:#04x} is not a BCD digit pair")]
    BadBcd { field: &'static str, value: u8 },

    #[error("field `{field}`: malformed UTF-16 data")]
    BadString { field: &'static str },

    #[error("field `{field}`: value out of encodable range")]
    OutOfRange { field: &'static str },
}

/// Append-only byte sink used by field codecs.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_slice(&mut self, s: &[u8]) {
        self.buf.extend_from_slice(s);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a message body being decoded.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take exactly `n` bytes, attributing a shortfall to `field`.
    pub fn take_slice(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                field,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn take_u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.take_slice(1, field)?[0])
    }

    pub fn take_u16(&mut self, field: &'static str) -> Result<u16, WireError> {
        Ok(BigEndian::read_u16(self.take_slice(2, field)?))
    }

    pub fn take_u32(&mut self, field: &'static str) -> Result<u32, WireError> {
        Ok(BigEndian::read_u32(self.take_slice(4, field)?))
    }

    /// Consume everything left in the buffer.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }
}

/// A record whose fields serialize in declaration order.
///
/// Implemented by the `wire_message!` macro for message bodies and plain
/// sub-records (object-array elements).
pub trait WireRecord: Sized {
    fn put_fields(&self, w: &mut Writer) -> Result<(), WireError>;
    fn take_fields(r: &mut Reader<'_>) -> Result<Self, WireError>;

    /// Serialize to a standalone byte vector.
    fn to_wire(&self) -> Result<Vec<u8>, WireError> {
        let mut w = Writer::new();
        self.put_fields(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Deserialize from a complete body.
    fn from_wire(data: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(data);
        Self::take_fields(&mut r)
    }
}

/// One field kind: how a value of type `T` maps to wire bytes.
///
/// Codecs are zero-sized markers; parameterized kinds (prefix widths,
/// fixed lengths) use const generics. This set is the serializer's whole
/// annotation vocabulary.
pub trait FieldCodec<T> {
    fn put(value: &T, field: &'static str, w: &mut Writer) -> Result<(), WireError>;
    fn take(field: &'static str, r: &mut Reader<'_>) -> Result<T, WireError>;
}

/// An enum with a fixed-width wire representation (u8 or u16).
pub trait WireEnum: Sized + Copy {
    type Repr: Copy + Into<u32>;

    fn to_raw(self) -> Self::Repr;
    fn from_raw(raw: Self::Repr) -> Option<Self>;
}

/// A bit-field group packed into 1-, 2- or 4-byte storage.
///
/// Named fields occupy `(position, width)` slices of the storage;
/// implementors expose them as accessors.
pub trait PackedFlags: Sized + Copy {
    /// Storage width in bytes (1, 2 or 4).
    const WIDTH: usize;

    fn to_bits(self) -> u32;
    fn from_bits(bits: u32) -> Self;
}

/// A message carrying the command-transaction correlation byte.
///
/// The byte is an ordinary leading field of such messages; the
/// serializer itself has no knowledge of it.
pub trait CommandMessage {
    fn command_sequence(&self) -> u8;
    fn set_command_sequence(&mut self, seq: u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_truncation_names_field() {
        let mut r = Reader::new(&[0x01]);
        let err = r.take_u16("zone").unwrap_err();
        assert_eq!(
            err,
            WireError::Truncated {
                field: "zone",
                needed: 2,
                remaining: 1
            }
        );
    }

    #[test]
    fn test_reader_take_rest() {
        let mut r = Reader::new(&[1, 2, 3]);
        assert_eq!(r.take_u8("a").unwrap(), 1);
        assert_eq!(r.take_rest(), &[2, 3]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_writer_big_endian() {
        let mut w = Writer::new();
        w.put_u16(0x1234);
        w.put_u32(0xA0B0C0D0);
        assert_eq!(w.into_bytes(), vec![0x12, 0x34, 0xA0, 0xB0, 0xC0, 0xD0]);
    }
}
