//! ITv2 framing: length prefix and CRC-16.
//!
//! The length field is one byte for sizes 0-127; larger frames set bit 7
//! of the first byte and carry the size in two big-endian bytes with
//! that bit masked off (up to 32767). The CRC covers the length byte(s)
//! and the data, poly `0x1021`, init `0xFFFF`, unreflected, no final
//! XOR, big-endian on the wire.
//!
//! When the session cipher is active the whole frame is padded to the
//! block boundary before encryption; on the way in, anything past
//! `length + crc` is padding and is dropped here.

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_16_IBM_3740};

use crate::error::{Error, Result};

/// Largest frame the two-byte length form can describe.
pub const MAX_FRAME_LEN: usize = 0x7FFF;

const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// CRC-16 over `data` (poly 0x1021, init 0xFFFF, no reflection).
pub fn crc16(data: &[u8]) -> u16 {
    CRC.checksum(data)
}

/// Wrap `data` in the ITv2 length + CRC envelope.
pub fn add_framing(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_FRAME_LEN {
        return Err(Error::PacketParse {
            reason: format!("frame length {} exceeds {MAX_FRAME_LEN}", data.len()),
            packet: None,
        });
    }
    let mut out = Vec::with_capacity(data.len() + 4);
    if data.len() <= 0x7F {
        out.push(data.len() as u8);
    } else {
        out.push((data.len() >> 8) as u8 | 0x80);
        out.push(data.len() as u8);
    }
    out.extend_from_slice(data);
    let crc = crc16(&out);
    out.push((crc >> 8) as u8);
    out.push(crc as u8);
    Ok(out)
}

/// Strip the ITv2 envelope, returning exactly the framed data.
///
/// Trailing bytes past the CRC (cipher padding) are ignored.
pub fn remove_framing(frame: &[u8]) -> Result<Vec<u8>> {
    let (len, header_len) = decode_length(frame)?;
    let total = header_len + len + 2;
    if frame.len() < total {
        return Err(Error::parse(
            format!("frame shorter than declared length ({} < {total})", frame.len()),
            frame,
        ));
    }
    let covered = &frame[..header_len + len];
    let expected = crc16(covered);
    let actual = BigEndian::read_u16(&frame[header_len + len..total]);
    if expected != actual {
        return Err(Error::parse(
            format!("crc mismatch (computed {expected:#06x}, received {actual:#06x})"),
            frame,
        ));
    }
    Ok(frame[header_len..header_len + len].to_vec())
}

fn decode_length(frame: &[u8]) -> Result<(usize, usize)> {
    match frame.first() {
        None => Err(Error::parse("empty frame", frame)),
        Some(&b0) if b0 & 0x80 == 0 => Ok((b0 as usize, 1)),
        Some(&b0) => match frame.get(1) {
            Some(&b1) => Ok((((b0 & 0x7F) as usize) << 8 | b1 as usize, 2)),
            None => Err(Error::parse("two-byte length form missing second byte", frame)),
        },
    }
}
