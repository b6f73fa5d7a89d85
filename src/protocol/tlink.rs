//! TLink framing: byte stuffing and packet extraction.
//!
//! A packet is `stuff(header) ++ 0x7E ++ stuff(payload) ++ 0x7F`. The
//! three special bytes are stuffed inside either region:
//! `0x7D → {0x7D, 0x00}`, `0x7E → {0x7D, 0x01}`, `0x7F → {0x7D, 0x02}`,
//! so the delimiters only ever appear in delimiter position. The header
//! is opaque at this layer; the session captures the first one it sees
//! and reuses it for outbound packets.

use bytes::{Buf, BufMut, BytesMut};
use byteorder::{BigEndian, ByteOrder};
use tokio_util::codec::{Decoder, Encoder};

use super::{ESCAPE, HEADER_END, PACKET_END};
use crate::error::{Error, Result};

/// One parsed TLink packet: unstuffed header and payload regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlinkFrame {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
}

impl TlinkFrame {
    pub fn new(header: Vec<u8>, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }
}

/// Packet-boundary policy for the stream scanner.
///
/// `DelimiterScan` is the panel default. `LengthPrefixed` is the DLS
/// variant: a 2-byte big-endian length bounds the packet and, while the
/// DLS cipher is active, the body is opaque and no delimiter scan
/// happens inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    DelimiterScan,
    LengthPrefixed { encrypted: bool },
}

/// Append `data` to `out`, stuffing the three special bytes.
fn stuff(data: &[u8], out: &mut Vec<u8>) {
    for &b in data {
        match b {
            ESCAPE => out.extend_from_slice(&[ESCAPE, 0x00]),
            HEADER_END => out.extend_from_slice(&[ESCAPE, 0x01]),
            PACKET_END => out.extend_from_slice(&[ESCAPE, 0x02]),
            _ => out.push(b),
        }
    }
}

/// Reverse byte stuffing over one region.
///
/// A raw delimiter inside the region, an unknown escape code, or a
/// trailing escape with nothing after it are all stuffing violations.
fn unstuff(region: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(region.len());
    let mut iter = region.iter();
    while let Some(&b) = iter.next() {
        match b {
            ESCAPE => match iter.next() {
                Some(0x00) => out.push(ESCAPE),
                Some(0x01) => out.push(HEADER_END),
                Some(0x02) => out.push(PACKET_END),
                Some(&code) => {
                    return Err(Error::Encoding(format!("unknown escape code {code:#04x}")))
                }
                None => return Err(Error::Encoding("escape byte at end of region".into())),
            },
            HEADER_END | PACKET_END => {
                return Err(Error::Encoding(format!(
                    "raw delimiter {b:#04x} inside region"
                )))
            }
            _ => out.push(b),
        }
    }
    Ok(out)
}

/// Encode one packet: stuffed header, `0x7E`, stuffed payload, `0x7F`.
pub fn encode_frame(header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + payload.len() + 2);
    stuff(header, &mut out);
    out.push(HEADER_END);
    stuff(payload, &mut out);
    out.push(PACKET_END);
    out
}

/// Split one extracted packet into its unstuffed header and payload.
///
/// `packet` must be exactly one packet including the trailing `0x7F`.
pub fn parse_frame(packet: &[u8]) -> Result<TlinkFrame> {
    let Some((&last, body)) = packet.split_last() else {
        return Err(Error::Framing("empty packet".into()));
    };
    if last != PACKET_END {
        return Err(Error::Framing("packet does not end with 0x7F".into()));
    }
    let Some(split) = body.iter().position(|&b| b == HEADER_END) else {
        return Err(Error::Framing("no 0x7E header delimiter before 0x7F".into()));
    };
    let header = unstuff(&body[..split])?;
    let payload = unstuff(&body[split + 1..])?;
    Ok(TlinkFrame { header, payload })
}

/// Stream codec extracting whole TLink packets from a byte source.
#[derive(Debug, Clone)]
pub struct TlinkCodec {
    boundary: Boundary,
}

impl TlinkCodec {
    pub fn new() -> Self {
        Self {
            boundary: Boundary::DelimiterScan,
        }
    }

    pub fn with_boundary(boundary: Boundary) -> Self {
        Self { boundary }
    }
}

impl Default for TlinkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TlinkCodec {
    type Item = TlinkFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TlinkFrame>> {
        match self.boundary {
            Boundary::DelimiterScan => {
                let Some(end) = src.iter().position(|&b| b == PACKET_END) else {
                    return Ok(None);
                };
                let packet = src.split_to(end + 1);
                parse_frame(&packet).map(Some)
            }
            Boundary::LengthPrefixed { encrypted } => {
                if src.len() < 2 {
                    return Ok(None);
                }
                let len = BigEndian::read_u16(&src[..2]) as usize;
                if src.len() < 2 + len {
                    src.reserve(2 + len - src.len());
                    return Ok(None);
                }
                src.advance(2);
                let body = src.split_to(len);
                if encrypted {
                    // Opaque ciphertext; the DLS session decrypts before
                    // any delimiter handling.
                    Ok(Some(TlinkFrame::new(Vec::new(), body.to_vec())))
                } else {
                    parse_frame(&body).map(Some)
                }
            }
        }
    }
}

impl Encoder<TlinkFrame> for TlinkCodec {
    type Error = Error;

    fn encode(&mut self, item: TlinkFrame, dst: &mut BytesMut) -> Result<()> {
        let packet = encode_frame(&item.header, &item.payload);
        match self.boundary {
            Boundary::DelimiterScan => dst.put_slice(&packet),
            Boundary::LengthPrefixed { .. } => {
                if packet.len() > u16::MAX as usize {
                    return Err(Error::Framing(format!(
                        "packet length {} exceeds length prefix",
                        packet.len()
                    )));
                }
                dst.put_u16(packet.len() as u16);
                dst.put_slice(&packet);
            }
        }
        Ok(())
    }
}
