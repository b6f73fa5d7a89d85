//! Wire protocol for TLink/ITv2.
//!
//! Two layers wrap every message on the stream:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ TLink:  header ─ 0x7E ─ payload ─ 0x7F        (byte-stuffed)     │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ ITv2:   length (1-2) │ data │ CRC-16 (2)      (optionally ECB)   │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Packet: sender (1) │ receiver (1) │ [command word (2) │ data]    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An ITv2 packet with nothing after the two sequence bytes is a
//! `SimpleAck`. Command-class messages carry one extra correlation byte
//! between the command word and the data.

mod framing;
mod packet;
mod tlink;

pub mod message;

pub use framing::{add_framing, crc16, remove_framing, MAX_FRAME_LEN};
pub use packet::ItPacket;
pub use tlink::{encode_frame, parse_frame, Boundary, TlinkCodec, TlinkFrame};

/// Escape byte introducing a stuffed pair.
pub const ESCAPE: u8 = 0x7D;

/// Delimiter terminating the TLink header region.
pub const HEADER_END: u8 = 0x7E;

/// Delimiter terminating a TLink packet.
pub const PACKET_END: u8 = 0x7F;

/// AES block size the ITv2 layer pads to when encryption is active.
pub const CIPHER_BLOCK: usize = 16;
