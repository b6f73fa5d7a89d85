//! ITv2 packet structure.

use super::message::Message;
use crate::error::{Error, Result};

/// One ITv2 packet: the sequence pair plus an optional message.
///
/// A bare sequence pair is a `SimpleAck`, represented here as
/// `message: None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItPacket {
    /// Sender's transaction sequence.
    pub sender: u8,
    /// Sequence of the peer transaction being acknowledged.
    pub receiver: u8,
    pub message: Option<Message>,
}

impl ItPacket {
    pub fn new(sender: u8, receiver: u8, message: Message) -> Self {
        Self {
            sender,
            receiver,
            message: Some(message),
        }
    }

    /// Build a `SimpleAck` closing the peer transaction `receiver`.
    pub fn ack(sender: u8, receiver: u8) -> Self {
        Self {
            sender,
            receiver,
            message: None,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.message.is_none()
    }

    /// Serialize to the bytes the ITv2 framing wraps.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![self.sender, self.receiver];
        if let Some(message) = &self.message {
            out.extend_from_slice(&message.encode()?);
        }
        Ok(out)
    }

    /// Parse a deframed ITv2 body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let [sender, receiver, rest @ ..] = data else {
            return Err(Error::parse("packet shorter than the sequence pair", data));
        };
        let message = if rest.is_empty() {
            None
        } else {
            Some(Message::decode(rest).map_err(|e| Error::parse(e.to_string(), data))?)
        };
        Ok(Self {
            sender: *sender,
            receiver: *receiver,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{StatusRequest, ZoneState, ZoneStatus};

    #[test]
    fn test_simple_ack_is_two_bytes() {
        let ack = ItPacket::ack(0x06, 0x09);
        assert_eq!(ack.encode().unwrap(), vec![0x06, 0x09]);
        let parsed = ItPacket::decode(&[0x06, 0x09]).unwrap();
        assert!(parsed.is_ack());
        assert_eq!(parsed, ack);
    }

    #[test]
    fn test_command_packet_layout() {
        let packet = ItPacket::new(
            0x06,
            0x09,
            Message::StatusRequest(StatusRequest {
                command_sequence: 0x04,
            }),
        );
        assert_eq!(packet.encode().unwrap(), vec![0x06, 0x09, 0x00, 0x52, 0x04]);
        assert_eq!(ItPacket::decode(&[0x06, 0x09, 0x00, 0x52, 0x04]).unwrap(), packet);
    }

    #[test]
    fn test_notification_packet_round_trip() {
        let packet = ItPacket::new(
            0x01,
            0x00,
            Message::ZoneStatus(ZoneStatus {
                partition: 1,
                zone: 8,
                state: ZoneState::Open,
            }),
        );
        let bytes = packet.encode().unwrap();
        assert_eq!(ItPacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_truncated_packets() {
        assert!(ItPacket::decode(&[]).is_err());
        assert!(ItPacket::decode(&[0x01]).is_err());
        // A lone command-word byte after the sequence pair.
        assert!(ItPacket::decode(&[0x01, 0x00, 0x00]).is_err());
    }
}
