//! Error types for TLink.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for TLink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for TLink.
///
/// Every failure carries exactly one kind; protocol outcomes (a panel
/// rejecting a command with a well-formed response) are not errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller cancellation observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Remote closed the connection or a transport write failed.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// TLink delimiter missing or misplaced.
    #[error("framing error: {0}")]
    Framing(String),

    /// Byte-stuffing violation inside a TLink region.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// ECB configure/encrypt/decrypt failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// CRC mismatch, length overflow, or bad message payload.
    #[error("packet parse error: {reason}")]
    PacketParse {
        reason: String,
        /// Hex dump of the offending bytes, when available.
        packet: Option<String>,
    },

    /// Session registry lookup miss.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Handshake received a message of the wrong type.
    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse { expected: &'static str, got: String },

    /// Command-response wait exceeded its budget.
    #[error("timed out after {0:?} waiting for a response")]
    Timeout(Duration),

    /// Configuration load or validation failure.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a packet-parse error with a hex dump of the offending bytes.
    pub fn parse(reason: impl Into<String>, packet: &[u8]) -> Self {
        Self::PacketParse {
            reason: reason.into(),
            packet: Some(hex::encode(packet)),
        }
    }

    /// Check whether the receive pump may log this error and keep reading.
    ///
    /// Framing, encoding and parse failures poison one packet, not the
    /// connection. Everything else terminates the pump.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Framing(_) | Error::Encoding(_) | Error::PacketParse { .. }
        )
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Disconnected(e.to_string())
    }
}

impl From<crate::wire::WireError> for Error {
    fn from(e: crate::wire::WireError) -> Self {
        Error::PacketParse {
            reason: e.to_string(),
            packet: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attaches_hex_dump() {
        let err = Error::parse("crc mismatch", &[0xDE, 0xAD]);
        match err {
            Error::PacketParse { packet, .. } => assert_eq!(packet.as_deref(), Some("dead")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::Framing("x".into()).is_recoverable());
        assert!(Error::Encoding("x".into()).is_recoverable());
        assert!(!Error::Disconnected("x".into()).is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());
    }
}
