//! # TLink
//!
//! Server implementation of the TLink/ITv2 alarm-panel wire protocol:
//! one long-lived byte stream per panel, a fixed encrypted-session
//! handshake, then typed commands and notifications for the life of the
//! connection.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Server / Session Registry                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        ITv2 Session Engine (handshake, pumps, correlation)      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │           Message Catalog + Declarative Serializer              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │      ITv2 Framing (length + CRC-16)  /  AES-128-ECB Cipher      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │              TLink Framing (byte-stuffed delimiters)            │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]                // ASCII diagrams in docs
#![allow(clippy::cast_possible_truncation)]    // Length fields are range-checked first
#![allow(clippy::cognitive_complexity)]        // Handshake state machine
#![allow(clippy::too_many_lines)]              // Complete implementations
#![allow(clippy::future_not_send)]             // Async internals

pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port for panel connections.
pub const DEFAULT_PORT: u16 = 3072;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::protocol::message::Message;
    pub use crate::protocol::{ItPacket, TlinkCodec, TlinkFrame};
    pub use crate::server::{PanelServer, SessionRegistry};
    pub use crate::session::{Notifications, Session, SessionOptions, SessionState};
}
