//! The fixed four-step ITv2 handshake.
//!
//! Always initiated by the panel. Encryption switches on one direction
//! at a time: our step-3 response is the first encrypted outbound byte,
//! and the panel's step-4 response is the first encrypted inbound byte.
//! Anything out of order, malformed or of the wrong type aborts the
//! handshake and discards the session.

use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PanelFramed, SessionState};
use crate::config::AccessConfig;
use crate::crypto::SessionCrypto;
use crate::error::{Error, Result};
use crate::protocol::message::{
    CommandResponse, EncryptionType, Message, OpenSession, RequestAccess, ResponseCode,
};
use crate::protocol::{add_framing, remove_framing, ItPacket, TlinkFrame};

/// Everything the connected session inherits from the handshake.
pub(crate) struct HandshakeOutcome {
    /// TLink header captured from the panel's first packet; reused on
    /// every outbound packet.
    pub header: Vec<u8>,
    pub session_id: String,
    pub crypto: SessionCrypto,
    pub local_seq: u8,
    pub remote_seq: u8,
    pub command_seq: u8,
}

pub(crate) async fn run(
    framed: &mut PanelFramed,
    access: &AccessConfig,
    cancel: &CancellationToken,
) -> Result<HandshakeOutcome> {
    let mut local_seq: u8 = 1;

    // Step 1: the panel opens; capture its header as our identity and
    // default outbound header, adopt its command counter.
    debug!(state = ?SessionState::WaitingForOpenSession, "handshake started");
    let frame = recv_frame(framed, cancel).await?;
    let header = frame.header.clone();
    let session_id = String::from_utf8_lossy(&header).into_owned();
    let packet = decode_payload(&frame.payload, None)?;
    let open = match packet.message {
        Some(Message::OpenSession(open)) => open,
        other => return Err(unexpected("OpenSession", &other)),
    };
    let mut remote_seq = packet.sender;
    let mut command_seq = open.command_sequence;
    let encryption_type = open.encryption_type;

    let reply = CommandResponse {
        command_sequence: command_seq,
        code: ResponseCode::Success,
    };
    write_packet(
        framed,
        &header,
        None,
        &ItPacket::new(local_seq, remote_seq, Message::CommandResponse(reply)),
    )
    .await?;
    expect_ack(framed, cancel, local_seq, None).await?;

    // Step 2: mirror the open back as our own transaction.
    local_seq = local_seq.wrapping_add(1);
    command_seq = command_seq.wrapping_add(1);
    let mirrored = OpenSession {
        command_sequence: command_seq,
        ..open
    };
    write_packet(
        framed,
        &header,
        None,
        &ItPacket::new(local_seq, remote_seq, Message::OpenSession(mirrored)),
    )
    .await?;
    let packet = read_packet(framed, cancel, None).await?;
    match &packet.message {
        Some(Message::CommandResponse(r)) if r.command_sequence == command_seq => {}
        other => return Err(unexpected("CommandResponse", other)),
    }
    remote_seq = packet.sender;
    write_packet(framed, &header, None, &ItPacket::ack(local_seq, remote_seq)).await?;

    let code = access.code_for(encryption_type == EncryptionType::Type1);
    let mut crypto = SessionCrypto::new(encryption_type, code);

    // Step 3: the panel's initializer keys our outbound direction; the
    // response below is the first encrypted byte we emit. The panel's
    // closing ack is still plaintext.
    debug!(state = ?SessionState::WaitingForRequestAccess, "session opened both ways");
    let packet = read_packet(framed, cancel, None).await?;
    let request = match packet.message {
        Some(Message::RequestAccess(request)) => request,
        other => return Err(unexpected("RequestAccess", &other)),
    };
    remote_seq = packet.sender;
    command_seq = request.command_sequence;
    crypto.configure_outbound(&request.initializer)?;
    let reply = CommandResponse {
        command_sequence: command_seq,
        code: ResponseCode::Success,
    };
    write_packet(
        framed,
        &header,
        Some(&crypto),
        &ItPacket::new(local_seq, remote_seq, Message::CommandResponse(reply)),
    )
    .await?;
    expect_ack(framed, cancel, local_seq, None).await?;

    // Step 4: our initializer keys the inbound direction; the panel's
    // response arrives encrypted, and everything after is.
    let initializer = crypto.configure_inbound()?;
    local_seq = local_seq.wrapping_add(1);
    command_seq = command_seq.wrapping_add(1);
    let request = RequestAccess {
        command_sequence: command_seq,
        initializer,
    };
    write_packet(
        framed,
        &header,
        Some(&crypto),
        &ItPacket::new(local_seq, remote_seq, Message::RequestAccess(request)),
    )
    .await?;
    let packet = read_packet(framed, cancel, Some(&crypto)).await?;
    match &packet.message {
        Some(Message::CommandResponse(r)) if r.command_sequence == command_seq => {}
        other => return Err(unexpected("CommandResponse", other)),
    }
    remote_seq = packet.sender;
    write_packet(
        framed,
        &header,
        Some(&crypto),
        &ItPacket::ack(local_seq, remote_seq),
    )
    .await?;

    debug!(
        state = ?SessionState::Connected,
        %session_id,
        encryption = ?encryption_type,
        "handshake complete"
    );
    Ok(HandshakeOutcome {
        header,
        session_id,
        crypto,
        local_seq,
        remote_seq,
        command_seq,
    })
}

async fn recv_frame(framed: &mut PanelFramed, cancel: &CancellationToken) -> Result<TlinkFrame> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        item = framed.next() => match item {
            None => Err(Error::Disconnected("stream closed during handshake".into())),
            Some(frame) => frame,
        },
    }
}

fn decode_payload(payload: &[u8], crypto: Option<&SessionCrypto>) -> Result<ItPacket> {
    let plain;
    let body = match crypto {
        Some(crypto) => {
            plain = crypto.decrypt_inbound(payload)?;
            plain.as_slice()
        }
        None => payload,
    };
    let data = remove_framing(body)?;
    ItPacket::decode(&data)
}

async fn read_packet(
    framed: &mut PanelFramed,
    cancel: &CancellationToken,
    crypto: Option<&SessionCrypto>,
) -> Result<ItPacket> {
    let frame = recv_frame(framed, cancel).await?;
    decode_payload(&frame.payload, crypto)
}

async fn write_packet(
    framed: &mut PanelFramed,
    header: &[u8],
    crypto: Option<&SessionCrypto>,
    packet: &ItPacket,
) -> Result<()> {
    let body = packet.encode()?;
    let framing = add_framing(&body)?;
    let payload = match crypto {
        Some(crypto) => crypto.encrypt_outbound(&framing)?,
        None => framing,
    };
    framed.send(TlinkFrame::new(header.to_vec(), payload)).await
}

async fn expect_ack(
    framed: &mut PanelFramed,
    cancel: &CancellationToken,
    local_seq: u8,
    crypto: Option<&SessionCrypto>,
) -> Result<()> {
    let packet = read_packet(framed, cancel, crypto).await?;
    if !packet.is_ack() {
        return Err(unexpected("SimpleAck", &packet.message));
    }
    if packet.receiver != local_seq {
        return Err(Error::UnexpectedResponse {
            expected: "SimpleAck",
            got: format!("ack for sequence {:#04x}", packet.receiver),
        });
    }
    Ok(())
}

fn unexpected(expected: &'static str, got: &Option<Message>) -> Error {
    Error::UnexpectedResponse {
        expected,
        got: got
            .as_ref()
            .map_or_else(|| "SimpleAck".to_owned(), |m| m.name().to_owned()),
    }
}
