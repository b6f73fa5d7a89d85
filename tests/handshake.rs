//! Handshake tests: both encryption types, identity capture, and the
//! abort paths for malformed openings.

mod common;

use common::{connect_pair, connect_pair_with, options, Panel, PANEL_INITIALIZER};

use tlink::error::Error;
use tlink::protocol::message::{
    EncryptionType, Message, RequestAccess, ZoneState, ZoneStatus,
};
use tlink::protocol::ItPacket;
use tlink::session::{Session, SessionOptions, SessionState};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_handshake_type1() {
    let (session, _panel, _token) = connect_pair(EncryptionType::Type1).await;
    assert_eq!(session.session_id(), "0123456789AB");
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_handshake_type2() {
    let (session, _panel, _token) = connect_pair(EncryptionType::Type2).await;
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_session_id_decodes_header_lossily() {
    let (server_io, panel_io) = tokio::io::duplex(16 * 1024);
    let token = CancellationToken::new();
    let mut panel = Panel::with_header(panel_io, EncryptionType::Type1, &[0xFF, 0x31]);

    let server = tokio::spawn({
        let token = token.clone();
        async move { Session::connect(server_io, options(), &token).await }
    });
    panel.handshake().await;
    let session = server.await.unwrap().unwrap();
    assert_eq!(session.session_id(), "\u{FFFD}1");
}

#[tokio::test]
async fn test_handshake_rejects_wrong_opening_message() {
    let (server_io, panel_io) = tokio::io::duplex(16 * 1024);
    let token = CancellationToken::new();
    let mut panel = Panel::new(panel_io, EncryptionType::Type1);

    let server = tokio::spawn({
        let token = token.clone();
        async move { Session::connect(server_io, options(), &token).await }
    });

    panel
        .notify(Message::ZoneStatus(ZoneStatus {
            partition: 1,
            zone: 2,
            state: ZoneState::Open,
        }))
        .await;

    let err = server.await.unwrap().unwrap_err();
    assert!(
        matches!(err, Error::UnexpectedResponse { expected: "OpenSession", .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn test_handshake_rejects_simple_ack_opening() {
    let (server_io, panel_io) = tokio::io::duplex(16 * 1024);
    let token = CancellationToken::new();
    let mut panel = Panel::new(panel_io, EncryptionType::Type1);

    let server = tokio::spawn({
        let token = token.clone();
        async move { Session::connect(server_io, options(), &token).await }
    });

    panel.send_packet(&ItPacket::ack(0x01, 0x00)).await;

    let err = server.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { .. }), "got: {err}");
}

#[tokio::test]
async fn test_handshake_fails_without_access_code() {
    let mut opts = options();
    opts.access.type1_access_code.clear();

    let (server_io, panel_io) = tokio::io::duplex(16 * 1024);
    let token = CancellationToken::new();
    let mut panel = Panel::new(panel_io, EncryptionType::Type1);

    let server = tokio::spawn({
        let token = token.clone();
        async move { Session::connect(server_io, opts, &token).await }
    });

    // Steps 1 and 2 run unencrypted and succeed.
    panel.local_seq = panel.local_seq.wrapping_add(1);
    let open = panel.open_session_message();
    panel
        .send_packet(&ItPacket::new(
            panel.local_seq,
            panel.remote_seq,
            Message::OpenSession(open),
        ))
        .await;
    let reply = panel.recv_packet().await;
    panel.remote_seq = reply.sender;
    panel
        .send_packet(&ItPacket::ack(panel.local_seq, panel.remote_seq))
        .await;

    let packet = panel.recv_packet().await;
    let mirrored_seq = match &packet.message {
        Some(Message::OpenSession(m)) => m.command_sequence,
        other => panic!("expected OpenSession, got {other:?}"),
    };
    panel.remote_seq = packet.sender;
    panel
        .send_packet(&ItPacket::new(
            panel.local_seq,
            panel.remote_seq,
            Message::CommandResponse(tlink::protocol::message::CommandResponse {
                command_sequence: mirrored_seq,
                code: tlink::protocol::message::ResponseCode::Success,
            }),
        ))
        .await;
    assert!(panel.recv_packet().await.is_ack());

    // Step 3: key derivation fails on the server with no access code.
    panel.local_seq = panel.local_seq.wrapping_add(1);
    panel
        .send_packet(&ItPacket::new(
            panel.local_seq,
            panel.remote_seq,
            Message::RequestAccess(RequestAccess {
                command_sequence: mirrored_seq.wrapping_add(1),
                initializer: PANEL_INITIALIZER.to_vec(),
            }),
        ))
        .await;

    let err = server.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Encryption(_)), "got: {err}");
}

#[tokio::test]
async fn test_handshake_rejects_bad_initializer_length() {
    let mut opts = options();
    opts.timing.command_timeout = std::time::Duration::from_secs(5);

    let (server_io, panel_io) = tokio::io::duplex(16 * 1024);
    let token = CancellationToken::new();
    let mut panel = Panel::new(panel_io, EncryptionType::Type2);

    let server = tokio::spawn({
        let token = token.clone();
        async move { Session::connect(server_io, opts, &token).await }
    });

    panel.local_seq = panel.local_seq.wrapping_add(1);
    let open = panel.open_session_message();
    panel
        .send_packet(&ItPacket::new(
            panel.local_seq,
            panel.remote_seq,
            Message::OpenSession(open),
        ))
        .await;
    let reply = panel.recv_packet().await;
    panel.remote_seq = reply.sender;
    panel
        .send_packet(&ItPacket::ack(panel.local_seq, panel.remote_seq))
        .await;

    let packet = panel.recv_packet().await;
    let mirrored_seq = match &packet.message {
        Some(Message::OpenSession(m)) => m.command_sequence,
        other => panic!("expected OpenSession, got {other:?}"),
    };
    panel.remote_seq = packet.sender;
    panel
        .send_packet(&ItPacket::new(
            panel.local_seq,
            panel.remote_seq,
            Message::CommandResponse(tlink::protocol::message::CommandResponse {
                command_sequence: mirrored_seq,
                code: tlink::protocol::message::ResponseCode::Success,
            }),
        ))
        .await;
    assert!(panel.recv_packet().await.is_ack());

    // A 3-byte initializer cannot key the cipher.
    panel.local_seq = panel.local_seq.wrapping_add(1);
    panel
        .send_packet(&ItPacket::new(
            panel.local_seq,
            panel.remote_seq,
            Message::RequestAccess(RequestAccess {
                command_sequence: mirrored_seq.wrapping_add(1),
                initializer: vec![1, 2, 3],
            }),
        ))
        .await;

    let err = server.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Encryption(_)), "got: {err}");
}

#[tokio::test]
async fn test_sequences_continue_from_handshake() {
    let (session, mut panel, _token) = connect_pair_with(
        EncryptionType::Type1,
        SessionOptions {
            timing: tlink::config::TimingConfig {
                quiet_gate: std::time::Duration::from_millis(10),
                ..options().timing
            },
            ..options()
        },
    )
    .await;

    // The handshake used local sequences 1-3; the first tracked send
    // must carry 4.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let send_task = tokio::spawn({
        let session = std::sync::Arc::clone(&session);
        async move {
            session
                .send(Message::ConnectionPoll(
                    tlink::protocol::message::ConnectionPoll {},
                ))
                .await
        }
    });
    let packet = panel.recv_packet().await;
    assert_eq!(packet.sender, 4);
    panel
        .send_packet(&ItPacket::ack(panel.local_seq, packet.sender))
        .await;
    assert_eq!(send_task.await.unwrap().unwrap(), None);
}
