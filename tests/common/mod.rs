//! Scripted panel peer driving the remote side of a session.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use tlink::config::{AccessConfig, TimingConfig};
use tlink::crypto::DirectionalCipher;
use tlink::protocol::message::{
    CommandResponse, DeviceType, EncryptionType, Message, OpenSession, RequestAccess, ResponseCode,
};
use tlink::protocol::{add_framing, remove_framing, ItPacket, TlinkCodec, TlinkFrame};
use tlink::session::{Session, SessionOptions};

pub const ACCESS_CODE: &str = "12345678";
pub const PANEL_HEADER: &[u8] = b"0123456789AB";
pub const PANEL_INITIALIZER: [u8; 16] = [0xA5; 16];

/// Session options with both access codes set and heartbeats pushed far
/// out so they stay out of scripted exchanges.
pub fn options() -> SessionOptions {
    SessionOptions {
        access: AccessConfig {
            type1_access_code: ACCESS_CODE.into(),
            type2_access_code: ACCESS_CODE.into(),
        },
        timing: TimingConfig {
            quiet_gate: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(10_000),
            command_timeout: Duration::from_secs(60),
        },
    }
}

/// The panel (side B) of a scripted exchange.
pub struct Panel {
    framed: Framed<DuplexStream, TlinkCodec>,
    header: Vec<u8>,
    pub local_seq: u8,
    pub remote_seq: u8,
    pub command_seq: u8,
    kind: EncryptionType,
    encrypt_out: Option<DirectionalCipher>,
    decrypt_in: Option<DirectionalCipher>,
}

impl Panel {
    pub fn new(io: DuplexStream, kind: EncryptionType) -> Self {
        Self::with_header(io, kind, PANEL_HEADER)
    }

    pub fn with_header(io: DuplexStream, kind: EncryptionType, header: &[u8]) -> Self {
        Self {
            framed: Framed::new(io, TlinkCodec::new()),
            header: header.to_vec(),
            local_seq: 0,
            remote_seq: 0,
            command_seq: 0x20,
            kind,
            encrypt_out: None,
            decrypt_in: None,
        }
    }

    pub fn open_session_message(&self) -> OpenSession {
        OpenSession {
            command_sequence: self.command_seq,
            device_type: DeviceType::Panel,
            protocol_version: 0x0200,
            software_revision: "0412".into(),
            encryption_type: self.kind,
            device_id: vec![0x10, 0x20, 0x30, 0x40],
        }
    }

    /// Drive the panel side of the four-step handshake.
    pub async fn handshake(&mut self) {
        // Step 1: open our session.
        self.local_seq = self.local_seq.wrapping_add(1);
        let open = self.open_session_message();
        self.send_packet(&ItPacket::new(
            self.local_seq,
            self.remote_seq,
            Message::OpenSession(open),
        ))
        .await;
        let reply = self.recv_packet().await;
        match &reply.message {
            Some(Message::CommandResponse(r)) => assert_eq!(r.command_sequence, self.command_seq),
            other => panic!("expected CommandResponse, got {other:?}"),
        }
        self.remote_seq = reply.sender;
        self.send_packet(&ItPacket::ack(self.local_seq, self.remote_seq))
            .await;

        // Step 2: the server mirrors our open.
        let packet = self.recv_packet().await;
        match &packet.message {
            Some(Message::OpenSession(m)) => {
                assert_eq!(m.encryption_type, self.kind);
                self.command_seq = m.command_sequence;
            }
            other => panic!("expected OpenSession, got {other:?}"),
        }
        self.remote_seq = packet.sender;
        let response = CommandResponse {
            command_sequence: self.command_seq,
            code: ResponseCode::Success,
        };
        self.send_packet(&ItPacket::new(
            self.local_seq,
            self.remote_seq,
            Message::CommandResponse(response),
        ))
        .await;
        assert!(self.recv_packet().await.is_ack());

        // Step 3: our initializer keys the server-to-panel direction.
        self.local_seq = self.local_seq.wrapping_add(1);
        self.command_seq = self.command_seq.wrapping_add(1);
        let request = RequestAccess {
            command_sequence: self.command_seq,
            initializer: PANEL_INITIALIZER.to_vec(),
        };
        self.send_packet(&ItPacket::new(
            self.local_seq,
            self.remote_seq,
            Message::RequestAccess(request),
        ))
        .await;
        self.decrypt_in = Some(
            DirectionalCipher::new(self.kind, ACCESS_CODE.as_bytes(), &PANEL_INITIALIZER).unwrap(),
        );
        let reply = self.recv_packet().await;
        match &reply.message {
            Some(Message::CommandResponse(r)) => assert_eq!(r.command_sequence, self.command_seq),
            other => panic!("expected CommandResponse, got {other:?}"),
        }
        self.remote_seq = reply.sender;
        self.send_packet(&ItPacket::ack(self.local_seq, self.remote_seq))
            .await;

        // Step 4: the server's initializer keys panel-to-server; our
        // response is our first encrypted packet.
        let packet = self.recv_packet().await;
        let initializer = match &packet.message {
            Some(Message::RequestAccess(r)) => {
                self.command_seq = r.command_sequence;
                r.initializer.clone()
            }
            other => panic!("expected RequestAccess, got {other:?}"),
        };
        self.remote_seq = packet.sender;
        self.encrypt_out =
            Some(DirectionalCipher::new(self.kind, ACCESS_CODE.as_bytes(), &initializer).unwrap());
        let response = CommandResponse {
            command_sequence: self.command_seq,
            code: ResponseCode::Success,
        };
        self.send_packet(&ItPacket::new(
            self.local_seq,
            self.remote_seq,
            Message::CommandResponse(response),
        ))
        .await;
        assert!(self.recv_packet().await.is_ack());
    }

    /// Encode, frame, encrypt (when keyed) and transmit one packet.
    pub async fn send_packet(&mut self, packet: &ItPacket) {
        let body = packet.encode().unwrap();
        let frame = add_framing(&body).unwrap();
        let payload = match &self.encrypt_out {
            Some(cipher) => cipher.encrypt(&frame),
            None => frame,
        };
        self.send_raw_payload(payload).await;
    }

    /// Transmit an arbitrary TLink payload (already framed/encrypted).
    pub async fn send_raw_payload(&mut self, payload: Vec<u8>) {
        self.framed
            .send(TlinkFrame::new(self.header.clone(), payload))
            .await
            .unwrap();
    }

    /// Write raw bytes straight onto the stream, below the codec.
    pub async fn send_raw_bytes(&mut self, bytes: &[u8]) {
        let io = self.framed.get_mut();
        io.write_all(bytes).await.unwrap();
        io.flush().await.unwrap();
    }

    /// Encrypt an already-framed payload with the panel's outbound key.
    pub fn encrypt_payload(&self, frame: &[u8]) -> Vec<u8> {
        self.encrypt_out.as_ref().unwrap().encrypt(frame)
    }

    pub async fn recv_packet(&mut self) -> ItPacket {
        let frame = self
            .framed
            .next()
            .await
            .expect("stream closed")
            .expect("frame decode failed");
        let payload = match &self.decrypt_in {
            Some(cipher) => cipher.decrypt(&frame.payload).unwrap(),
            None => frame.payload,
        };
        let body = remove_framing(&payload).unwrap();
        ItPacket::decode(&body).unwrap()
    }

    pub async fn try_recv_packet(&mut self, wait: Duration) -> Option<ItPacket> {
        match tokio::time::timeout(wait, self.recv_packet()).await {
            Ok(packet) => Some(packet),
            Err(_) => None,
        }
    }

    pub fn next_seq(&mut self) -> u8 {
        self.local_seq = self.local_seq.wrapping_add(1);
        self.local_seq
    }

    /// Start a panel-initiated transaction carrying `message`; returns
    /// its sender sequence.
    pub async fn notify(&mut self, message: Message) -> u8 {
        let seq = self.next_seq();
        self.send_packet(&ItPacket::new(seq, self.remote_seq, message))
            .await;
        seq
    }

    pub async fn expect_ack_for(&mut self, seq: u8) {
        let packet = self.recv_packet().await;
        assert!(packet.is_ack(), "expected ack, got {packet:?}");
        assert_eq!(packet.receiver, seq);
    }
}

/// Handshake a fresh duplex pair; returns the connected server session
/// and the scripted panel.
pub async fn connect_pair(kind: EncryptionType) -> (Arc<Session>, Panel, CancellationToken) {
    connect_pair_with(kind, options()).await
}

pub async fn connect_pair_with(
    kind: EncryptionType,
    options: SessionOptions,
) -> (Arc<Session>, Panel, CancellationToken) {
    let (server_io, panel_io) = tokio::io::duplex(16 * 1024);
    let token = CancellationToken::new();
    let mut panel = Panel::new(panel_io, kind);

    let server = tokio::spawn({
        let token = token.clone();
        async move { Session::connect(server_io, options, &token).await }
    });
    panel.handshake().await;
    let session = server.await.unwrap().expect("handshake failed");
    (Arc::new(session), panel, token)
}
