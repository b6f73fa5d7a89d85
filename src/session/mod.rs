//! ITv2 session engine.
//!
//! One [`Session`] owns one panel connection for its whole life: the
//! sequence counters, the cipher, the pending-receiver list and the
//! transport. A single receive pump feeds two consumers: correlation
//! of outstanding sends, and the notification channel. Sends are
//! serialized through one mutex that covers exactly the sequence
//! increments, receiver registration and the wire write. Response waits
//! happen outside that mutex, so any number of commands can be in
//! flight while only one packet at a time is on the wire.

mod handshake;
mod receivers;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AccessConfig, Config, TimingConfig};
use crate::crypto::SessionCrypto;
use crate::error::{Error, Result};
use crate::protocol::message::{ConnectionPoll, Message};
use crate::protocol::{add_framing, remove_framing, ItPacket, TlinkCodec, TlinkFrame};

use receivers::PendingReceivers;

/// Byte-stream transport a session can run over.
pub trait PanelIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> PanelIo for T {}

pub(crate) type PanelFramed = Framed<Box<dyn PanelIo>, TlinkCodec>;

/// Session lifecycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninit,
    WaitingForOpenSession,
    WaitingForRequestAccess,
    Connected,
    Closed,
}

/// Per-session configuration, lifted out of the server [`Config`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub access: AccessConfig,
    pub timing: TimingConfig,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            access: config.access.clone(),
            timing: config.timing.clone(),
        }
    }
}

/// State mutated under the send mutex: the sink, the outbound header
/// and all three sequence counters.
struct Outbound {
    sink: SplitSink<PanelFramed, TlinkFrame>,
    header: Vec<u8>,
    local_seq: u8,
    remote_seq: u8,
    command_seq: u8,
}

struct Shared {
    session_id: String,
    timing: TimingConfig,
    crypto: SessionCrypto,
    outbound: AsyncMutex<Outbound>,
    receivers: Arc<PendingReceivers>,
    gate: Arc<QuietGate>,
    shutdown: CancellationToken,
    state: parking_lot::Mutex<SessionState>,
}

/// A connected panel session.
pub struct Session {
    shared: Arc<Shared>,
    notifications: parking_lot::Mutex<Option<Notifications>>,
}

impl Session {
    /// Run the handshake over `io` and start the session tasks.
    ///
    /// Returns only once the session is `Connected`; any handshake
    /// failure discards the connection.
    pub async fn connect<T>(
        io: T,
        options: SessionOptions,
        cancel: &CancellationToken,
    ) -> Result<Self>
    where
        T: PanelIo + 'static,
    {
        let shutdown = cancel.child_token();
        let boxed: Box<dyn PanelIo> = Box::new(io);
        let mut framed = Framed::new(boxed, TlinkCodec::new());

        let outcome = handshake::run(&mut framed, &options.access, &shutdown).await?;
        let (sink, stream) = framed.split();

        let gate = Arc::new(QuietGate::new(options.timing.quiet_gate));
        let (notif_tx, notif_rx) = mpsc::channel(64);

        let shared = Arc::new(Shared {
            session_id: outcome.session_id,
            timing: options.timing,
            crypto: outcome.crypto,
            outbound: AsyncMutex::new(Outbound {
                sink,
                header: outcome.header,
                local_seq: outcome.local_seq,
                remote_seq: outcome.remote_seq,
                command_seq: outcome.command_seq,
            }),
            receivers: PendingReceivers::new(),
            gate: Arc::clone(&gate),
            shutdown,
            state: parking_lot::Mutex::new(SessionState::Connected),
        });

        tokio::spawn(Arc::clone(&gate).run(shared.shutdown.clone()));
        tokio::spawn(run_pump(Arc::clone(&shared), stream, notif_tx));
        tokio::spawn(run_heartbeat(Arc::clone(&shared)));

        Ok(Self {
            shared,
            notifications: parking_lot::Mutex::new(Some(Notifications { rx: notif_rx })),
        })
    }

    /// The UTF-8 decoding of the captured TLink header.
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Send one message and wait for its correlated completion.
    ///
    /// Commands resolve with the matching command message; notifications
    /// resolve with `None` once acknowledged.
    pub async fn send(&self, message: Message) -> Result<Option<Message>> {
        send_message(&self.shared, message).await
    }

    /// Hand out the notification stream. Single consumer; subsequent
    /// calls return `None`.
    pub fn take_notifications(&self) -> Option<Notifications> {
        self.notifications.lock().take()
    }

    /// Begin cooperative shutdown: cancels every in-flight wait, fails
    /// pending receivers, closes the notification channel and the
    /// transport.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.shared.session_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Inbound message stream for one session.
///
/// Finite: ends when the session closes.
#[derive(Debug)]
pub struct Notifications {
    rx: mpsc::Receiver<Message>,
}

impl Notifications {
    /// Next unmatched inbound message, or `None` once the session is
    /// closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

async fn send_message(shared: &Arc<Shared>, mut message: Message) -> Result<Option<Message>> {
    tokio::select! {
        _ = shared.shutdown.cancelled() => return Err(Error::Cancelled),
        () = shared.gate.wait() => {}
    }

    let mut out = tokio::select! {
        _ = shared.shutdown.cancelled() => return Err(Error::Cancelled),
        guard = shared.outbound.lock() => guard,
    };
    out.local_seq = out.local_seq.wrapping_add(1);
    let sender_seq = out.local_seq;
    let command_seq = if message.is_command() {
        out.command_seq = out.command_seq.wrapping_add(1);
        message.set_command_sequence(out.command_seq);
        Some(out.command_seq)
    } else {
        None
    };
    let mut handle = PendingReceivers::register(&shared.receivers, sender_seq, command_seq);
    debug!(
        message = message.name(),
        sender = sender_seq,
        command = ?command_seq,
        "sending"
    );
    let packet = ItPacket::new(sender_seq, out.remote_seq, message);
    write_out(&mut out, &shared.crypto, &packet).await?;
    drop(out);

    let budget = shared.timing.command_timeout;
    tokio::select! {
        biased;
        outcome = tokio::time::timeout(budget, handle.recv()) => match outcome {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(budget)),
        },
        _ = shared.shutdown.cancelled() => Err(Error::Cancelled),
    }
}

async fn write_out(out: &mut Outbound, crypto: &SessionCrypto, packet: &ItPacket) -> Result<()> {
    let body = packet.encode()?;
    let framing = add_framing(&body)?;
    let payload = crypto.encrypt_outbound(&framing)?;
    let header = out.header.clone();
    out.sink.send(TlinkFrame::new(header, payload)).await
}

/// Whether the receive pump may skip this failure and keep reading.
fn pump_recoverable(error: &Error) -> bool {
    // A garbled frame can also surface as a decrypt failure after the
    // handshake; it poisons one frame, not the session.
    error.is_recoverable() || matches!(error, Error::Encryption(_))
}

async fn run_pump(
    shared: Arc<Shared>,
    mut stream: SplitStream<PanelFramed>,
    notif_tx: mpsc::Sender<Message>,
) {
    loop {
        let frame = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            item = stream.next() => match item {
                None => {
                    info!(session_id = %shared.session_id, "panel closed the stream");
                    break;
                }
                Some(Err(e)) if pump_recoverable(&e) => {
                    warn!(session_id = %shared.session_id, error = %e, "discarding inbound bytes");
                    continue;
                }
                Some(Err(e)) => {
                    warn!(session_id = %shared.session_id, error = %e, "transport failed");
                    break;
                }
                Some(Ok(frame)) => frame,
            },
        };

        match handle_frame(&shared, &notif_tx, frame).await {
            Ok(()) => {}
            Err(e) if pump_recoverable(&e) => {
                warn!(session_id = %shared.session_id, error = %e, "discarding inbound packet");
            }
            Err(e) => {
                warn!(session_id = %shared.session_id, error = %e, "receive pump stopping");
                break;
            }
        }
    }

    shared
        .receivers
        .fail_all(|| Error::Disconnected("session closed".into()));
    *shared.state.lock() = SessionState::Closed;
    shared.shutdown.cancel();
    info!(session_id = %shared.session_id, "session closed");
}

async fn handle_frame(
    shared: &Arc<Shared>,
    notif_tx: &mpsc::Sender<Message>,
    frame: TlinkFrame,
) -> Result<()> {
    let plain = shared.crypto.decrypt_inbound(&frame.payload)?;
    let body = remove_framing(&plain)?;
    let packet = ItPacket::decode(&body)?;

    shared.gate.touch();

    if let Some(message) = &packet.message {
        debug!(
            message = message.name(),
            sender = packet.sender,
            "inbound packet"
        );
        // Every non-ack packet gets one SimpleAck; replies reuse the
        // current local sequence without incrementing it.
        let mut out = shared.outbound.lock().await;
        out.remote_seq = packet.sender;
        let ack = ItPacket::ack(out.local_seq, packet.sender);
        write_out(&mut out, &shared.crypto, &ack).await?;
    }

    if shared.receivers.offer(&packet) {
        return Ok(());
    }

    match packet.message {
        None => {
            debug!(receiver = packet.receiver, "unmatched ack ignored");
            Ok(())
        }
        Some(Message::Multiple(envelope)) => {
            let mut responses = 0usize;
            for sub in envelope.messages {
                if sub.is_command() && shared.receivers.offer_command(&sub) {
                    responses += 1;
                    continue;
                }
                publish(notif_tx, sub).await;
            }
            if responses > 1 {
                warn!(responses, "multiple command responses in one envelope");
            }
            Ok(())
        }
        Some(message) => {
            publish(notif_tx, message).await;
            Ok(())
        }
    }
}

async fn publish(notif_tx: &mpsc::Sender<Message>, message: Message) {
    if notif_tx.send(message).await.is_err() {
        debug!("notification consumer gone, dropping message");
    }
}

async fn run_heartbeat(shared: Arc<Shared>) {
    tokio::select! {
        _ = shared.shutdown.cancelled() => return,
        () = shared.gate.wait() => {}
    }
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => return,
            () = tokio::time::sleep(shared.timing.heartbeat_interval) => {}
        }
        match send_message(&shared, Message::ConnectionPoll(ConnectionPoll {})).await {
            Ok(_) => debug!(session_id = %shared.session_id, "heartbeat acknowledged"),
            Err(Error::Timeout(budget)) => {
                warn!(session_id = %shared.session_id, ?budget, "heartbeat unacknowledged");
            }
            Err(Error::Cancelled) => return,
            Err(e) => {
                warn!(session_id = %shared.session_id, error = %e, "heartbeat failed");
                return;
            }
        }
    }
}

/// One-shot gate holding all outbound traffic until the inbound stream
/// has been quiet for the configured window.
///
/// Freshly reconnected panels burst queued notifications with
/// pre-assigned sequence numbers and cannot take interleaved commands;
/// the pump resets the timer on every inbound packet, and once it fires
/// the gate stays open for the life of the session.
struct QuietGate {
    window: Duration,
    deadline: parking_lot::Mutex<Instant>,
    opened: watch::Sender<bool>,
}

impl QuietGate {
    fn new(window: Duration) -> Self {
        let (opened, _) = watch::channel(false);
        Self {
            window,
            deadline: parking_lot::Mutex::new(Instant::now() + window),
            opened,
        }
    }

    /// Inbound activity observed; push the deadline out.
    fn touch(&self) {
        if *self.opened.borrow() {
            return;
        }
        *self.deadline.lock() = Instant::now() + self.window;
    }

    /// Resolves once the gate has opened.
    async fn wait(&self) {
        let mut rx = self.opened.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let deadline = *self.deadline.lock();
            tokio::select! {
                _ = shutdown.cancelled() => return,
                () = tokio::time::sleep_until(deadline) => {}
            }
            if Instant::now() >= *self.deadline.lock() {
                let _ = self.opened.send(true);
                debug!("quiet gate opened");
                return;
            }
        }
    }
}
