//! Pending-receiver correlation.
//!
//! Every tracked send registers a receiver keyed by the packet's sender
//! sequence and, for command messages, the command sequence. Inbound
//! packets are offered to receivers in insertion order; the first
//! acceptor wins and completed receivers leave the list.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::message::Message;
use crate::protocol::ItPacket;

/// What a tracked send resolves to: the matched command message, or
/// nothing for a plain acknowledged notification.
pub type SendOutcome = Result<Option<Message>>;

struct Pending {
    id: u64,
    sender_seq: u8,
    command_seq: Option<u8>,
    /// A protocol ack for the outbound arrived; command receivers keep
    /// waiting for the command-level completion.
    acknowledged: bool,
    tx: oneshot::Sender<SendOutcome>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    list: Vec<Pending>,
}

/// The session's pending-receiver list.
#[derive(Default)]
pub struct PendingReceivers {
    inner: Mutex<Inner>,
}

impl PendingReceivers {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// Register a receiver for an outbound transaction.
    ///
    /// Pass `command_seq` for command messages; `None` waits for the
    /// protocol-level `SimpleAck` alone.
    pub fn register(
        registry: &Arc<Self>,
        sender_seq: u8,
        command_seq: Option<u8>,
    ) -> ReceiverHandle {
        let (tx, rx) = oneshot::channel();
        let mut inner = registry.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.list.push(Pending {
            id,
            sender_seq,
            command_seq,
            acknowledged: false,
            tx,
        });
        ReceiverHandle {
            id,
            registry: Arc::clone(registry),
            rx,
        }
    }

    /// Offer an inbound packet. Returns `true` when a receiver accepted
    /// it (whether or not it completed).
    pub fn offer(&self, packet: &ItPacket) -> bool {
        let mut inner = self.inner.lock();
        match &packet.message {
            None => {
                // SimpleAck: matches by receiver sequence.
                let found = inner
                    .list
                    .iter()
                    .position(|p| p.sender_seq == packet.receiver);
                match found {
                    Some(index) if inner.list[index].command_seq.is_none() => {
                        let done = inner.list.remove(index);
                        let _ = done.tx.send(Ok(None));
                        true
                    }
                    Some(index) => {
                        inner.list[index].acknowledged = true;
                        true
                    }
                    None => false,
                }
            }
            Some(message) => Self::offer_command_locked(&mut inner, message),
        }
    }

    /// Offer a command message alone (MultipleMessage sub-messages).
    pub fn offer_command(&self, message: &Message) -> bool {
        Self::offer_command_locked(&mut self.inner.lock(), message)
    }

    fn offer_command_locked(inner: &mut Inner, message: &Message) -> bool {
        let Some(seq) = message.command_sequence() else {
            return false;
        };
        let position = inner
            .list
            .iter()
            .position(|p| p.command_seq == Some(seq));
        if let Some(index) = position {
            let done = inner.list.remove(index);
            tracing::trace!(
                command_seq = seq,
                acknowledged = done.acknowledged,
                "command receiver completed"
            );
            let _ = done.tx.send(Ok(Some(message.clone())));
            true
        } else {
            false
        }
    }

    /// Fail every outstanding receiver and empty the list.
    pub fn fail_all(&self, error: impl Fn() -> Error) {
        let mut inner = self.inner.lock();
        for pending in inner.list.drain(..) {
            let _ = pending.tx.send(Err(error()));
        }
    }

    fn remove(&self, id: u64) {
        self.inner.lock().list.retain(|p| p.id != id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().list.len()
    }
}

/// Caller side of one pending receiver.
///
/// Dropping the handle deregisters the receiver, so an abandoned send
/// leaves nothing behind.
pub struct ReceiverHandle {
    id: u64,
    registry: Arc<PendingReceivers>,
    rx: oneshot::Receiver<SendOutcome>,
}

impl ReceiverHandle {
    /// Wait for the correlated completion.
    pub async fn recv(&mut self) -> SendOutcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Disconnected(
                "session closed while awaiting response".into(),
            )),
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
