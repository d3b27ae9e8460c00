//! A bounded, thread-safe queue of [`frame_core::Message`]s feeding the
//! processing loop, backed by `std::sync::mpsc::sync_channel`.
//!
//! Every other thread in the host (the timer thread, the transport reader
//! thread) holds a [`MessageProducer`] clone; only the processing loop
//! holds the [`MessageConsumer`].

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::time::Duration;

use frame_core::Message;

use crate::error::HostError;

/// The sending half of the message queue. Cheaply cloned, `Send`.
#[derive(Clone)]
pub struct MessageProducer {
    tx: SyncSender<Message>,
}

impl MessageProducer {
    /// Enqueue a message, returning immediately if the queue is full. A
    /// full queue means the processing thread has fallen behind; the
    /// message is dropped rather than stalling the producer.
    pub fn try_send(&self, msg: Message) {
        if self.tx.try_send(msg).is_err() {
            tracing::warn!("message queue full or disconnected, dropping message");
        }
    }
}

/// The receiving half of the message queue, owned by the processing loop.
pub struct MessageConsumer {
    rx: Receiver<Message>,
}

impl MessageConsumer {
    /// Block for up to `timeout` waiting for the next message.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::QueueDisconnected`] if every producer has been
    /// dropped. A plain timeout with no message is `Ok(None)`, not an
    /// error: the caller (`process`) is expected to use that window to
    /// perform other periodic bookkeeping.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>, HostError> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(HostError::QueueDisconnected),
        }
    }

    /// Drain any messages already queued without blocking.
    pub fn drain(&self) -> Vec<Message> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(msg) => out.push(msg),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

/// Build a bounded message queue with the given capacity.
#[must_use]
pub fn channel(capacity: usize) -> (MessageProducer, MessageConsumer) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (MessageProducer { tx }, MessageConsumer { rx })
}
