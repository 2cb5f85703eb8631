//! Command queue between connection listeners and the command processor
//!
//! Many producers (one per connection), exactly one consumer. The receiving
//! end cannot be cloned, which is what makes the command processor the only
//! place where client messages turn into state changes.
//!
//! The queue is unbounded. A processor that falls behind lets memory grow
//! without limit; nothing here pushes back on fast clients.

use shared::ClientId;
use thiserror::Error;
use tokio::sync::mpsc;

/// One raw inbound message tagged with the client it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub client_id: ClientId,
    pub message: String,
}

impl Command {
    pub fn new(client_id: ClientId, message: impl Into<String>) -> Self {
        Self {
            client_id,
            message: message.into(),
        }
    }
}

/// The consumer is gone; the rejected command is handed back
#[derive(Debug, Error)]
#[error("command queue is closed")]
pub struct QueueClosed(pub Command);

#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
}

pub fn command_queue() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

impl CommandSender {
    /// Appends to the tail of the queue and wakes the consumer
    pub fn push(&self, command: Command) -> Result<(), QueueClosed> {
        self.tx.send(command).map_err(|e| QueueClosed(e.0))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl CommandReceiver {
    /// Waits for the next command.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained.
    pub async fn pop(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// Takes the head of the queue if one is ready, without waiting
    pub fn try_pop(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }
}
