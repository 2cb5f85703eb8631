//! The command processor: the single place where client messages take effect
//!
//! Exactly one processor drains the command queue. Because nothing else
//! consumes commands, state updates are applied one at a time in queue
//! order, without a lock held across the whole dispatch step. Replies are
//! written through the connection registry, so a client that disconnected
//! in the meantime simply misses its reply.

use crate::queue::{Command, CommandReceiver};
use crate::registry::ConnectionRegistry;
use crate::store::StateStore;
use log::{debug, error, info, warn};
use shared::{ClientId, ClientMessage, ServerMessage, StateRecord};

/// What processing one command amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `CONNECT` answered with SUCCESS
    Acknowledged,
    /// `delta`/`snapshot` applied; carries the resulting record
    Updated(StateRecord),
    /// Unknown or missing type answered with FAIL
    Rejected,
    /// Undecodable message, logged and ignored
    Dropped,
}

pub struct CommandProcessor {
    store: StateStore,
    registry: ConnectionRegistry,
}

impl CommandProcessor {
    pub fn new(store: StateStore, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Processes commands until every producer has gone away
    pub async fn run(self, mut commands: CommandReceiver) {
        info!("Command processor started");

        while let Some(command) = commands.pop().await {
            self.process(command).await;
        }

        info!("Command processor stopped (queue closed)");
    }

    pub async fn process(&self, command: Command) -> Outcome {
        let Command { client_id, message } = command;

        let decoded = match ClientMessage::decode(&message) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Failed to parse message from client {}: {}", client_id, e);
                return Outcome::Dropped;
            }
        };

        match decoded {
            ClientMessage::Connect => {
                self.reply(client_id, ServerMessage::success()).await;
                Outcome::Acknowledged
            }
            ClientMessage::Delta(patch) | ClientMessage::Snapshot(patch) => {
                let record = self.store.update(client_id, &patch).await;
                debug!("Client {} state: {:?}", client_id, record);
                Outcome::Updated(record)
            }
            ClientMessage::Unknown(kind) => {
                debug!("Client {} sent unsupported type {:?}", client_id, kind);
                self.reply(client_id, ServerMessage::fail()).await;
                Outcome::Rejected
            }
        }
    }

    async fn reply(&self, client_id: ClientId, message: ServerMessage) -> bool {
        match message.to_line() {
            Ok(line) => self.registry.send_to(client_id, line.as_bytes()).await,
            Err(e) => {
                error!("Failed to encode reply for client {}: {}", client_id, e);
                false
            }
        }
    }
}
