//! Per-connection read loop
//!
//! One listener runs for every accepted client. It is the only reader of
//! that client's stream, which is what keeps a single client's messages in
//! order inside the shared command queue.

use crate::framing::MessageFramer;
use crate::queue::{Command, CommandSender};
use crate::registry::ConnectionRegistry;
use log::{debug, warn};
use shared::ClientId;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Why a listener stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its side (read returned zero bytes)
    PeerClosed,
    /// The read failed
    ReadError,
    /// The command processor is gone
    QueueClosed,
}

/// Reads `reader` until it fails or closes, queueing every framed message.
///
/// Reads are capped at `read_size` bytes. On exit the client is removed from
/// the registry and the read half is dropped; there is no retry.
pub async fn listen<R>(
    client_id: ClientId,
    mut reader: R,
    mut framer: MessageFramer,
    read_size: usize,
    commands: CommandSender,
    registry: ConnectionRegistry,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; read_size.max(1)];

    let reason = 'read: loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break CloseReason::PeerClosed,
            Ok(n) => {
                for message in framer.push(&buffer[..n]) {
                    debug!("Client {} -> {}", client_id, message.trim_end());
                    if commands.push(Command::new(client_id, message)).is_err() {
                        warn!("Command queue closed; dropping client {}", client_id);
                        break 'read CloseReason::QueueClosed;
                    }
                }
            }
            Err(e) => {
                warn!("Client {} read error: {}", client_id, e);
                break CloseReason::ReadError;
            }
        }
    };

    registry.unregister(client_id).await;
    debug!("Listener for client {} stopped: {:?}", client_id, reason);
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Framing;
    use crate::queue::command_queue;
    use std::io;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    async fn registered(registry: &ConnectionRegistry) -> (ClientId, tokio::io::DuplexStream) {
        let (server_side, peer) = duplex(256);
        (registry.register(server_side).await, peer)
    }

    #[tokio::test]
    async fn test_each_read_is_a_command_in_chunk_mode() {
        let registry = ConnectionRegistry::new();
        let (client_id, _peer) = registered(&registry).await;
        let (tx, mut rx) = command_queue();

        let reader = Builder::new()
            .read(b"{\"type\":\"CONNECT\"}")
            .read(b"{\"type\":\"delta\",\"state\":{\"x\":1}}")
            .build();

        let reason = listen(
            client_id,
            reader,
            MessageFramer::new(Framing::Chunk, 1024),
            1024,
            tx,
            registry.clone(),
        )
        .await;

        assert_eq!(reason, CloseReason::PeerClosed);
        assert_eq!(rx.pop().await.unwrap().message, "{\"type\":\"CONNECT\"}");
        assert_eq!(
            rx.pop().await.unwrap().message,
            "{\"type\":\"delta\",\"state\":{\"x\":1}}"
        );
        assert!(rx.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_lines_mode_reassembles_across_reads() {
        let registry = ConnectionRegistry::new();
        let (client_id, _peer) = registered(&registry).await;
        let (tx, mut rx) = command_queue();

        let reader = Builder::new()
            .read(b"{\"type\":\"CON")
            .read(b"NECT\"}\n{\"type\":\"bogus\"}\n")
            .build();

        listen(
            client_id,
            reader,
            MessageFramer::new(Framing::Lines, 1024),
            1024,
            tx,
            registry.clone(),
        )
        .await;

        let first = rx.pop().await.unwrap();
        assert_eq!(first.client_id, client_id);
        assert_eq!(first.message, "{\"type\":\"CONNECT\"}");
        assert_eq!(rx.pop().await.unwrap().message, "{\"type\":\"bogus\"}");
        assert!(rx.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_peer_close_unregisters_client() {
        let registry = ConnectionRegistry::new();
        let (client_id, _peer) = registered(&registry).await;
        let (tx, _rx) = command_queue();

        let reason = listen(
            client_id,
            Builder::new().build(),
            MessageFramer::new(Framing::Lines, 1024),
            1024,
            tx,
            registry.clone(),
        )
        .await;

        assert_eq!(reason, CloseReason::PeerClosed);
        assert!(!registry.contains(client_id).await);
        assert!(!registry.send_to(client_id, b"gone").await);
    }

    #[tokio::test]
    async fn test_read_error_unregisters_client() {
        let registry = ConnectionRegistry::new();
        let (client_id, _peer) = registered(&registry).await;
        let (tx, mut rx) = command_queue();

        let reader = Builder::new()
            .read(b"{\"type\":\"CONNECT\"}\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let reason = listen(
            client_id,
            reader,
            MessageFramer::new(Framing::Lines, 1024),
            1024,
            tx,
            registry.clone(),
        )
        .await;

        assert_eq!(reason, CloseReason::ReadError);
        assert!(!registry.contains(client_id).await);
        // Whatever arrived before the failure is still processed.
        assert_eq!(rx.pop().await.unwrap().message, "{\"type\":\"CONNECT\"}");
    }

    #[tokio::test]
    async fn test_stops_when_queue_closed() {
        let registry = ConnectionRegistry::new();
        let (client_id, _peer) = registered(&registry).await;
        let (tx, rx) = command_queue();
        drop(rx);

        let (mut client_end, server_end) = duplex(256);
        tokio::io::AsyncWriteExt::write_all(&mut client_end, b"{\"type\":\"CONNECT\"}\n")
            .await
            .unwrap();

        let reason = listen(
            client_id,
            server_end,
            MessageFramer::new(Framing::Lines, 1024),
            1024,
            tx,
            registry.clone(),
        )
        .await;

        assert_eq!(reason, CloseReason::QueueClosed);
        assert!(!registry.contains(client_id).await);
    }
}
