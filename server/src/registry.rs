//! Registry of live client connections
//!
//! The registry owns the write side of every accepted connection from the
//! moment it is registered until its listener removes it or the server shuts
//! down. It also hands out client identifiers: the id counter lives behind
//! the same lock as the connection map, so an id is allocated and its
//! connection inserted in one atomic step.
//!
//! Writes never happen while the registry lock is held. A send clones the
//! connection handle out of the map, drops the map lock and then serializes
//! on the per-connection mutex, so the command processor and the operator
//! console can write to different clients without blocking each other.

use log::{debug, info, warn};
use shared::ClientId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};

/// Boxed write half of a client connection
pub type Connection = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared, individually locked handle to a registered connection
pub type ConnectionHandle = Arc<Mutex<Connection>>;

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    connections: HashMap<ClientId, ConnectionHandle>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection under a freshly allocated id
    pub async fn register<W>(&self, connection: W) -> ClientId
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut inner = self.inner.write().await;
        let client_id = ClientId(inner.next_id);
        inner.next_id += 1;

        let handle: ConnectionHandle = Arc::new(Mutex::new(Box::new(connection)));
        inner.connections.insert(client_id, handle);
        debug!("Registered client {}", client_id);

        client_id
    }

    /// Removes a connection. Returns false if it was already gone.
    pub async fn unregister(&self, client_id: ClientId) -> bool {
        let removed = self.inner.write().await.connections.remove(&client_id);
        match removed {
            Some(_) => {
                info!("Client {} disconnected", client_id);
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, client_id: ClientId) -> Option<ConnectionHandle> {
        self.inner.read().await.connections.get(&client_id).cloned()
    }

    pub async fn contains(&self, client_id: ClientId) -> bool {
        self.inner.read().await.connections.contains_key(&client_id)
    }

    /// Ids of all connected clients in ascending order
    pub async fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.inner.read().await.connections.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.connections.is_empty()
    }

    /// Writes `bytes` to one client.
    ///
    /// Returns false when the id is unknown or the write fails. Failures are
    /// logged here and never propagated.
    pub async fn send_to(&self, client_id: ClientId, bytes: &[u8]) -> bool {
        let Some(connection) = self.get(client_id).await else {
            debug!("Send to unknown client {} skipped", client_id);
            return false;
        };

        Self::write_to(client_id, &connection, bytes).await
    }

    /// Writes `bytes` to every registered client and returns how many writes succeeded
    pub async fn broadcast(&self, bytes: &[u8]) -> usize {
        let targets: Vec<(ClientId, ConnectionHandle)> = {
            let inner = self.inner.read().await;
            inner
                .connections
                .iter()
                .map(|(id, handle)| (*id, Arc::clone(handle)))
                .collect()
        };

        let mut delivered = 0;
        for (client_id, connection) in targets {
            if Self::write_to(client_id, &connection, bytes).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Empties the registry and shuts down every connection.
    ///
    /// Listener tasks may still be reading from these streams, so shutdown
    /// errors are expected and ignored. Returns the number of connections
    /// that were registered.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(ClientId, ConnectionHandle)> = {
            let mut inner = self.inner.write().await;
            inner.connections.drain().collect()
        };

        let count = drained.len();
        for (client_id, connection) in drained {
            let mut writer = connection.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!("Closing client {} failed: {}", client_id, e);
            }
        }

        info!("Closed {} client connection(s)", count);
        count
    }

    async fn write_to(client_id: ClientId, connection: &ConnectionHandle, bytes: &[u8]) -> bool {
        let mut writer = connection.lock().await;
        let result = match writer.write_all(bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send to client {}: {}", client_id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_register_assigns_increasing_ids() {
        let registry = ConnectionRegistry::new();

        let (a, _peer_a) = duplex(64);
        let (b, _peer_b) = duplex(64);

        let id_a = registry.register(a).await;
        let id_b = registry.register(b).await;

        assert_eq!(id_a, ClientId(0));
        assert_eq!(id_b, ClientId(1));
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.client_ids().await, vec![id_a, id_b]);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_unregister() {
        let registry = ConnectionRegistry::new();

        let (a, _peer_a) = duplex(64);
        let id_a = registry.register(a).await;
        assert!(registry.unregister(id_a).await);

        let (b, _peer_b) = duplex(64);
        let id_b = registry.register(b).await;
        assert!(id_b > id_a);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (a, _peer) = duplex(64);
        let id = registry.register(a).await;

        assert!(registry.unregister(id).await);
        assert!(!registry.unregister(id).await);
        assert!(!registry.contains(id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_send_to_delivers_bytes() {
        let registry = ConnectionRegistry::new();
        let (server_side, mut peer) = duplex(256);
        let id = registry.register(server_side).await;

        assert!(registry.send_to(id, b"hello").await);

        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_send_to_unknown_client_fails() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to(ClientId(99), b"hello").await);
        assert!(registry.get(ClientId(99)).await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_closed_peer_fails_quietly() {
        let registry = ConnectionRegistry::new();
        let (server_side, peer) = duplex(256);
        let id = registry.register(server_side).await;
        drop(peer);

        assert!(!registry.send_to(id, b"hello").await);
        // A failed write does not unregister; that is the listener's job.
        assert!(registry.contains(id).await);
    }

    #[tokio::test]
    async fn test_broadcast_counts_successful_writes() {
        let registry = ConnectionRegistry::new();
        let (a, mut peer_a) = duplex(256);
        let (b, peer_b) = duplex(256);
        registry.register(a).await;
        registry.register(b).await;
        drop(peer_b);

        assert_eq!(registry.broadcast(b"ping").await, 1);

        let mut buf = [0u8; 4];
        peer_a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_close_all_shuts_down_connections() {
        let registry = ConnectionRegistry::new();
        let (a, mut peer_a) = duplex(256);
        let (b, _peer_b) = duplex(256);
        registry.register(a).await;
        registry.register(b).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);

        // The peer observes end of stream.
        let mut buf = [0u8; 8];
        assert_eq!(peer_a.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_registration_yields_unique_ids() {
        let registry = ConnectionRegistry::new();
        let mut handles = Vec::new();
        let mut peers = Vec::new();

        for _ in 0..32 {
            let (server_side, peer) = duplex(16);
            peers.push(peer);
            let registry = registry.clone();
            handles.push(tokio::spawn(
                async move { registry.register(server_side).await },
            ));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 32);
        assert_eq!(registry.len().await, 32);
    }
}
