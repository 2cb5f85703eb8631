//! Server network layer: TCP accept loop and task wiring

use crate::config::ServerConfig;
use crate::framing::MessageFramer;
use crate::listener::{self, CloseReason};
use crate::processor::CommandProcessor;
use crate::queue::{command_queue, CommandSender};
use crate::registry::ConnectionRegistry;
use crate::store::StateStore;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// A bound, not yet running server
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    registry: ConnectionRegistry,
    store: StateStore,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!(
            "Server listening on {} ({} framing)",
            listener.local_addr()?,
            config.framing
        );

        Ok(Server {
            listener,
            config,
            registry: ConnectionRegistry::new(),
            store: StateStore::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts the command processor and the accept loop
    pub fn spawn(self) -> Result<ServerHandle, Box<dyn std::error::Error>> {
        let local_addr = self.listener.local_addr()?;
        let (commands, queue) = command_queue();

        let processor = CommandProcessor::new(self.store.clone(), self.registry.clone());
        let processor_task = tokio::spawn(processor.run(queue));

        let (stop_tx, stop_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(
            self.listener,
            self.config,
            self.registry.clone(),
            commands,
            stop_rx,
        ));

        Ok(ServerHandle {
            local_addr,
            registry: self.registry,
            store: self.store,
            stop: stop_tx,
            accept_task,
            processor_task,
        })
    }
}

/// Handle to a running server. Dropping it without calling
/// [`ServerHandle::shutdown`] stops accepting new clients.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: ConnectionRegistry,
    store: StateStore,
    stop: oneshot::Sender<()>,
    accept_task: JoinHandle<()>,
    processor_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Stops accepting, closes every registered connection and stops the
    /// command processor.
    ///
    /// Listener tasks are aborted before the write halves are closed, so
    /// once this returns no socket is left open and nothing queued after
    /// that point reaches the store. Returns the number of connections
    /// closed.
    pub async fn shutdown(self) -> usize {
        let _ = self.stop.send(());
        if let Err(e) = self.accept_task.await {
            error!("Accept loop ended abnormally: {}", e);
        }

        let closed = self.registry.close_all().await;

        self.processor_task.abort();
        let _ = self.processor_task.await;

        info!("Server shut down");
        closed
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: ServerConfig,
    registry: ConnectionRegistry,
    commands: CommandSender,
    mut stop: oneshot::Receiver<()>,
) {
    let mut listeners: JoinSet<CloseReason> = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    spawn_connection(
                        stream,
                        peer_addr,
                        &config,
                        &registry,
                        &commands,
                        &mut listeners,
                    )
                    .await;
                }
                Err(e) => {
                    error!("Failed to accept client: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(finished) = listeners.join_next(), if !listeners.is_empty() => {
                match finished {
                    Ok(reason) => debug!("Listener finished: {:?}", reason),
                    Err(e) => error!("Listener task failed: {}", e),
                }
            }
            _ = &mut stop => break,
        }
    }

    info!("Stopped accepting, closing {} listener(s)", listeners.len());
    listeners.shutdown().await;
}

async fn spawn_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: &ServerConfig,
    registry: &ConnectionRegistry,
    commands: &CommandSender,
    listeners: &mut JoinSet<CloseReason>,
) {
    let (reader, writer) = stream.into_split();
    let client_id = registry.register(writer).await;
    info!("Client {} connected from {}", client_id, peer_addr);

    let framer = MessageFramer::new(config.framing, config.max_message_size);
    listeners.spawn(listener::listen(
        client_id,
        reader,
        framer,
        config.max_message_size,
        commands.clone(),
        registry.clone(),
    ));
}
