use log::{debug, error, info, warn};
use serde_json::Value;
use shared::{ClientMessage, ProtocolError, ServerMessage, StatePatch, Status, MAX_MESSAGE_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad message from server: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("server closed the connection during the handshake")]
    Closed,
    #[error("handshake rejected: {0:?}")]
    Rejected(ServerMessage),
}

/// Splits the server's byte stream into JSON messages.
///
/// Replies end in a newline but operator pushes arrive exactly as typed, so
/// values are cut by JSON structure rather than by line.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buffer: Vec<u8>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<ServerMessage, ProtocolError>> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        while self.decode_next(&mut messages) {}

        if self.buffer.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Discarding {} bytes of unterminated server data",
                self.buffer.len()
            );
            self.buffer.clear();
        }

        messages
    }

    /// Decodes values from the front of the buffer. Returns true when a
    /// syntax error was skipped and decoding should resume.
    fn decode_next(&mut self, messages: &mut Vec<Result<ServerMessage, ProtocolError>>) -> bool {
        let mut consumed = 0;
        let mut resume = false;
        let mut stream = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Value>();

        loop {
            match stream.next() {
                Some(Ok(value)) => {
                    consumed = stream.byte_offset();
                    messages.push(serde_json::from_value(value).map_err(ProtocolError::from));
                }
                // Incomplete value, wait for more bytes.
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    messages.push(Err(ProtocolError::from(e)));
                    // Skip the rest of the bad line only.
                    consumed = match self.buffer[consumed..].iter().position(|&b| b == b'\n') {
                        Some(newline) => {
                            resume = true;
                            consumed + newline + 1
                        }
                        None => self.buffer.len(),
                    };
                    break;
                }
                None => {
                    consumed = self.buffer.len();
                    break;
                }
            }
        }

        self.buffer.drain(..consumed);
        resume && !self.buffer.is_empty()
    }
}

/// A connected session. Outbound messages are written by a background task
/// and authoritative updates from the server are queued for the game loop.
pub struct Connection {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    authoritative: mpsc::UnboundedReceiver<StatePatch>,
}

impl Connection {
    /// Queues a message. Returns false once the writer has stopped.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outbound.send(message).is_ok()
    }

    pub fn try_recv_authoritative(&mut self) -> Option<StatePatch> {
        self.authoritative.try_recv().ok()
    }

    pub async fn recv_authoritative(&mut self) -> Option<StatePatch> {
        self.authoritative.recv().await
    }

    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Connects, performs the `CONNECT` handshake and starts the I/O tasks.
/// Fails unless the server answers `SUCCESS`.
pub async fn connect(addr: &str) -> Result<Connection, ClientError> {
    info!("Connecting to {}", addr);
    let stream = TcpStream::connect(addr).await?;
    let (mut reader, mut writer) = stream.into_split();

    writer
        .write_all(ClientMessage::Connect.to_line().as_bytes())
        .await?;

    let mut decoder = MessageDecoder::new();
    let (reply, leftover) = read_first_message(&mut reader, &mut decoder).await?;
    match reply {
        ServerMessage::Response {
            status: Status::Success,
        } => info!("Connected to server {}", addr),
        other => return Err(ClientError::Rejected(other)),
    }

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (authoritative_tx, authoritative_rx) = mpsc::unbounded_channel();

    for message in leftover {
        forward(message, &authoritative_tx);
    }

    tokio::spawn(write_loop(writer, outbound_rx));
    tokio::spawn(read_loop(reader, decoder, authoritative_tx));

    Ok(Connection {
        outbound: outbound_tx,
        authoritative: authoritative_rx,
    })
}

async fn read_first_message<R>(
    reader: &mut R,
    decoder: &mut MessageDecoder,
) -> Result<(ServerMessage, Vec<Result<ServerMessage, ProtocolError>>), ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; MAX_MESSAGE_SIZE];

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Err(ClientError::Closed);
        }

        let mut messages = decoder.push(&buffer[..n]).into_iter();
        if let Some(first) = messages.next() {
            return Ok((first?, messages.collect()));
        }
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<ClientMessage>) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = writer.write_all(message.to_line().as_bytes()).await {
            error!("Failed to send to server: {}", e);
            return;
        }
    }

    let _ = writer.shutdown().await;
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    mut decoder: MessageDecoder,
    authoritative: mpsc::UnboundedSender<StatePatch>,
) {
    let mut buffer = [0u8; MAX_MESSAGE_SIZE];

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Server closed the connection");
                return;
            }
            Ok(n) => {
                for message in decoder.push(&buffer[..n]) {
                    if !forward(message, &authoritative) {
                        return;
                    }
                }
            }
            Err(e) => {
                error!("Error receiving from server: {}", e);
                return;
            }
        }
    }
}

/// Returns false when nobody is listening for updates any more
fn forward(
    message: Result<ServerMessage, ProtocolError>,
    authoritative: &mpsc::UnboundedSender<StatePatch>,
) -> bool {
    match message {
        Ok(ServerMessage::Authoritative { state }) => {
            info!("Authoritative update: {:?}", state);
            authoritative.send(state).is_ok()
        }
        Ok(ServerMessage::Response { status }) => {
            debug!("Server response: {:?}", status);
            true
        }
        Err(e) => {
            warn!("Ignoring server message: {}", e);
            true
        }
    }
}
