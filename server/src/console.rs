//! Operator console
//!
//! Reads commands line by line and acts on the running server:
//!
//! - `send <id> <payload>` writes `payload` verbatim to client `<id>`
//! - `state <id>` prints the client's last reported state
//! - `clients` lists connected clients
//! - `exit` shuts the server down

use crate::registry::ConnectionRegistry;
use crate::store::StateStore;
use log::{debug, warn};
use shared::{ClientId, StateRecord};
use std::io::BufRead;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send { client_id: ClientId, payload: String },
    State(ClientId),
    Clients,
    Exit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let (word, rest) = split_word(line.trim_start());

        match word {
            "" => Ok(ConsoleCommand::Empty),
            "exit" if rest.trim().is_empty() => Ok(ConsoleCommand::Exit),
            "exit" => Err(ConsoleError::Usage("exit")),
            "clients" => Ok(ConsoleCommand::Clients),
            "state" => {
                let (id, extra) = split_word(rest.trim_start());
                if id.is_empty() || !extra.trim().is_empty() {
                    return Err(ConsoleError::Usage("state <id>"));
                }
                Ok(ConsoleCommand::State(parse_client_id(id)?))
            }
            "send" => {
                let (id, payload) = split_word(rest.trim_start());
                if id.is_empty() {
                    return Err(ConsoleError::Usage("send <id> <payload>"));
                }
                let client_id = parse_client_id(id)?;
                let payload = strip_payload(payload);
                if payload.is_empty() {
                    return Err(ConsoleError::Usage("send <id> <payload>"));
                }
                Ok(ConsoleCommand::Send { client_id, payload })
            }
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

fn parse_client_id(text: &str) -> Result<ClientId, ConsoleError> {
    text.parse::<u64>()
        .map(ClientId)
        .map_err(|_| ConsoleError::InvalidClientId(text.to_string()))
}

/// Drops the single separating space and one pair of surrounding quotes
fn strip_payload(raw: &str) -> String {
    let payload = raw.strip_prefix(' ').unwrap_or(raw);
    let payload = payload.strip_prefix('"').unwrap_or(payload);
    let payload = payload.strip_suffix('"').unwrap_or(payload);
    payload.to_string()
}

/// Text view of one client's state
pub fn render_state(client_id: ClientId, record: &StateRecord) -> String {
    format!(
        "== CLIENT {} STATE ==\n\
         x:         {}\n\
         y:         {}\n\
         velocity:  {}\n\
         direction: {}\n\
         color:     ({}, {}, {})\n",
        client_id,
        record.x,
        record.y,
        record.velocity,
        record.direction,
        record.color.r,
        record.color.g,
        record.color.b
    )
}

/// What the caller should do after a command ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleReply {
    Output(String),
    Silent,
    Exit,
}

pub struct Console {
    registry: ConnectionRegistry,
    store: StateStore,
}

impl Console {
    pub fn new(registry: ConnectionRegistry, store: StateStore) -> Self {
        Self { registry, store }
    }

    pub async fn execute(&self, command: ConsoleCommand) -> ConsoleReply {
        match command {
            ConsoleCommand::Send { client_id, payload } => {
                if !self.registry.contains(client_id).await {
                    ConsoleReply::Output(format!("Client ID {} not found.\n", client_id))
                } else if self.registry.send_to(client_id, payload.as_bytes()).await {
                    debug!("Sent to client {}: {}", client_id, payload);
                    ConsoleReply::Silent
                } else {
                    ConsoleReply::Output(format!("Send to client {} failed.\n", client_id))
                }
            }
            ConsoleCommand::State(client_id) => match self.store.read(client_id).await {
                Some(record) => ConsoleReply::Output(render_state(client_id, &record)),
                None => ConsoleReply::Output(format!("No state for client {}.\n", client_id)),
            },
            ConsoleCommand::Clients => {
                let ids = self.registry.client_ids().await;
                let listed: Vec<String> = ids.iter().map(ClientId::to_string).collect();
                ConsoleReply::Output(format!(
                    "{} connected: [{}]; {} state record(s)\n",
                    ids.len(),
                    listed.join(", "),
                    self.store.len().await
                ))
            }
            ConsoleCommand::Exit => ConsoleReply::Exit,
            ConsoleCommand::Empty => ConsoleReply::Silent,
        }
    }

    /// Runs until `exit` or until the input ends
    pub async fn run<W>(
        &self,
        mut lines: mpsc::UnboundedReceiver<String>,
        mut output: W,
    ) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(line) = lines.recv().await {
            let reply = match ConsoleCommand::parse(&line) {
                Ok(command) => self.execute(command).await,
                Err(e) => ConsoleReply::Output(format!("{}\n", e)),
            };

            match reply {
                ConsoleReply::Output(text) => {
                    output.write_all(text.as_bytes()).await?;
                    output.flush().await?;
                }
                ConsoleReply::Silent => {}
                ConsoleReply::Exit => return Ok(()),
            }
        }

        debug!("Console input closed");
        Ok(())
    }
}

/// Forwards stdin lines from a dedicated thread.
///
/// A blocking read on an OS thread can be abandoned when the process exits,
/// which tokio's own stdin handle cannot.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Color, StatePatch};
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_parse_send_strips_quotes() {
        assert_eq!(
            ConsoleCommand::parse(r#"send 3 "{"type":"authoritative"}""#).unwrap(),
            ConsoleCommand::Send {
                client_id: ClientId(3),
                payload: r#"{"type":"authoritative"}"#.to_string()
            }
        );
    }

    #[test]
    fn test_parse_send_keeps_inner_spacing() {
        assert_eq!(
            ConsoleCommand::parse("send 1 hello  world ").unwrap(),
            ConsoleCommand::Send {
                client_id: ClientId(1),
                payload: "hello  world ".to_string()
            }
        );
        // Only one separating space is consumed.
        assert_eq!(
            ConsoleCommand::parse("send 1  x").unwrap(),
            ConsoleCommand::Send {
                client_id: ClientId(1),
                payload: " x".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ConsoleCommand::parse("send abc hi"),
            Err(ConsoleError::InvalidClientId("abc".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("send 2"),
            Err(ConsoleError::Usage("send <id> <payload>"))
        );
        assert_eq!(
            ConsoleCommand::parse("state"),
            Err(ConsoleError::Usage("state <id>"))
        );
        assert_eq!(
            ConsoleCommand::parse("kick 2"),
            Err(ConsoleError::UnknownCommand("kick".to_string()))
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ConsoleCommand::parse("exit").unwrap(), ConsoleCommand::Exit);
        assert_eq!(ConsoleCommand::parse("exit\r\n").unwrap(), ConsoleCommand::Exit);
        assert_eq!(ConsoleCommand::parse("  clients").unwrap(), ConsoleCommand::Clients);
        assert_eq!(ConsoleCommand::parse("state 12").unwrap(), ConsoleCommand::State(ClientId(12)));
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), ConsoleCommand::Empty);
    }

    #[test]
    fn test_render_state() {
        let record = StateRecord {
            x: 1.5,
            y: 2.0,
            velocity: 4.24,
            direction: 90.0,
            color: Color::new(255, 0, 0),
        };
        let text = render_state(ClientId(4), &record);

        assert!(text.starts_with("== CLIENT 4 STATE =="));
        assert!(text.contains("x:         1.5\n"));
        assert!(text.contains("velocity:  4.24\n"));
        assert!(text.contains("color:     (255, 0, 0)\n"));
    }

    #[tokio::test]
    async fn test_send_writes_payload_verbatim() {
        let registry = ConnectionRegistry::new();
        let (server_side, mut peer) = duplex(256);
        let id = registry.register(server_side).await;
        let console = Console::new(registry, StateStore::new());

        let reply = console
            .execute(ConsoleCommand::Send {
                client_id: id,
                payload: "raw payload".to_string(),
            })
            .await;
        assert_eq!(reply, ConsoleReply::Silent);

        let mut buf = [0u8; 11];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"raw payload");
    }

    #[tokio::test]
    async fn test_send_to_unknown_client_reports() {
        let console = Console::new(ConnectionRegistry::new(), StateStore::new());
        let reply = console
            .execute(ConsoleCommand::Send {
                client_id: ClientId(8),
                payload: "x".to_string(),
            })
            .await;
        assert_eq!(reply, ConsoleReply::Output("Client ID 8 not found.\n".to_string()));
    }

    #[tokio::test]
    async fn test_send_to_closed_client_reports_failure() {
        let registry = ConnectionRegistry::new();
        let (server_side, peer) = duplex(64);
        let id = registry.register(server_side).await;
        drop(peer);
        let console = Console::new(registry, StateStore::new());

        let reply = console
            .execute(ConsoleCommand::Send {
                client_id: id,
                payload: "x".to_string(),
            })
            .await;
        assert_eq!(reply, ConsoleReply::Output("Send to client 0 failed.\n".to_string()));
    }

    #[tokio::test]
    async fn test_run_until_exit() {
        let store = StateStore::new();
        store
            .update(
                ClientId(0),
                &StatePatch {
                    x: Some(7.0),
                    ..Default::default()
                },
            )
            .await;
        let console = Console::new(ConnectionRegistry::new(), store);

        let (tx, rx) = mpsc::unbounded_channel();
        for line in ["state 0", "bogus", "exit", "clients"] {
            tx.send(line.to_string()).unwrap();
        }

        let mut output = Vec::new();
        console.run(rx, &mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("x:         7\n"));
        assert!(output.contains("unknown command: bogus"));
        // Nothing after `exit` runs.
        assert!(!output.contains("connected"));
    }

    #[tokio::test]
    async fn test_run_ends_when_input_closes() {
        let console = Console::new(ConnectionRegistry::new(), StateStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("clients".to_string()).unwrap();
        drop(tx);

        let mut output = Vec::new();
        console.run(rx, &mut output).await.unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "0 connected: []; 0 state record(s)\n"
        );
    }
}
