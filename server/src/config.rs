//! Server configuration and message framing selection

use shared::{DEFAULT_PORT, MAX_MESSAGE_SIZE};
use std::fmt;
use std::str::FromStr;

/// How a connection's byte stream is cut into messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Framing {
    /// Every successful read is one message
    Chunk,
    /// Messages are terminated by `\n`; reads are buffered until a full line arrives
    #[default]
    Lines,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Chunk => write!(f, "chunk"),
            Framing::Lines => write!(f, "lines"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chunk" => Ok(Framing::Chunk),
            "lines" => Ok(Framing::Lines),
            other => Err(format!("unknown framing mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind to
    pub host: String,
    /// TCP port; `0` picks an ephemeral port
    pub port: u16,
    pub framing: Framing,
    /// Upper bound for a single read and for a buffered, unterminated line
    pub max_message_size: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            framing: Framing::default(),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}
