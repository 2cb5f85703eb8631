//! Cutting a connection's byte stream into messages

use crate::config::Framing;
use log::warn;

/// Per-connection message framer.
///
/// In [`Framing::Chunk`] mode every read is taken as one whole message, which
/// only works as long as the peer never has two messages in flight and the
/// network never splits one. [`Framing::Lines`] keeps an accumulation buffer
/// so a read may produce any number of messages, or none.
#[derive(Debug)]
pub struct MessageFramer {
    mode: Framing,
    buffer: Vec<u8>,
    max_message_size: usize,
    /// Dropping the rest of an oversized line
    discarding: bool,
}

impl MessageFramer {
    pub fn new(mode: Framing, max_message_size: usize) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            max_message_size,
            discarding: false,
        }
    }

    pub fn mode(&self) -> Framing {
        self.mode
    }

    /// Bytes of an unterminated line waiting for more input
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds one read's worth of bytes and returns the messages it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        match self.mode {
            Framing::Chunk if chunk.is_empty() => Vec::new(),
            Framing::Chunk => vec![String::from_utf8_lossy(chunk).into_owned()],
            Framing::Lines => self.push_lines(chunk),
        }
    }

    fn push_lines(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        if self.discarding {
            match self.buffer.iter().position(|&b| b == b'\n') {
                Some(newline_pos) => {
                    self.buffer.drain(..=newline_pos);
                    self.discarding = false;
                }
                None => {
                    self.buffer.clear();
                    return Vec::new();
                }
            }
        }

        let mut messages = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(&['\n', '\r'][..]);

            if text.trim().is_empty() {
                continue;
            }
            messages.push(text.to_string());
        }

        if self.buffer.len() > self.max_message_size {
            warn!(
                "Discarding {} buffered bytes without a line terminator (limit {})",
                self.buffer.len(),
                self.max_message_size
            );
            self.buffer.clear();
            self.discarding = true;
        }

        messages
    }
}
