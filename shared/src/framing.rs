//! Newline framing for the persistent peer stream
//!
//! Every send is one line: the raw username for the identity announcement,
//! then one JSON message per line. The receiver feeds whatever bytes arrive
//! into a [`LineDecoder`] and pulls complete lines back out; partial input
//! stays buffered until its delimiter shows up.

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const DELIMITER: u8 = b'\n';

/// Longest line kept while waiting for a delimiter.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Serializes a message and appends the delimiter.
pub fn encode_line<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(DELIMITER);
    Ok(bytes)
}

/// Frames the identity announcement.
pub fn encode_username(username: &str) -> Vec<u8> {
    let mut bytes = username.trim().as_bytes().to_vec();
    bytes.push(DELIMITER);
    bytes
}

/// Buffers inbound bytes and splits them into lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&DELIMITER) {
            warn!(
                "Discarding {} buffered bytes without a line delimiter",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }

    /// Bytes still waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete non-blank line, without its delimiter or trailing `\r`.
    /// Lines that are not valid UTF-8 are dropped.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == DELIMITER) {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = match std::str::from_utf8(&raw[..raw.len() - 1]) {
                Ok(text) => text.trim_end_matches('\r'),
                Err(e) => {
                    warn!("Dropping line that is not valid UTF-8: {}", e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(line.to_string());
        }
        None
    }

    /// Next line that decodes as `T`. Lines that fail to decode are logged
    /// and skipped; the stream itself stays usable.
    pub fn next_message<T: DeserializeOwned>(&mut self) -> Option<T> {
        while let Some(line) = self.next_line() {
            match serde_json::from_str(&line) {
                Ok(message) => return Some(message),
                Err(e) => warn!("Discarding undecodable message ({}): {}", e, line),
            }
        }
        None
    }
}
