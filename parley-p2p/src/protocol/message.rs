//! Chat message frames.
//!
//! A chat frame is `"<sender_id>:<text>"`. On an encrypted connection the
//! whole string is sealed with the connection key in a single call, so one
//! logical message is always one encrypt/decrypt.

use std::fmt;

use bytes::Bytes;

use crate::crypto::{self, SymmetricKey};
use crate::error::{P2pError, P2pResult};

/// Separator between sender id and text.
pub const SENDER_SEPARATOR: char = ':';

/// A chat message as delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Peer id that sent the message.
    pub sender: String,
    /// Message text.
    pub text: String,
}

impl ChatMessage {
    /// Create a new chat message.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Encode as `"<sender>:<text>"`.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}{}{}", self.sender, SENDER_SEPARATOR, self.text).into_bytes()
    }

    /// Parse `"<sender>:<text>"`, splitting on the first separator.
    pub fn parse(bytes: &[u8]) -> P2pResult<Self> {
        let frame = std::str::from_utf8(bytes)
            .map_err(|_| P2pError::Protocol("message frame is not valid UTF-8".to_string()))?;

        let (sender, text) = frame
            .split_once(SENDER_SEPARATOR)
            .ok_or_else(|| P2pError::Protocol("message frame has no ':' separator".to_string()))?;

        if sender.is_empty() {
            return Err(P2pError::Protocol("message frame has an empty sender".to_string()));
        }

        Ok(Self::new(sender, text))
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.sender, self.text)
    }
}

/// Encode and, if a key is given, encrypt a message for the wire.
pub fn seal(key: Option<&SymmetricKey>, message: &ChatMessage) -> P2pResult<Bytes> {
    let plain = message.encode();
    match key {
        Some(key) => Ok(Bytes::from(crypto::encrypt(key, &plain)?)),
        None => Ok(Bytes::from(plain)),
    }
}

/// Decrypt (if a key is given) and parse a message frame payload.
pub fn open(key: Option<&SymmetricKey>, payload: &[u8]) -> P2pResult<ChatMessage> {
    match key {
        Some(key) => ChatMessage::parse(&crypto::decrypt(key, payload)?),
        None => ChatMessage::parse(payload),
    }
}
