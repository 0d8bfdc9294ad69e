//! Peer wire protocol.
//!
//! This module contains:
//! - Length-prefixed framing codec with hello and message frames
//! - Chat message encoding, sealing and parsing

pub mod framing;
pub mod message;

pub use framing::{Frame, FrameCodec, Hello};
pub use message::{open, seal, ChatMessage, SENDER_SEPARATOR};
