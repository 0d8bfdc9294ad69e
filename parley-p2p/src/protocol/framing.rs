//! Length-prefixed frame codec.
//!
//! Frames are laid out as:
//! - 4 bytes: network magic
//! - 1 byte: frame kind
//! - 4 bytes: big-endian payload length
//! - N bytes: payload
//!
//! A hello frame's payload is the sender id, optionally followed by a zero
//! byte and the raw connection key. A message frame's payload is opaque
//! here; see [`crate::protocol::message`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{MAX_FRAME_SIZE, NETWORK_MAGIC};
use crate::crypto::SymmetricKey;
use crate::error::{P2pError, P2pResult};

/// Header size: 4 bytes magic + 1 byte kind + 4 bytes length.
const HEADER_SIZE: usize = 9;

/// Frame kind tag for the hello/key frame.
const KIND_HELLO: u8 = 0x01;

/// Frame kind tag for a chat message frame.
const KIND_MESSAGE: u8 = 0x02;

/// Separates the sender id from the key inside a hello payload.
const HELLO_KEY_SEPARATOR: u8 = 0x00;

/// First frame on every connection, sent by the dialing side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// Peer id of the dialer.
    pub sender: String,
    /// Connection key, absent when the dialer runs unencrypted.
    pub key: Option<SymmetricKey>,
}

/// One logical unit on the peer wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Identity and key of the dialing peer.
    Hello(Hello),
    /// A chat message payload (encrypted or plain).
    Message(Bytes),
}

impl Frame {
    /// Human-readable frame kind for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Hello(_) => "hello",
            Frame::Message(_) => "message",
        }
    }
}

fn decode_hello(payload: &[u8]) -> P2pResult<Hello> {
    let (sender, key) = match payload.iter().position(|&b| b == HELLO_KEY_SEPARATOR) {
        Some(pos) => (&payload[..pos], Some(SymmetricKey::from_bytes(&payload[pos + 1..])?)),
        None => (payload, None),
    };

    let sender = std::str::from_utf8(sender)
        .map_err(|_| P2pError::Protocol("hello sender is not valid UTF-8".to_string()))?;

    Ok(Hello {
        sender: sender.to_string(),
        key,
    })
}

/// Codec for length-prefixed frames.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Kind and length of the current frame (if the header has been read).
    current: Option<(u8, usize)>,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        Self { current: None }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = P2pError;

    fn decode(&mut self, src: &mut BytesMut) -> P2pResult<Option<Self::Item>> {
        if self.current.is_none() {
            if src.len() < HEADER_SIZE {
                return Ok(None);
            }

            let magic = [src[0], src[1], src[2], src[3]];
            if magic != NETWORK_MAGIC {
                return Err(P2pError::InvalidMagic {
                    expected: NETWORK_MAGIC,
                    actual: magic,
                });
            }

            let kind = src[4];
            let length = u32::from_be_bytes([src[5], src[6], src[7], src[8]]) as usize;

            if length > MAX_FRAME_SIZE {
                return Err(P2pError::FrameTooLarge {
                    size: length,
                    max: MAX_FRAME_SIZE,
                });
            }

            self.current = Some((kind, length));
        }

        let Some((kind, length)) = self.current else {
            return Ok(None);
        };

        if src.len() < HEADER_SIZE + length {
            src.reserve(HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(length).freeze();
        self.current = None;

        match kind {
            KIND_HELLO => Ok(Some(Frame::Hello(decode_hello(&payload)?))),
            KIND_MESSAGE => Ok(Some(Frame::Message(payload))),
            other => Err(P2pError::Protocol(format!("unknown frame kind 0x{:02x}", other))),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = P2pError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> P2pResult<()> {
        let (kind, payload) = match frame {
            Frame::Hello(hello) => {
                let mut payload = BytesMut::from(hello.sender.as_bytes());
                if let Some(key) = hello.key {
                    payload.put_u8(HELLO_KEY_SEPARATOR);
                    payload.put_slice(key.as_bytes());
                }
                (KIND_HELLO, payload.freeze())
            }
            Frame::Message(payload) => (KIND_MESSAGE, payload),
        };

        if payload.len() > MAX_FRAME_SIZE {
            return Err(P2pError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        dst.reserve(HEADER_SIZE + payload.len());
        dst.put_slice(&NETWORK_MAGIC);
        dst.put_u8(kind);
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);

        Ok(())
    }
}
