//! P2P error types.

use std::io;
use thiserror::Error;

/// Broad error classes. A connection survives a `Protocol` error on a
/// single outbound frame and closes on `Network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Connect/accept/send/recv or registry transport failure.
    Network,
    /// Malformed frame or out-of-order frame.
    Protocol,
    /// Decryption failure.
    Crypto,
    /// Send target has no ready connection.
    NotConnected,
    /// Target is absent from the cached discovery results.
    UnknownPeer,
    /// Caller passed an unusable argument.
    InvalidInput,
}

/// P2P-specific errors.
#[derive(Debug, Error)]
pub enum P2pError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection timed out.
    #[error("Connection timeout to {addr}")]
    ConnectionTimeout { addr: String },

    /// Registry request failed.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Frame could not be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Frame exceeds maximum allowed size.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Invalid network magic bytes.
    #[error("Invalid network magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// Encryption or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// No ready connection to the peer.
    #[error("Peer not connected: {0}")]
    NotConnected(String),

    /// Peer is absent from the cached discovery results.
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// Peer id is unusable (empty, contains ':', or is our own id).
    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),
}

impl P2pError {
    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            P2pError::Io(_) | P2pError::ConnectionTimeout { .. } | P2pError::Registry(_) => {
                ErrorClass::Network
            }
            P2pError::Protocol(_) | P2pError::FrameTooLarge { .. } | P2pError::InvalidMagic { .. } => {
                ErrorClass::Protocol
            }
            P2pError::Crypto(_) => ErrorClass::Crypto,
            P2pError::NotConnected(_) => ErrorClass::NotConnected,
            P2pError::UnknownPeer(_) => ErrorClass::UnknownPeer,
            P2pError::InvalidPeerId(_) => ErrorClass::InvalidInput,
        }
    }
}

impl From<reqwest::Error> for P2pError {
    fn from(err: reqwest::Error) -> Self {
        P2pError::Registry(err.to_string())
    }
}

impl From<parley_registry::RegistryError> for P2pError {
    fn from(err: parley_registry::RegistryError) -> Self {
        P2pError::Registry(err.to_string())
    }
}

/// Result type for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;
