//! Connection state machine.

use std::fmt;

/// State of the connection to one remote peer id.
///
/// ```text
/// Unknown -> Connecting -> KeyPending -> Ready -> Closed
///                 |                                  |
///                 +--------- (connect fails) --------+--> Unknown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no dial in flight.
    #[default]
    Unknown,
    /// Outbound socket connect in progress.
    Connecting,
    /// Socket open, key frame not yet exchanged.
    KeyPending,
    /// Key exchanged; messages may flow.
    Ready,
    /// Torn down; the table is no longer accepting connections.
    Closed,
}

impl ConnectionState {
    /// Check if messages may be sent.
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    /// Check if a dial is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::KeyPending)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unknown => write!(f, "unknown"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::KeyPending => write!(f, "key_pending"),
            ConnectionState::Ready => write!(f, "ready"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}
