//! Connection identification and metadata.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Unique identifier for one connection, used to make removal race-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Create a connection ID from a counter value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Direction of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirection {
    /// We dialed the peer.
    Outbound,
    /// Peer dialed us.
    Inbound,
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDirection::Outbound => write!(f, "outbound"),
            ConnectionDirection::Inbound => write!(f, "inbound"),
        }
    }
}

/// Information about an established connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection identifier for this session.
    pub id: ConnectionId,
    /// Peer id on the other end.
    pub remote_id: String,
    /// Socket address of the peer.
    pub peer_addr: SocketAddr,
    /// Direction of the connection.
    pub direction: ConnectionDirection,
    /// Whether frames on this connection are encrypted.
    pub encrypted: bool,
    /// When the connection became ready.
    pub connected_at: Instant,
}

impl ConnectionInfo {
    /// Create info for a new connection.
    pub fn new(
        id: ConnectionId,
        remote_id: impl Into<String>,
        peer_addr: SocketAddr,
        direction: ConnectionDirection,
        encrypted: bool,
    ) -> Self {
        Self {
            id,
            remote_id: remote_id.into(),
            peer_addr,
            direction,
            encrypted,
            connected_at: Instant::now(),
        }
    }

    /// Check if this is an outbound connection.
    pub fn is_outbound(&self) -> bool {
        self.direction == ConnectionDirection::Outbound
    }

    /// Get the connection duration.
    pub fn connection_duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {}, {})",
            self.remote_id,
            self.peer_addr,
            self.direction,
            if self.encrypted { "encrypted" } else { "plain" }
        )
    }
}
