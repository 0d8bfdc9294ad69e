//! Peer connections.
//!
//! This module provides:
//! - Connection identification and metadata
//! - Connection state machine
//! - Per-connection read/write loop and inbound screening

pub mod connection;
pub mod info;
pub mod state;

pub use connection::{screen_inbound, ConnectionCommand, PeerFramed, ReceiveOutcome};
pub use info::{ConnectionDirection, ConnectionId, ConnectionInfo};
pub use state::ConnectionState;
