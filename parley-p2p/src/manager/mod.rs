//! Connection manager.
//!
//! Tracks at most one ready connection per remote peer id plus the dials that
//! are still in flight, and resolves duplicate connections deterministically.
//!
//! # Duplicate resolution
//!
//! When two peers dial each other at the same time, each ends up with one
//! inbound and one outbound connection. The connection dialed by the
//! lexicographically lower peer id survives on both sides: the lower peer
//! keeps its outbound, the higher peer keeps its inbound. A new connection in
//! the same direction as the existing one is a reconnect and replaces it.

pub mod inbound;
pub mod outbound;

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::crypto::SymmetricKey;
use crate::peer::{ConnectionCommand, ConnectionDirection, ConnectionId, ConnectionInfo, ConnectionState};

pub use inbound::read_hello;
pub use outbound::ConnectResult;

pub(crate) use inbound::run_listener;
pub(crate) use outbound::connect_to_peer;

/// Direction whose connection survives a duplicate between `local` and `remote`.
pub fn preferred_direction(local: &str, remote: &str) -> ConnectionDirection {
    if local < remote {
        ConnectionDirection::Outbound
    } else {
        ConnectionDirection::Inbound
    }
}

/// A ready connection as seen by the table.
#[derive(Debug)]
pub struct ConnectionHandle {
    info: ConnectionInfo,
    key: Option<SymmetricKey>,
    /// Command channel to the connection task (unbounded so senders never block).
    commands: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ConnectionHandle {
    /// Create a handle for a connection task.
    pub fn new(
        info: ConnectionInfo,
        key: Option<SymmetricKey>,
        commands: mpsc::UnboundedSender<ConnectionCommand>,
    ) -> Self {
        Self { info, key, commands }
    }

    /// Connection metadata.
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Connection key, if encrypted.
    pub fn key(&self) -> Option<&SymmetricKey> {
        self.key.as_ref()
    }

    /// Queue a command. Returns false if the task has exited.
    pub fn command(&self, command: ConnectionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    fn close(&self) {
        let _ = self.commands.send(ConnectionCommand::Close);
    }
}

/// Result of putting a connection into the table.
#[derive(Debug)]
pub enum InsertOutcome {
    /// No connection existed for the remote id.
    Inserted,
    /// The previous connection was told to close.
    Replaced(ConnectionInfo),
    /// The new connection lost the tie-break or the table is closed.
    Rejected,
}

/// Table of connections keyed by remote peer id.
#[derive(Debug)]
pub struct ConnectionTable {
    local_id: String,
    connections: HashMap<String, ConnectionHandle>,
    /// Outbound dials in flight.
    dialing: HashMap<String, ConnectionState>,
    closed: bool,
}

impl ConnectionTable {
    /// Create an empty table for `local_id`.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            connections: HashMap::new(),
            dialing: HashMap::new(),
            closed: false,
        }
    }

    /// Add a ready connection, resolving duplicates.
    pub fn insert(&mut self, handle: ConnectionHandle) -> InsertOutcome {
        if self.closed {
            return InsertOutcome::Rejected;
        }

        let remote = handle.info.remote_id.clone();
        self.dialing.remove(&remote);

        let Some(existing) = self.connections.get(&remote) else {
            self.connections.insert(remote, handle);
            return InsertOutcome::Inserted;
        };

        let keep_new = handle.info.direction == existing.info.direction
            || handle.info.direction == preferred_direction(&self.local_id, &remote);
        if !keep_new {
            return InsertOutcome::Rejected;
        }

        match self.connections.insert(remote, handle) {
            Some(old) => {
                old.close();
                InsertOutcome::Replaced(old.info)
            }
            None => InsertOutcome::Inserted,
        }
    }

    /// Remove a connection, but only if `id` is still the current one.
    pub fn remove(&mut self, remote: &str, id: ConnectionId) -> Option<ConnectionInfo> {
        if self.connections.get(remote).map(|h| h.info.id) != Some(id) {
            return None;
        }
        self.connections.remove(remote).map(|h| h.info)
    }

    /// Ready connection for `remote`.
    pub fn get(&self, remote: &str) -> Option<&ConnectionHandle> {
        self.connections.get(remote)
    }

    /// Check whether a ready connection to `remote` exists.
    pub fn has_live(&self, remote: &str) -> bool {
        self.connections.contains_key(remote)
    }

    /// Mark `remote` as being dialed. Returns false if a dial is already in
    /// flight, a ready connection exists, or the table is closed.
    pub fn start_connecting(&mut self, remote: &str) -> bool {
        if self.closed || self.has_live(remote) || self.dialing.contains_key(remote) {
            return false;
        }
        self.dialing.insert(remote.to_string(), ConnectionState::Connecting);
        true
    }

    /// Record that the socket for `remote` is open and the key is being sent.
    pub fn mark_key_pending(&mut self, remote: &str) {
        if let Some(state) = self.dialing.get_mut(remote) {
            *state = ConnectionState::KeyPending;
        }
    }

    /// Forget an in-flight dial.
    pub fn stop_connecting(&mut self, remote: &str) {
        self.dialing.remove(remote);
    }

    /// Current state for `remote`.
    pub fn state(&self, remote: &str) -> ConnectionState {
        if self.has_live(remote) {
            ConnectionState::Ready
        } else if let Some(state) = self.dialing.get(remote) {
            *state
        } else if self.closed {
            ConnectionState::Closed
        } else {
            ConnectionState::Unknown
        }
    }

    /// Snapshot of ready connections sorted by remote id.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> =
            self.connections.values().map(|h| h.info.clone()).collect();
        infos.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
        infos
    }

    /// Tell every connection to close and refuse new ones.
    pub fn close_all(&mut self) -> usize {
        self.closed = true;
        self.dialing.clear();
        for handle in self.connections.values() {
            handle.close();
        }
        self.connections.len()
    }

    /// Whether [`close_all`](Self::close_all) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of ready connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether there are no ready connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
