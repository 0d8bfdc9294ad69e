//! Peer discovery through the rendezvous registry.
//!
//! This module provides:
//! - The [`RegistryRpc`] seam used by the node for every registry call
//! - An HTTP client implementation ([`HttpRegistry`])
//! - An in-process implementation over a shared [`Registry`](parley_registry::Registry)
//! - The cache of the last discovery result, used by reconnects

pub mod http;
pub mod local;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parley_registry::PeerAddress;

use crate::error::P2pResult;

pub use http::HttpRegistry;
pub use local::LocalRegistry;

/// Request/response channel to the registry.
#[async_trait]
pub trait RegistryRpc: Send + Sync {
    /// Announce `user_id` at `address`.
    async fn register(&self, user_id: &str, address: &PeerAddress) -> P2pResult<()>;

    /// Refresh the liveness of `user_id`.
    async fn keep_alive(&self, user_id: &str) -> P2pResult<()>;

    /// Addresses of every live peer, including the caller.
    async fn discover(&self) -> P2pResult<BTreeMap<String, PeerAddress>>;

    /// Mirror a block.
    async fn block(&self, user_id: &str, target_id: &str) -> P2pResult<()>;

    /// Mirror an unblock.
    async fn unblock(&self, user_id: &str, target_id: &str) -> P2pResult<()>;

    /// Mirror a mute; `None` means indefinite.
    async fn mute(&self, user_id: &str, target_id: &str, duration: Option<Duration>) -> P2pResult<()>;

    /// Mirror an unmute.
    async fn unmute(&self, user_id: &str, target_id: &str) -> P2pResult<()>;

    /// Ids the registry has recorded as blocked by `user_id`.
    async fn blocked(&self, user_id: &str) -> P2pResult<Vec<String>>;

    /// Unexpired mutes recorded for `user_id`: target to expiry in Unix seconds.
    async fn muted(&self, user_id: &str) -> P2pResult<BTreeMap<String, Option<f64>>>;
}

/// Addresses from the most recent discover call.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    peers: BTreeMap<String, PeerAddress>,
}

impl DiscoveryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached addresses with a fresh discovery result.
    pub fn replace(&mut self, peers: BTreeMap<String, PeerAddress>) {
        self.peers = peers;
    }

    /// Cached address of `peer_id`.
    pub fn get(&self, peer_id: &str) -> Option<&PeerAddress> {
        self.peers.get(peer_id)
    }

    /// All cached addresses.
    pub fn peers(&self) -> &BTreeMap<String, PeerAddress> {
        &self.peers
    }

    /// Number of cached peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether nothing has been discovered.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
