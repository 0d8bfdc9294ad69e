//! In-process registry access.
//!
//! Lets a peer talk to a [`Registry`](parley_registry::Registry) living in
//! the same process, without the HTTP hop.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parley_registry::registry::millis_to_secs;
use parley_registry::{now_millis, PeerAddress, SharedRegistry};

use crate::discovery::RegistryRpc;
use crate::error::P2pResult;

/// Registry shared in memory.
#[derive(Clone)]
pub struct LocalRegistry {
    registry: SharedRegistry,
}

impl LocalRegistry {
    /// Wrap a shared registry.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// The wrapped registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }
}

#[async_trait]
impl RegistryRpc for LocalRegistry {
    async fn register(&self, user_id: &str, address: &PeerAddress) -> P2pResult<()> {
        self.registry
            .write()
            .await
            .register(user_id, address.clone(), now_millis())?;
        Ok(())
    }

    async fn keep_alive(&self, user_id: &str) -> P2pResult<()> {
        self.registry.write().await.keep_alive(user_id, now_millis());
        Ok(())
    }

    async fn discover(&self) -> P2pResult<BTreeMap<String, PeerAddress>> {
        Ok(self
            .registry
            .read()
            .await
            .discover(now_millis())
            .into_iter()
            .map(|(id, record)| (id, record.address))
            .collect())
    }

    async fn block(&self, user_id: &str, target_id: &str) -> P2pResult<()> {
        self.registry.write().await.block(user_id, target_id)?;
        Ok(())
    }

    async fn unblock(&self, user_id: &str, target_id: &str) -> P2pResult<()> {
        self.registry.write().await.unblock(user_id, target_id);
        Ok(())
    }

    async fn mute(&self, user_id: &str, target_id: &str, duration: Option<Duration>) -> P2pResult<()> {
        self.registry
            .write()
            .await
            .mute(user_id, target_id, duration, now_millis())?;
        Ok(())
    }

    async fn unmute(&self, user_id: &str, target_id: &str) -> P2pResult<()> {
        self.registry.write().await.unmute(user_id, target_id);
        Ok(())
    }

    async fn blocked(&self, user_id: &str) -> P2pResult<Vec<String>> {
        Ok(self.registry.read().await.blocked(user_id))
    }

    async fn muted(&self, user_id: &str) -> P2pResult<BTreeMap<String, Option<f64>>> {
        Ok(self
            .registry
            .read()
            .await
            .muted(user_id, now_millis())
            .into_iter()
            .map(|(id, expires_at)| (id, expires_at.map(millis_to_secs)))
            .collect())
    }
}
