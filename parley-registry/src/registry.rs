//! In-memory peer directory and moderation replica.
//!
//! The registry owns three maps: peer records keyed by peer id, and the
//! block/mute replicas keyed by the local peer that issued them. Time is
//! passed in explicitly as Unix milliseconds so callers (and tests) control
//! the clock. Records are never deleted by request handlers; stale entries
//! are removed only by [`Registry::sweep`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::api::{DiscoveredPeer, PeerAddress};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Convert Unix milliseconds to fractional seconds for JSON responses.
pub fn millis_to_secs(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Check that a peer id can be used on the wire.
///
/// Ids are the prefix of every chat frame (`<id>:<text>`), so they must be
/// non-empty and must not contain the separator.
pub fn validate_peer_id(field: &str, id: &str) -> RegistryResult<()> {
    if id.trim().is_empty() {
        return Err(RegistryError::InvalidRequest(format!("{} must not be empty", field)));
    }
    if id.contains(':') || id.contains('\0') {
        return Err(RegistryError::InvalidRequest(format!(
            "{} must not contain ':' or NUL (got {:?})",
            field, id
        )));
    }
    Ok(())
}

/// A registered peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    /// Address the peer advertised.
    pub address: PeerAddress,
    /// Last register or keep-alive, Unix milliseconds.
    pub last_seen: u64,
}

impl PeerRecord {
    /// Age of the record at `now`.
    pub fn age(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_seen))
    }

    /// Whether the record is inside the liveness window at `now`.
    pub fn is_live(&self, now: u64, window: Duration) -> bool {
        self.age(now) < window
    }

    /// Convert to the discovery wire form.
    pub fn to_discovered(&self) -> DiscoveredPeer {
        DiscoveredPeer {
            ip: self.address.ip.clone(),
            port: self.address.port,
            last_seen: millis_to_secs(self.last_seen),
        }
    }
}

/// Counts of entries removed by a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Peer records removed.
    pub peers: usize,
    /// Expired mute entries removed.
    pub mutes: usize,
}

/// Peer directory plus block/mute replicas.
#[derive(Debug)]
pub struct Registry {
    liveness_window: Duration,
    default_mute_duration: Duration,
    peers: HashMap<String, PeerRecord>,
    blocked: HashMap<String, BTreeSet<String>>,
    /// local id -> target id -> expiry (Unix ms), `None` if indefinite.
    muted: HashMap<String, BTreeMap<String, Option<u64>>>,
}

impl Registry {
    /// Create an empty registry with the given liveness window.
    pub fn new(liveness_window: Duration) -> Self {
        Self {
            liveness_window,
            default_mute_duration: crate::config::DEFAULT_MUTE_DURATION,
            peers: HashMap::new(),
            blocked: HashMap::new(),
            muted: HashMap::new(),
        }
    }

    /// Create an empty registry from server configuration.
    pub fn from_config(config: &RegistryConfig) -> Self {
        let mut registry = Self::new(config.liveness_window);
        registry.default_mute_duration = config.default_mute_duration;
        registry
    }

    /// The configured liveness window.
    pub fn liveness_window(&self) -> Duration {
        self.liveness_window
    }

    /// The mute duration used when a request omits one.
    pub fn default_mute_duration(&self) -> Duration {
        self.default_mute_duration
    }

    /// Insert or overwrite a peer record. Last writer wins.
    pub fn register(&mut self, peer_id: &str, address: PeerAddress, now: u64) -> RegistryResult<()> {
        validate_peer_id("user_id", peer_id)?;
        if address.ip.trim().is_empty() {
            return Err(RegistryError::InvalidRequest("ip must not be empty".to_string()));
        }
        if address.port == 0 {
            return Err(RegistryError::InvalidRequest("port must not be 0".to_string()));
        }

        if let Some(previous) = self.peers.get(peer_id) {
            if previous.address != address {
                tracing::info!(
                    peer = %peer_id,
                    old = %previous.address,
                    new = %address,
                    "Peer address overwritten"
                );
            }
        }

        self.peers.insert(
            peer_id.to_string(),
            PeerRecord {
                address,
                last_seen: now,
            },
        );
        Ok(())
    }

    /// Refresh a peer's last-seen time.
    ///
    /// Unknown ids are a silent no-op. Returns whether a record was refreshed.
    pub fn keep_alive(&mut self, peer_id: &str, now: u64) -> bool {
        match self.peers.get_mut(peer_id) {
            Some(record) => {
                record.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// All records inside the liveness window at `now`.
    pub fn discover(&self, now: u64) -> BTreeMap<String, PeerRecord> {
        self.peers
            .iter()
            .filter(|(_, record)| record.is_live(now, self.liveness_window))
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Look up a record regardless of liveness.
    pub fn get(&self, peer_id: &str) -> Option<&PeerRecord> {
        self.peers.get(peer_id)
    }

    /// Number of stored records, live or stale.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Record that `local_id` blocked `target_id`. Returns false if already blocked.
    pub fn block(&mut self, local_id: &str, target_id: &str) -> RegistryResult<bool> {
        validate_peer_id("user_id", local_id)?;
        validate_peer_id("block_id", target_id)?;
        Ok(self
            .blocked
            .entry(local_id.to_string())
            .or_default()
            .insert(target_id.to_string()))
    }

    /// Remove a block. Returns false if there was none.
    pub fn unblock(&mut self, local_id: &str, target_id: &str) -> bool {
        let Some(set) = self.blocked.get_mut(local_id) else {
            return false;
        };
        let removed = set.remove(target_id);
        if set.is_empty() {
            self.blocked.remove(local_id);
        }
        removed
    }

    /// Record a mute. `None` duration means indefinite. Re-muting refreshes the expiry.
    pub fn mute(
        &mut self,
        local_id: &str,
        target_id: &str,
        duration: Option<Duration>,
        now: u64,
    ) -> RegistryResult<Option<u64>> {
        validate_peer_id("user_id", local_id)?;
        validate_peer_id("mute_id", target_id)?;
        let expires_at =
            duration.map(|d| now.saturating_add(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)));
        self.muted
            .entry(local_id.to_string())
            .or_default()
            .insert(target_id.to_string(), expires_at);
        Ok(expires_at)
    }

    /// Remove a mute. Returns false if there was none.
    pub fn unmute(&mut self, local_id: &str, target_id: &str) -> bool {
        let Some(map) = self.muted.get_mut(local_id) else {
            return false;
        };
        let removed = map.remove(target_id).is_some();
        if map.is_empty() {
            self.muted.remove(local_id);
        }
        removed
    }

    /// Ids blocked by `local_id`, sorted.
    pub fn blocked(&self, local_id: &str) -> Vec<String> {
        self.blocked
            .get(local_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Unexpired mutes issued by `local_id` at `now`.
    pub fn muted(&self, local_id: &str, now: u64) -> BTreeMap<String, Option<u64>> {
        self.muted
            .get(local_id)
            .map(|map| {
                map.iter()
                    .filter(|(_, expires_at)| expires_at.map_or(true, |t| now < t))
                    .map(|(id, expires_at)| (id.clone(), *expires_at))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove peer records older than `retention` and mutes that have expired.
    pub fn sweep(&mut self, now: u64, retention: Duration) -> SweepStats {
        let before = self.peers.len();
        self.peers.retain(|_, record| record.age(now) < retention);
        let peers = before - self.peers.len();

        let mut mutes = 0;
        self.muted.retain(|_, map| {
            let before = map.len();
            map.retain(|_, expires_at| expires_at.map_or(true, |t| now < t));
            mutes += before - map.len();
            !map.is_empty()
        });

        SweepStats { peers, mutes }
    }
}
