//! Per-peer moderation state.
//!
//! The local peer holds the authoritative block and mute lists. Blocks never
//! expire; mutes may carry an expiry and become inert once it has passed.
//! Expired mutes are purged lazily by [`ModerationState::purge_expired`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::MutePolicy;

/// Kind of a moderation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationKind {
    /// Nothing is exchanged in either direction.
    Blocked,
    /// Inbound messages are silently dropped.
    Muted,
}

impl fmt::Display for ModerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationKind::Blocked => write!(f, "blocked"),
            ModerationKind::Muted => write!(f, "muted"),
        }
    }
}

/// One row of the moderation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationEntry {
    /// Peer that issued the restriction.
    pub local_id: String,
    /// Peer the restriction applies to.
    pub target_id: String,
    /// Block or mute.
    pub kind: ModerationKind,
    /// Expiry for mutes; `None` for blocks and indefinite mutes.
    pub expires_at: Option<Instant>,
}

/// Decision for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Deliver or transmit.
    Allow,
    /// Suppressed by a block.
    Blocked,
    /// Suppressed by an unexpired mute.
    Muted,
}

/// Block and mute lists for one local peer.
#[derive(Debug)]
pub struct ModerationState {
    local_id: String,
    blocked: HashSet<String>,
    /// Target id -> expiry (`None` = indefinite).
    muted: HashMap<String, Option<Instant>>,
}

impl ModerationState {
    /// Create empty moderation state for `local_id`.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            blocked: HashSet::new(),
            muted: HashMap::new(),
        }
    }

    /// Block `target`. Returns false if it was already blocked.
    pub fn block(&mut self, target: &str) -> bool {
        if !self.blocked.insert(target.to_string()) {
            tracing::warn!(target_id = %target, "Peer already blocked");
            return false;
        }
        tracing::info!(target_id = %target, "Blocked peer");
        true
    }

    /// Lift a block. Returns false if `target` was not blocked.
    pub fn unblock(&mut self, target: &str) -> bool {
        if !self.blocked.remove(target) {
            tracing::warn!(target_id = %target, "Peer was not blocked");
            return false;
        }
        tracing::info!(target_id = %target, "Unblocked peer");
        true
    }

    /// Mute `target` for `duration` (`None` = indefinitely).
    ///
    /// Muting a peer that is already muted refreshes the expiry and returns
    /// false.
    pub fn mute(&mut self, target: &str, duration: Option<Duration>, now: Instant) -> bool {
        let was_muted = self.is_muted(target, now);
        // Durations past the end of the clock never expire.
        let expires_at = duration.and_then(|d| now.checked_add(d));
        self.muted.insert(target.to_string(), expires_at);

        if was_muted {
            tracing::warn!(target_id = %target, ?duration, "Peer already muted, expiry refreshed");
        } else {
            tracing::info!(target_id = %target, ?duration, "Muted peer");
        }
        !was_muted
    }

    /// Lift a mute. Returns false if `target` had no active mute.
    pub fn unmute(&mut self, target: &str, now: Instant) -> bool {
        let was_muted = self.is_muted(target, now);
        self.muted.remove(target);

        if !was_muted {
            tracing::warn!(target_id = %target, "Peer was not muted");
            return false;
        }
        tracing::info!(target_id = %target, "Unmuted peer");
        true
    }

    /// Whether `target` is blocked.
    pub fn is_blocked(&self, target: &str) -> bool {
        self.blocked.contains(target)
    }

    /// Whether `target` has an unexpired mute at `now`.
    pub fn is_muted(&self, target: &str, now: Instant) -> bool {
        match self.muted.get(target) {
            Some(Some(expires_at)) => now < *expires_at,
            Some(None) => true,
            None => false,
        }
    }

    /// Verdict for an inbound message. Every id that identifies the sender
    /// (frame prefix and connection owner) is checked; a block on any of them
    /// wins over a mute.
    pub fn inbound_verdict(&self, sender_ids: &[&str], now: Instant) -> Verdict {
        if sender_ids.iter().any(|id| self.is_blocked(id)) {
            Verdict::Blocked
        } else if sender_ids.iter().any(|id| self.is_muted(id, now)) {
            Verdict::Muted
        } else {
            Verdict::Allow
        }
    }

    /// Verdict for an outbound message to `target`.
    pub fn outbound_verdict(&self, target: &str, policy: MutePolicy, now: Instant) -> Verdict {
        if self.is_blocked(target) {
            Verdict::Blocked
        } else if policy == MutePolicy::Bidirectional && self.is_muted(target, now) {
            Verdict::Muted
        } else {
            Verdict::Allow
        }
    }

    /// Drop mutes whose expiry has passed. Returns the ids that were purged.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<String> {
        let mut purged: Vec<String> = self
            .muted
            .iter()
            .filter(|(_, expires_at)| matches!(expires_at, Some(t) if now >= *t))
            .map(|(id, _)| id.clone())
            .collect();
        purged.sort();

        for id in &purged {
            self.muted.remove(id);
        }
        purged
    }

    /// Active entries, blocks first, each group sorted by target.
    pub fn entries(&self, now: Instant) -> Vec<ModerationEntry> {
        let mut blocked: Vec<&String> = self.blocked.iter().collect();
        blocked.sort();

        let mut muted: Vec<(&String, &Option<Instant>)> = self
            .muted
            .iter()
            .filter(|(id, _)| self.is_muted(id, now))
            .collect();
        muted.sort_by(|a, b| a.0.cmp(b.0));

        blocked
            .into_iter()
            .map(|id| ModerationEntry {
                local_id: self.local_id.clone(),
                target_id: id.clone(),
                kind: ModerationKind::Blocked,
                expires_at: None,
            })
            .chain(muted.into_iter().map(|(id, expires_at)| ModerationEntry {
                local_id: self.local_id.clone(),
                target_id: id.clone(),
                kind: ModerationKind::Muted,
                expires_at: *expires_at,
            }))
            .collect()
    }
}
