//! JSON bodies exchanged with the registry.
//!
//! These types are shared by the axum handlers and by HTTP clients so both
//! ends agree on field names (`user_id`, `ip`, `port`, ...).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Network address a peer listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Host name or IP literal.
    pub ip: String,
    /// TCP port.
    pub port: u16,
}

impl PeerAddress {
    /// Create a new peer address.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// `POST /register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    pub ip: String,
    pub port: u16,
}

/// `POST /keep_alive`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveRequest {
    pub user_id: String,
}

/// `POST /block` and `POST /unblock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRequest {
    pub user_id: String,
    pub block_id: String,
}

/// `POST /mute`
///
/// `duration` is in seconds. A missing field means the registry default,
/// an explicit `null` means the mute never expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteRequest {
    pub user_id: String,
    pub mute_id: String,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Option<f64>>,
}

/// `POST /unmute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmuteRequest {
    pub user_id: String,
    pub mute_id: String,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body returned with 4xx/5xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One live entry in a discovery response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPeer {
    pub ip: String,
    pub port: u16,
    /// Unix time in seconds, fractional.
    pub last_seen: f64,
}

impl DiscoveredPeer {
    /// The address part of the entry.
    pub fn address(&self) -> PeerAddress {
        PeerAddress::new(self.ip.clone(), self.port)
    }
}

/// `GET /discover`
pub type DiscoverResponse = BTreeMap<String, DiscoveredPeer>;

/// `GET /block/{user_id}`
pub type BlockedResponse = Vec<String>;

/// `GET /mute/{user_id}`: target id to expiry (Unix seconds), `None` if indefinite.
pub type MutedResponse = BTreeMap<String, Option<f64>>;

/// Distinguishes a missing field (outer `None`, via `default`) from an
/// explicit `null` (`Some(None)`).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}
