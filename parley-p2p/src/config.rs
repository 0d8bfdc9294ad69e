//! Peer configuration.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub use parley_registry::{DEFAULT_MUTE_DURATION, LIVENESS_WINDOW};

/// Magic bytes at the start of every frame on the peer wire.
pub const NETWORK_MAGIC: [u8; 4] = *b"PRLY";

/// Maximum frame payload size in bytes (1 MB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default timeout for establishing outbound connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time an accepted connection has to deliver its key frame.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between automatic discovery cycles.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(30);

/// Default registry base URL.
pub const DEFAULT_REGISTRY_URL: &str = "http://127.0.0.1:5000";

/// Default host advertised to the registry.
pub const DEFAULT_ADVERTISE_HOST: &str = "127.0.0.1";

/// Capacity of the channel delivering messages to the application.
pub const INBOX_CAPACITY: usize = 256;

/// Which directions a mute suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutePolicy {
    /// Mute only hides messages received from the muted peer.
    #[default]
    InboundOnly,
    /// Mute also suppresses sending to the muted peer.
    Bidirectional,
}

impl fmt::Display for MutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutePolicy::InboundOnly => write!(f, "inbound"),
            MutePolicy::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for MutePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbound" | "inbound-only" => Ok(MutePolicy::InboundOnly),
            "bidirectional" | "both" => Ok(MutePolicy::Bidirectional),
            other => Err(format!("unknown mute policy: {}", other)),
        }
    }
}

/// Configuration for a peer process.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// This peer's id, unique within the registry.
    pub user_id: String,

    /// Address to bind the listener to.
    pub bind_addr: SocketAddr,

    /// Host advertised to the registry. The port is the bound port.
    pub advertise_host: String,

    /// Registry base URL.
    pub registry_url: String,

    /// Sleep between keep-alives. Defaults to the registry liveness window.
    pub keep_alive_interval: Duration,

    /// Interval between automatic discovery cycles, `None` to only discover on demand.
    pub discovery_interval: Option<Duration>,

    /// Mute duration used by the command surface when none is given.
    pub default_mute_duration: Duration,

    /// Whether outbound connections carry a key and messages are encrypted.
    pub encryption_enabled: bool,

    /// Which directions a mute suppresses.
    pub mute_policy: MutePolicy,

    /// Mirror block/mute changes to the registry replica.
    pub replicate_moderation: bool,

    /// Timeout for establishing outbound connections.
    pub connect_timeout: Duration,

    /// Timeout for receiving the key frame on an accepted connection.
    pub handshake_timeout: Duration,
}

impl PeerConfig {
    /// Create a new configuration for `user_id` listening on `bind_addr`.
    pub fn new(user_id: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            user_id: user_id.into(),
            bind_addr,
            advertise_host: DEFAULT_ADVERTISE_HOST.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            keep_alive_interval: LIVENESS_WINDOW,
            discovery_interval: Some(DEFAULT_DISCOVERY_INTERVAL),
            default_mute_duration: DEFAULT_MUTE_DURATION,
            encryption_enabled: true,
            mute_policy: MutePolicy::default(),
            replicate_moderation: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Set the advertised host.
    pub fn with_advertise_host(mut self, host: impl Into<String>) -> Self {
        self.advertise_host = host.into();
        self
    }

    /// Set the registry URL.
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    /// Set the keep-alive interval.
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the discovery interval (`None` disables the discovery loop).
    pub fn with_discovery_interval(mut self, interval: Option<Duration>) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Set the default mute duration.
    pub fn with_default_mute_duration(mut self, duration: Duration) -> Self {
        self.default_mute_duration = duration;
        self
    }

    /// Enable or disable encryption.
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption_enabled = enabled;
        self
    }

    /// Set the mute policy.
    pub fn with_mute_policy(mut self, policy: MutePolicy) -> Self {
        self.mute_policy = policy;
        self
    }

    /// Enable or disable mirroring moderation to the registry.
    pub fn with_replicate_moderation(mut self, enabled: bool) -> Self {
        self.replicate_moderation = enabled;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}
