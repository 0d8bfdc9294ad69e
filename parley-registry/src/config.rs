//! Registry configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Time after which an unrefreshed peer record is excluded from discovery.
pub const LIVENESS_WINDOW: Duration = Duration::from_secs(30);

/// Mute duration applied when a mute request omits one.
pub const DEFAULT_MUTE_DURATION: Duration = Duration::from_secs(60);

/// How many liveness windows a stale record survives before it is swept.
pub const DEFAULT_RETENTION_WINDOWS: u32 = 10;

/// Default registry listen address.
pub const DEFAULT_REGISTRY_ADDR: &str = "0.0.0.0:5000";

/// Configuration for the registry server.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,

    /// Records older than this are hidden from discovery.
    pub liveness_window: Duration,

    /// Mute duration used when a request does not carry one.
    pub default_mute_duration: Duration,

    /// Records older than this are removed by the sweeper.
    pub stale_retention: Duration,

    /// Interval between sweeps.
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            liveness_window: LIVENESS_WINDOW,
            default_mute_duration: DEFAULT_MUTE_DURATION,
            stale_retention: LIVENESS_WINDOW * DEFAULT_RETENTION_WINDOWS,
            sweep_interval: LIVENESS_WINDOW,
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration with the specified bind address.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Set the liveness window.
    ///
    /// Retention and sweep interval follow the window unless set afterwards.
    pub fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self.stale_retention = window * DEFAULT_RETENTION_WINDOWS;
        self.sweep_interval = window;
        self
    }

    /// Set the default mute duration.
    pub fn with_default_mute_duration(mut self, duration: Duration) -> Self {
        self.default_mute_duration = duration;
        self
    }

    /// Set how long stale records are retained before being swept.
    pub fn with_stale_retention(mut self, retention: Duration) -> Self {
        self.stale_retention = retention;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
