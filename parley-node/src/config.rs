//! Node configuration.

use std::net::SocketAddr;
use std::time::Duration;

use parley_p2p::PeerConfig;
use parley_registry::RegistryConfig;

use crate::cli::{Cli, Command, PeerArgs, RegistryArgs};

/// What the process runs.
#[derive(Debug, Clone)]
pub enum Mode {
    /// The rendezvous registry.
    Registry(RegistryConfig),
    /// An interactive peer.
    Peer(PeerConfig),
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Registry or peer.
    pub mode: Mode,

    /// Log level.
    pub log_level: String,
}

impl NodeConfig {
    /// Create a node configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        let mode = match &cli.command {
            Command::Registry(args) => Mode::Registry(registry_config(args)),
            Command::Peer(args) => Mode::Peer(peer_config(args)),
        };

        Self {
            mode,
            log_level: cli.log_level.clone(),
        }
    }
}

fn registry_config(args: &RegistryArgs) -> RegistryConfig {
    let mut config = RegistryConfig::new(args.listen)
        .with_liveness_window(Duration::from_secs(args.liveness_window))
        .with_default_mute_duration(Duration::from_secs(args.default_mute));

    if let Some(retention) = args.stale_retention {
        config = config.with_stale_retention(Duration::from_secs(retention));
    }
    config
}

fn peer_config(args: &PeerArgs) -> PeerConfig {
    let discovery = match args.discovery_interval {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let mut config = PeerConfig::new(args.user_id.clone(), SocketAddr::new(args.bind, args.port))
        .with_advertise_host(args.advertise_host.clone())
        .with_registry_url(args.registry_url.clone())
        .with_encryption(!args.no_encryption)
        .with_mute_policy(args.mute_policy)
        .with_replicate_moderation(!args.no_replicate)
        .with_discovery_interval(discovery)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_default_mute_duration(Duration::from_secs(args.default_mute));

    if let Some(secs) = args.keep_alive_interval {
        config = config.with_keep_alive_interval(Duration::from_secs(secs.max(1)));
    }
    config
}
