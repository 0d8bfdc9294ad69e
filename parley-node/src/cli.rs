//! Command-line argument parsing.

use std::net::IpAddr;
use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use parley_p2p::MutePolicy;

/// Parley peer-to-peer messaging.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley-node")]
#[command(about = "Run the Parley rendezvous registry or an interactive peer")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// What to run.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the rendezvous registry.
    Registry(RegistryArgs),
    /// Run an interactive peer.
    Peer(PeerArgs),
}

/// Arguments for `parley-node registry`.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Seconds without a keep-alive before a peer drops out of discovery.
    #[arg(long, default_value_t = 30)]
    pub liveness_window: u64,

    /// Mute duration in seconds when a request omits it.
    #[arg(long, default_value_t = 60)]
    pub default_mute: u64,

    /// Seconds a stale record is kept before the sweeper removes it
    /// (default: ten liveness windows).
    #[arg(long)]
    pub stale_retention: Option<u64>,
}

/// Arguments for `parley-node peer`.
#[derive(Args, Debug, Clone)]
pub struct PeerArgs {
    /// Our peer id.
    pub user_id: String,

    /// TCP port to listen on for other peers.
    pub port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Host announced to the registry.
    #[arg(long, default_value = "127.0.0.1")]
    pub advertise_host: String,

    /// Registry base URL.
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    pub registry_url: String,

    /// Send and accept unencrypted connections.
    #[arg(long)]
    pub no_encryption: bool,

    /// Which directions a mute suppresses (inbound, bidirectional).
    #[arg(long, default_value = "inbound")]
    pub mute_policy: MutePolicy,

    /// Do not mirror blocks and mutes to the registry.
    #[arg(long)]
    pub no_replicate: bool,

    /// Seconds between keep-alives (default: the liveness window).
    #[arg(long)]
    pub keep_alive_interval: Option<u64>,

    /// Seconds between automatic discovery rounds (0 disables).
    #[arg(long, default_value_t = 30)]
    pub discovery_interval: u64,

    /// Seconds to wait for an outbound connect.
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Mute duration in seconds when `/mute` is given no duration.
    #[arg(long, default_value_t = 60)]
    pub default_mute: u64,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
