//! Parley node binary.
//!
//! `parley-node registry` runs the rendezvous registry, `parley-node peer
//! <id> <port>` runs an interactive peer.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use parley_node::cli::Cli;
use parley_node::config::NodeConfig;
use parley_node::node::Node;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Parley Node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::from_cli(&cli);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(Node::new(config).run());

    // A pending stdin read holds a blocking thread that never finishes.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}
