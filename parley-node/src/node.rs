//! Node orchestrator.
//!
//! Runs either the registry server or an interactive peer until a shutdown
//! signal arrives (or, for a peer, `/exit` or end of input).

use std::sync::Arc;

use parley_p2p::{HttpRegistry, Inbox, PeerConfig, PeerNode};
use parley_registry::{start_registry_server, RegistryConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::commands::{self, Command};
use crate::config::{Mode, NodeConfig};
use crate::shutdown::shutdown_requested;

/// The main node structure.
pub struct Node {
    config: NodeConfig,
}

impl Node {
    /// Create a node with the given configuration.
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Get the node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run the node until shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        match self.config.mode {
            Mode::Registry(config) => run_registry(config).await,
            Mode::Peer(config) => run_peer(config).await,
        }
    }
}

async fn run_registry(config: RegistryConfig) -> anyhow::Result<()> {
    let handle = start_registry_server(config).await?;
    tracing::info!("Registry listening on {}", handle.url());

    shutdown_requested().await;

    tracing::info!("Shutting down registry...");
    handle.stop().await;
    Ok(())
}

async fn run_peer(config: PeerConfig) -> anyhow::Result<()> {
    let registry = HttpRegistry::new(config.registry_url.clone(), config.connect_timeout)?;
    let (node, inbox) = PeerNode::start(config, Arc::new(registry)).await?;

    if let Err(e) = node.register().await {
        tracing::warn!(error = %e, "Registration failed, retrying every keep-alive interval");
    }

    match commands::execute(&node, Command::Discover).await {
        Ok(reply) => println!("{}", reply),
        Err(e) => tracing::warn!(error = %e, "Initial discovery failed"),
    }
    println!("Type /help for commands.");

    let printer = spawn_printer(inbox);
    let result = run_interactive(&node, BufReader::new(tokio::io::stdin())).await;
    printer.abort();
    result
}

/// Run a command session until it ends or a shutdown signal arrives, then
/// shut the node down. The session's error, if any, is returned afterwards.
pub async fn run_interactive<R>(node: &PeerNode, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let session = tokio::select! {
        result = run_session(node, input) => result,
        _ = shutdown_requested() => Ok(()),
    };

    // Close connections even when the session ended on an input error.
    tracing::info!("Shutting down peer...");
    node.shutdown().await;
    session
}

/// Print every delivered message until the inbox closes.
fn spawn_printer(mut inbox: Inbox) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            println!("{}", message);
        }
    })
}

/// Read commands line by line and execute them against `node`.
///
/// Returns on `/exit` or end of input. Command failures are reported and
/// the session continues.
pub async fn run_session<R>(node: &PeerNode, input: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == Command::Exit {
            return Ok(());
        }
        match commands::execute(node, command).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => println!("error: {}", e),
        }
    }
    tracing::debug!("End of input");
    Ok(())
}
