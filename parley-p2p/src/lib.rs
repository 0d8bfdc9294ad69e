//! Peer client for Parley.
//!
//! Peers find each other through the rendezvous registry and then talk over
//! direct TCP connections. This crate provides:
//!
//! - Connection management with a deterministic duplicate tie-break
//! - Per-connection key exchange (the dialer generates an AES-256-GCM key)
//! - Length-prefixed framing of `"<sender>:<text>"` chat messages
//! - Block and mute lists that gate sending and delivery
//! - Registry access over HTTP or in-process
//!
//! # Architecture
//!
//! Each ready connection runs in its own tokio task which owns the socket.
//! The node talks to those tasks through unbounded command channels, and
//! the tasks hand delivered messages to the application through a bounded
//! inbox.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use parley_p2p::{HttpRegistry, PeerConfig, PeerNode};
//!
//! let config = PeerConfig::new("user1", "0.0.0.0:6001".parse()?);
//! let registry = Arc::new(HttpRegistry::new(&config.registry_url, Duration::from_secs(10))?);
//!
//! let (node, mut inbox) = PeerNode::start(config, registry).await?;
//! node.register().await?;
//! node.discover().await?;
//! node.send("user2", "Hello from user1!").await?;
//!
//! while let Some(message) = inbox.recv().await {
//!     println!("{}", message);
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;

pub mod discovery;
pub mod manager;
pub mod moderation;
pub mod node;
pub mod peer;
pub mod protocol;

// Re-export main types
pub use config::{MutePolicy, PeerConfig, DEFAULT_MUTE_DURATION, LIVENESS_WINDOW, NETWORK_MAGIC};
pub use crypto::SymmetricKey;
pub use discovery::{DiscoveryCache, HttpRegistry, LocalRegistry, RegistryRpc};
pub use error::{ErrorClass, P2pError, P2pResult};
pub use manager::ConnectResult;
pub use moderation::{ModerationEntry, ModerationKind, ModerationState, Verdict};
pub use node::{DiscoveryReport, Inbox, PeerNode, SendOutcome};
pub use peer::{ConnectionDirection, ConnectionInfo, ConnectionState};
pub use protocol::ChatMessage;
