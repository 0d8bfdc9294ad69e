//! Rendezvous registry for Parley peers.
//!
//! Transient peers register the address they listen on, refresh it with
//! periodic keep-alives, and call discover to learn the addresses of every
//! other live peer. The registry also keeps a read replica of each peer's
//! block and mute lists; the peer itself holds the authoritative copy.
//!
//! # HTTP interface
//!
//! ```text
//! POST /register        {user_id, ip, port}
//! GET  /discover        -> {user_id: {ip, port, last_seen}}
//! POST /keep_alive      {user_id}
//! POST /block           {user_id, block_id}
//! POST /unblock         {user_id, block_id}
//! POST /mute            {user_id, mute_id, duration?}
//! POST /unmute          {user_id, mute_id}
//! GET  /block/{user_id} -> [ids]
//! GET  /mute/{user_id}  -> {id: expires_at}
//! ```
//!
//! Nothing is persisted; a restart starts from an empty directory.

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;

pub use api::{DiscoverResponse, DiscoveredPeer, PeerAddress};
pub use config::{RegistryConfig, DEFAULT_MUTE_DURATION, LIVENESS_WINDOW};
pub use error::{RegistryError, RegistryResult};
pub use registry::{now_millis, validate_peer_id, PeerRecord, Registry, SweepStats};
pub use server::{build_router, start_registry_server, RegistryServerHandle, RegistryState, SharedRegistry};
