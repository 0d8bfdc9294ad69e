//! Parley node library.
//!
//! Backs the `parley-node` binary: CLI parsing, configuration, the
//! interactive command set and the orchestrator that runs either the
//! registry or a peer.

pub mod cli;
pub mod commands;
pub mod config;
pub mod node;
pub mod shutdown;
