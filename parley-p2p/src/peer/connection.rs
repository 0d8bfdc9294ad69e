//! Per-connection read/write loop.
//!
//! Each ready connection runs in its own task which owns the framed socket.
//! Outbound frames arrive over an unbounded command channel; inbound frames
//! are decrypted, parsed and screened against moderation state before they
//! reach the application inbox.

use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::crypto::SymmetricKey;
use crate::error::{ErrorClass, P2pError};
use crate::manager::{ConnectionHandle, InsertOutcome};
use crate::moderation::{ModerationState, Verdict};
use crate::node::NodeShared;
use crate::peer::ConnectionInfo;
use crate::protocol::{self, ChatMessage, Frame, FrameCodec};

/// A TCP stream speaking the peer frame protocol.
pub type PeerFramed = Framed<TcpStream, FrameCodec>;

/// Commands sent to a connection task.
#[derive(Debug, Clone)]
pub enum ConnectionCommand {
    /// Write a sealed message payload.
    Send(Bytes),
    /// Close the socket and exit.
    Close,
}

/// What happened to one inbound message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Passed every check; hand to the application.
    Deliver(ChatMessage),
    /// Dropped because the sender is blocked.
    Blocked(String),
    /// Dropped because the sender is muted.
    Muted(String),
    /// Dropped because the frame did not parse.
    Malformed(String),
    /// Dropped because the frame did not decrypt.
    Undecryptable(String),
}

/// Decrypt, parse and screen one message payload.
pub fn screen_inbound(
    key: Option<&SymmetricKey>,
    payload: &[u8],
    remote_id: &str,
    moderation: &ModerationState,
    now: Instant,
) -> ReceiveOutcome {
    // Decrypt and split before moderation; a bad frame never reaches the verdict.
    let message = match protocol::open(key, payload) {
        Ok(message) => message,
        Err(e @ P2pError::Crypto(_)) => return ReceiveOutcome::Undecryptable(e.to_string()),
        Err(e) => return ReceiveOutcome::Malformed(e.to_string()),
    };

    // Check both the claimed sender and the connection's hello id, so a
    // spoofed prefix cannot slip past a block.
    match moderation.inbound_verdict(&[message.sender.as_str(), remote_id], now) {
        Verdict::Allow => ReceiveOutcome::Deliver(message),
        Verdict::Blocked => ReceiveOutcome::Blocked(message.sender),
        Verdict::Muted => ReceiveOutcome::Muted(message.sender),
    }
}

/// Put a keyed connection into the table and spawn its task.
///
/// Returns false if the table rejected it (duplicate losing the tie-break, or
/// shutdown in progress); the socket is dropped in that case.
pub(crate) async fn establish(
    shared: &Arc<NodeShared>,
    info: ConnectionInfo,
    key: Option<SymmetricKey>,
    framed: PeerFramed,
) -> bool {
    // Subscribe before inserting so a shutdown sent in between is not missed.
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let shutdown_rx = shared.shutdown.subscribe();
    let handle = ConnectionHandle::new(info.clone(), key.clone(), command_tx);

    // The table applies the tie-break; the loser is dropped here.
    match shared.table.write().await.insert(handle) {
        InsertOutcome::Rejected => {
            tracing::debug!(
                peer = %info.remote_id,
                conn = %info.id,
                direction = %info.direction,
                "Duplicate connection rejected"
            );
            return false;
        }
        // The old handle was already told to close.
        InsertOutcome::Replaced(old) => {
            tracing::debug!(
                peer = %info.remote_id,
                conn = %info.id,
                replaced = %old.id,
                "Duplicate connection replaced"
            );
        }
        InsertOutcome::Inserted => {}
    }

    tracing::info!(
        peer = %info.remote_id,
        addr = %info.peer_addr,
        direction = %info.direction,
        encrypted = info.encrypted,
        "Connection ready"
    );

    shared
        .tasks
        .spawn(run_connection(shared.clone(), info, key, framed, command_rx, shutdown_rx));
    true
}

async fn run_connection(
    shared: Arc<NodeShared>,
    info: ConnectionInfo,
    key: Option<SymmetricKey>,
    mut framed: PeerFramed,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!(peer = %info.remote_id, "Connection shutting down");
                break;
            }

            // Outbound: the node queues sealed payloads here.
            command = commands.recv() => match command {
                Some(ConnectionCommand::Send(payload)) => match framed.send(Frame::Message(payload)).await {
                    Ok(()) => {}
                    // The encoder refused this frame; nothing was written.
                    Err(e) if e.class() == ErrorClass::Protocol => {
                        tracing::warn!(peer = %info.remote_id, error = %e, "Dropping unsendable frame");
                    }
                    Err(e) => {
                        tracing::warn!(peer = %info.remote_id, error = %e, "Send failed");
                        break;
                    }
                },
                // Replaced by a newer connection, or the handle was dropped.
                Some(ConnectionCommand::Close) | None => break,
            },

            // Inbound: the hello was consumed during the handshake.
            frame = framed.next() => match frame {
                Some(Ok(Frame::Message(payload))) => {
                    handle_payload(&shared, &info, key.as_ref(), &payload).await;
                }
                Some(Ok(Frame::Hello(hello))) => {
                    tracing::warn!(
                        peer = %info.remote_id,
                        claimed = %hello.sender,
                        "Unexpected hello on ready connection, ignoring"
                    );
                }
                Some(Err(e)) => {
                    tracing::warn!(peer = %info.remote_id, error = %e, "Closing connection after protocol error");
                    break;
                }
                None => {
                    tracing::debug!(peer = %info.remote_id, "Connection closed by peer");
                    break;
                }
            },
        }
    }

    // Remove by id so a replacement under the same remote id survives.
    let _ = SinkExt::<Frame>::close(&mut framed).await;
    shared.table.write().await.remove(&info.remote_id, info.id);
    tracing::info!(peer = %info.remote_id, conn = %info.id, "Connection closed");
}

async fn handle_payload(
    shared: &NodeShared,
    info: &ConnectionInfo,
    key: Option<&SymmetricKey>,
    payload: &[u8],
) {
    // Hold the moderation lock only for the verdict, not the inbox send.
    let outcome = {
        let moderation = shared.moderation.read().await;
        screen_inbound(key, payload, &info.remote_id, &moderation, Instant::now())
    };

    match outcome {
        ReceiveOutcome::Deliver(message) => {
            tracing::debug!(peer = %info.remote_id, sender = %message.sender, "Message received");
            if shared.inbox.send(message).await.is_err() {
                tracing::debug!(peer = %info.remote_id, "Inbox closed, message dropped");
            }
        }
        ReceiveOutcome::Blocked(sender) => {
            tracing::info!(peer = %info.remote_id, sender = %sender, "Dropped message from blocked peer");
        }
        // Mutes drop silently.
        ReceiveOutcome::Muted(_) => {}
        ReceiveOutcome::Malformed(reason) => {
            tracing::warn!(peer = %info.remote_id, reason = %reason, "Discarding malformed message");
        }
        ReceiveOutcome::Undecryptable(reason) => {
            tracing::warn!(peer = %info.remote_id, reason = %reason, "Discarding undecryptable message");
        }
    }
}
