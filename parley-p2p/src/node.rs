//! Peer node orchestrator.
//!
//! A [`PeerNode`] owns the listening socket, the connection table, the
//! moderation state and the discovery cache, and runs three kinds of
//! background task:
//!
//! ```text
//! PeerNode::start()
//! ├── Listener task (accept, one handshake task per connection)
//! ├── Connection task per ready connection (read/write loop)
//! ├── Keep-alive task (every keep_alive_interval)
//! └── Discovery task (every discovery_interval, optional)
//! ```
//!
//! Everything else is driven by the caller through the async methods below.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parley_registry::{validate_peer_id, PeerAddress};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval_at, Instant};
use tokio_util::task::TaskTracker;

use crate::config::{PeerConfig, INBOX_CAPACITY, MAX_FRAME_SIZE};
use crate::discovery::{DiscoveryCache, RegistryRpc};
use crate::error::{P2pError, P2pResult};
use crate::manager::{connect_to_peer, run_listener, ConnectResult, ConnectionTable};
use crate::moderation::{ModerationEntry, ModerationState, Verdict};
use crate::peer::{ConnectionCommand, ConnectionId, ConnectionInfo, ConnectionState};
use crate::protocol::{self, ChatMessage};

/// Messages delivered to the application.
pub type Inbox = mpsc::Receiver<ChatMessage>;

/// State shared between the node handle and its tasks.
pub(crate) struct NodeShared {
    pub(crate) config: PeerConfig,
    pub(crate) table: RwLock<ConnectionTable>,
    pub(crate) moderation: RwLock<ModerationState>,
    pub(crate) cache: RwLock<DiscoveryCache>,
    pub(crate) registry: Arc<dyn RegistryRpc>,
    pub(crate) inbox: mpsc::Sender<ChatMessage>,
    pub(crate) shutdown: broadcast::Sender<()>,
    pub(crate) tasks: TaskTracker,
    next_connection_id: AtomicU64,
    /// Set once a register call succeeds; until then keep-alive re-registers.
    registered: AtomicBool,
}

impl NodeShared {
    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    fn advertised_address(&self, local_addr: SocketAddr) -> PeerAddress {
        PeerAddress::new(self.config.advertise_host.clone(), local_addr.port())
    }

    async fn register(&self, local_addr: SocketAddr) -> P2pResult<()> {
        let address = self.advertised_address(local_addr);
        self.registry.register(&self.config.user_id, &address).await?;
        self.registered.store(true, Ordering::Release);
        tracing::info!(peer = %self.config.user_id, addr = %address, "Registered with registry");
        Ok(())
    }
}

/// What happened to a send request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued on the connection.
    Sent,
    /// Suppressed because the target is blocked.
    Blocked,
    /// Suppressed because the target is muted and the mute policy is bidirectional.
    Muted,
}

/// Result of one discover round.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Live peers other than ourselves.
    pub peers: BTreeMap<String, PeerAddress>,
    /// Peers a new connection was opened to.
    pub connected: Vec<String>,
    /// Peers whose connect attempt failed.
    pub failed: Vec<String>,
}

/// A running peer.
pub struct PeerNode {
    shared: Arc<NodeShared>,
    local_addr: SocketAddr,
}

impl PeerNode {
    /// Bind the listener and start the background tasks.
    ///
    /// The node is not registered yet; call [`register`](Self::register).
    pub async fn start(config: PeerConfig, registry: Arc<dyn RegistryRpc>) -> P2pResult<(Self, Inbox)> {
        validate_peer_id("user_id", &config.user_id)
            .map_err(|e| P2pError::InvalidPeerId(e.to_string()))?;

        // Bind first so the advertised port is the real one when bind_addr uses port 0.
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel(1);

        let shared = Arc::new(NodeShared {
            table: RwLock::new(ConnectionTable::new(config.user_id.clone())),
            moderation: RwLock::new(ModerationState::new(config.user_id.clone())),
            cache: RwLock::new(DiscoveryCache::new()),
            registry,
            inbox: inbox_tx,
            shutdown: shutdown_tx,
            tasks: TaskTracker::new(),
            next_connection_id: AtomicU64::new(1),
            registered: AtomicBool::new(false),
            config,
        });

        tracing::info!(
            peer = %shared.config.user_id,
            addr = %local_addr,
            encryption = shared.config.encryption_enabled,
            mute_policy = %shared.config.mute_policy,
            "Peer listening"
        );

        // Background tasks, all tracked so shutdown can wait for them.
        shared.tasks.spawn(run_listener(
            shared.clone(),
            listener,
            shared.shutdown.subscribe(),
        ));
        shared
            .tasks
            .spawn(run_keep_alive(shared.clone(), local_addr, shared.shutdown.subscribe()));
        if let Some(every) = shared.config.discovery_interval {
            shared
                .tasks
                .spawn(run_discovery_loop(shared.clone(), every, shared.shutdown.subscribe()));
        }

        Ok((Self { shared, local_addr }, inbox_rx))
    }

    /// Our peer id.
    pub fn user_id(&self) -> &str {
        &self.shared.config.user_id
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address announced to the registry.
    pub fn advertised_address(&self) -> PeerAddress {
        self.shared.advertised_address(self.local_addr)
    }

    /// Node configuration.
    pub fn config(&self) -> &PeerConfig {
        &self.shared.config
    }

    /// Announce ourselves to the registry.
    ///
    /// If this fails the keep-alive task keeps re-registering until one
    /// attempt succeeds.
    pub async fn register(&self) -> P2pResult<()> {
        self.shared.register(self.local_addr).await
    }

    /// Fetch live peers, cache their addresses and connect to the ones we
    /// have no connection to.
    pub async fn discover(&self) -> P2pResult<DiscoveryReport> {
        discover(&self.shared).await
    }

    /// Send `text` to `target`.
    ///
    /// Blocked targets (and muted ones under the bidirectional policy) are
    /// suppressed without touching the socket. Without a ready connection
    /// the message is dropped with [`P2pError::NotConnected`].
    pub async fn send(&self, target: &str, text: &str) -> P2pResult<SendOutcome> {
        self.check_target(target)?;

        // Moderation is decided before any socket is touched.
        let verdict = self.shared.moderation.read().await.outbound_verdict(
            target,
            self.shared.config.mute_policy,
            Instant::now(),
        );
        match verdict {
            Verdict::Blocked => {
                tracing::info!(target_id = %target, "Not sending to blocked peer");
                return Ok(SendOutcome::Blocked);
            }
            Verdict::Muted => {
                tracing::info!(target_id = %target, "Not sending to muted peer");
                return Ok(SendOutcome::Muted);
            }
            Verdict::Allow => {}
        }

        let table = self.shared.table.read().await;
        let handle = table
            .get(target)
            .ok_or_else(|| P2pError::NotConnected(target.to_string()))?;

        // Seal with this connection's key, then make sure it fits in one
        // frame before it reaches the connection task.
        let message = ChatMessage::new(self.user_id(), text);
        let payload = protocol::seal(handle.key(), &message)?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(P2pError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        // A closed channel means the connection task already exited.
        if !handle.command(ConnectionCommand::Send(payload)) {
            return Err(P2pError::NotConnected(target.to_string()));
        }

        tracing::debug!(target_id = %target, "Message queued");
        Ok(SendOutcome::Sent)
    }

    /// Block `target`. Existing connections stay open.
    pub async fn block(&self, target: &str) -> P2pResult<bool> {
        self.check_target(target)?;
        let changed = self.shared.moderation.write().await.block(target);

        // The local list is authoritative; the registry copy is best effort.
        if changed && self.shared.config.replicate_moderation {
            log_replica("block", target, self.shared.registry.block(self.user_id(), target).await);
        }
        Ok(changed)
    }

    /// Lift a block and reconnect if no connection is live.
    pub async fn unblock(&self, target: &str) -> P2pResult<bool> {
        self.check_target(target)?;
        let changed = self.shared.moderation.write().await.unblock(target);

        if changed {
            if self.shared.config.replicate_moderation {
                log_replica("unblock", target, self.shared.registry.unblock(self.user_id(), target).await);
            }
            self.reconnect_if_idle(target).await;
        }
        Ok(changed)
    }

    /// Mute `target` for `duration` (`None` = indefinitely).
    pub async fn mute(&self, target: &str, duration: Option<Duration>) -> P2pResult<bool> {
        self.check_target(target)?;
        let changed = self
            .shared
            .moderation
            .write()
            .await
            .mute(target, duration, Instant::now());

        // Mirror even a refresh so the replica carries the new expiry.
        if self.shared.config.replicate_moderation {
            log_replica(
                "mute",
                target,
                self.shared.registry.mute(self.user_id(), target, duration).await,
            );
        }
        self.reconnect_if_idle(target).await;
        Ok(changed)
    }

    /// Mute `target` for the configured default duration.
    pub async fn mute_default(&self, target: &str) -> P2pResult<bool> {
        self.mute(target, Some(self.shared.config.default_mute_duration)).await
    }

    /// Lift a mute and reconnect if no connection is live.
    pub async fn unmute(&self, target: &str) -> P2pResult<bool> {
        self.check_target(target)?;
        let changed = self.shared.moderation.write().await.unmute(target, Instant::now());

        if changed {
            if self.shared.config.replicate_moderation {
                log_replica("unmute", target, self.shared.registry.unmute(self.user_id(), target).await);
            }
            self.reconnect_if_idle(target).await;
        }
        Ok(changed)
    }

    /// Connect to `target` using the address from the last discover call.
    pub async fn reconnect_peer(&self, target: &str) -> P2pResult<ConnectResult> {
        self.check_target(target)?;
        if self.shared.table.read().await.has_live(target) {
            return Ok(ConnectResult::AlreadyConnected);
        }

        // Only the last discover result is consulted, never the registry.
        let address = self
            .shared
            .cache
            .read()
            .await
            .get(target)
            .cloned()
            .ok_or_else(|| P2pError::UnknownPeer(target.to_string()))?;

        tracing::info!(target_id = %target, addr = %address, "Reconnecting");
        connect_to_peer(&self.shared, target, &address).await
    }

    /// Connection state for `target`.
    pub async fn connection_state(&self, target: &str) -> ConnectionState {
        self.shared.table.read().await.state(target)
    }

    /// Ready connections sorted by remote id.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.shared.table.read().await.snapshot()
    }

    /// Active blocks and mutes.
    pub async fn moderation(&self) -> Vec<ModerationEntry> {
        self.shared.moderation.read().await.entries(Instant::now())
    }

    /// Addresses from the last discover call.
    pub async fn known_peers(&self) -> BTreeMap<String, PeerAddress> {
        self.shared.cache.read().await.peers().clone()
    }

    /// Stop every task and close every connection. Safe to call twice.
    pub async fn shutdown(&self) {
        // Signal every loop, then mark the table closed so late handshakes are rejected.
        let _ = self.shared.shutdown.send(());
        let closed = self.shared.table.write().await.close_all();

        // Wait for connection tasks to flush and close their sockets.
        self.shared.tasks.close();
        self.shared.tasks.wait().await;
        tracing::info!(peer = %self.user_id(), connections = closed, "Peer stopped");
    }

    fn check_target(&self, target: &str) -> P2pResult<()> {
        validate_peer_id("peer id", target).map_err(|e| P2pError::InvalidPeerId(e.to_string()))?;
        if target == self.user_id() {
            return Err(P2pError::InvalidPeerId(format!("{} is our own id", target)));
        }
        Ok(())
    }

    async fn reconnect_if_idle(&self, target: &str) {
        if self.shared.table.read().await.has_live(target) {
            return;
        }
        match self.reconnect_peer(target).await {
            Ok(result) => tracing::debug!(target_id = %target, ?result, "Reconnect attempted"),
            Err(P2pError::UnknownPeer(_)) => {
                tracing::debug!(target_id = %target, "No cached address, not reconnecting");
            }
            Err(e) => tracing::debug!(target_id = %target, error = %e, "Reconnect failed"),
        }
    }
}

fn log_replica(operation: &str, target: &str, result: P2pResult<()>) {
    if let Err(e) = result {
        tracing::warn!(operation, target_id = %target, error = %e, "Failed to mirror moderation to registry");
    }
}

async fn discover(shared: &Arc<NodeShared>) -> P2pResult<DiscoveryReport> {
    let mut peers = shared.registry.discover().await?;
    peers.remove(&shared.config.user_id);

    // The cache feeds reconnect_peer, so refresh it even if every dial fails.
    shared.cache.write().await.replace(peers.clone());

    // Dial everything at once; connect_to_peer skips ids that are live or in flight.

    let attempts = peers.iter().map(|(id, address)| async move {
        (id.clone(), connect_to_peer(shared, id, address).await)
    });

    let mut report = DiscoveryReport::default();
    for (id, result) in join_all(attempts).await {
        match result {
            Ok(ConnectResult::Connected(_)) => report.connected.push(id),
            Ok(_) => {}
            Err(_) => report.failed.push(id),
        }
    }
    report.peers = peers;

    tracing::info!(
        live = report.peers.len(),
        connected = report.connected.len(),
        failed = report.failed.len(),
        "Discovery complete"
    );
    Ok(report)
}

async fn run_keep_alive(
    shared: Arc<NodeShared>,
    local_addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let period = shared.config.keep_alive_interval;
    // First tick one period after start; register() covers time zero.
    let mut timer = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = timer.tick() => {
                // The registry ignores keep-alives from ids it does not know,
                // so keep registering until it has heard of us once.
                if !shared.registered.load(Ordering::Acquire) {
                    if let Err(e) = shared.register(local_addr).await {
                        tracing::warn!(error = %e, "Registration retry failed");
                    }
                } else {
                    match shared.registry.keep_alive(&shared.config.user_id).await {
                        Ok(()) => tracing::trace!("Keep-alive sent"),
                        Err(e) => tracing::warn!(error = %e, "Keep-alive failed"),
                    }
                }

                // Expired mutes are inert already; this only frees memory.
                let purged = shared.moderation.write().await.purge_expired(Instant::now());
                if !purged.is_empty() {
                    tracing::debug!(?purged, "Expired mutes purged");
                }
            }
        }
    }
}

async fn run_discovery_loop(
    shared: Arc<NodeShared>,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut timer = interval_at(Instant::now() + every, every);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = timer.tick() => {
                if let Err(e) = discover(&shared).await {
                    tracing::warn!(error = %e, "Periodic discovery failed");
                }
            }
        }
    }
}
