//! HTTP server exposing the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::api::{
    BlockRequest, BlockedResponse, DiscoverResponse, KeepAliveRequest, MessageResponse,
    MuteRequest, MutedResponse, PeerAddress, RegisterRequest, UnmuteRequest,
};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::registry::{millis_to_secs, now_millis, Registry};

/// Registry shared between handlers and the sweeper.
pub type SharedRegistry = Arc<RwLock<Registry>>;

/// State handed to every axum handler.
#[derive(Clone)]
pub struct RegistryState {
    registry: SharedRegistry,
}

impl RegistryState {
    /// Wrap an existing registry.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

/// Build the router with all registry routes.
pub fn build_router(state: RegistryState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/discover", get(discover))
        .route("/keep_alive", post(keep_alive))
        .route("/block", post(block))
        .route("/unblock", post(unblock))
        .route("/mute", post(mute))
        .route("/unmute", post(unmute))
        .route("/block/:user_id", get(get_blocked))
        .route("/mute/:user_id", get(get_muted))
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> RegistryResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| RegistryError::InvalidRequest(rejection.body_text()))
}

/// Resolve the wire duration field into an optional expiry duration.
fn mute_duration(field: Option<Option<f64>>, default: Duration) -> RegistryResult<Option<Duration>> {
    match field {
        None => Ok(Some(default)),
        Some(None) => Ok(None),
        Some(Some(secs)) => Duration::try_from_secs_f64(secs).map(Some).map_err(|_| {
            RegistryError::InvalidRequest(format!(
                "duration must be a non-negative number of seconds (got {})",
                secs
            ))
        }),
    }
}

async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("OK"))
}

async fn register(
    State(state): State<RegistryState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> RegistryResult<Json<MessageResponse>> {
    let req = body(payload)?;
    let address = PeerAddress::new(req.ip, req.port);

    state
        .registry
        .write()
        .await
        .register(&req.user_id, address.clone(), now_millis())?;

    tracing::info!(peer = %req.user_id, addr = %address, "Peer registered");
    Ok(Json(MessageResponse::new("User registered")))
}

async fn discover(State(state): State<RegistryState>) -> Json<DiscoverResponse> {
    let registry = state.registry.read().await;
    let live: DiscoverResponse = registry
        .discover(now_millis())
        .into_iter()
        .map(|(id, record)| (id, record.to_discovered()))
        .collect();

    tracing::debug!(live = live.len(), stored = registry.len(), "Discover");
    Json(live)
}

async fn keep_alive(
    State(state): State<RegistryState>,
    payload: Result<Json<KeepAliveRequest>, JsonRejection>,
) -> RegistryResult<Json<MessageResponse>> {
    let req = body(payload)?;
    let refreshed = state.registry.write().await.keep_alive(&req.user_id, now_millis());

    if refreshed {
        tracing::trace!(peer = %req.user_id, "Keep-alive");
    } else {
        tracing::debug!(peer = %req.user_id, "Keep-alive for unknown peer ignored");
    }
    Ok(Json(MessageResponse::new("Keep-alive received")))
}

async fn block(
    State(state): State<RegistryState>,
    payload: Result<Json<BlockRequest>, JsonRejection>,
) -> RegistryResult<Json<MessageResponse>> {
    let req = body(payload)?;
    state.registry.write().await.block(&req.user_id, &req.block_id)?;

    tracing::info!(peer = %req.user_id, target_id = %req.block_id, "Block recorded");
    Ok(Json(MessageResponse::new(format!("User {} blocked", req.block_id))))
}

async fn unblock(
    State(state): State<RegistryState>,
    payload: Result<Json<BlockRequest>, JsonRejection>,
) -> RegistryResult<Json<MessageResponse>> {
    let req = body(payload)?;
    let removed = state.registry.write().await.unblock(&req.user_id, &req.block_id);

    tracing::info!(peer = %req.user_id, target_id = %req.block_id, removed, "Unblock recorded");
    Ok(Json(MessageResponse::new(format!("User {} unblocked", req.block_id))))
}

async fn mute(
    State(state): State<RegistryState>,
    payload: Result<Json<MuteRequest>, JsonRejection>,
) -> RegistryResult<Json<MessageResponse>> {
    let req = body(payload)?;
    let mut registry = state.registry.write().await;
    let duration = mute_duration(req.duration, registry.default_mute_duration())?;
    registry.mute(&req.user_id, &req.mute_id, duration, now_millis())?;

    tracing::info!(peer = %req.user_id, target_id = %req.mute_id, ?duration, "Mute recorded");
    let message = match duration {
        Some(d) => format!("User {} muted for {} seconds", req.mute_id, d.as_secs_f64()),
        None => format!("User {} muted indefinitely", req.mute_id),
    };
    Ok(Json(MessageResponse::new(message)))
}

async fn unmute(
    State(state): State<RegistryState>,
    payload: Result<Json<UnmuteRequest>, JsonRejection>,
) -> RegistryResult<Json<MessageResponse>> {
    let req = body(payload)?;
    let removed = state.registry.write().await.unmute(&req.user_id, &req.mute_id);

    tracing::info!(peer = %req.user_id, target_id = %req.mute_id, removed, "Unmute recorded");
    Ok(Json(MessageResponse::new(format!("User {} unmuted", req.mute_id))))
}

async fn get_blocked(
    State(state): State<RegistryState>,
    Path(user_id): Path<String>,
) -> Json<BlockedResponse> {
    Json(state.registry.read().await.blocked(&user_id))
}

async fn get_muted(
    State(state): State<RegistryState>,
    Path(user_id): Path<String>,
) -> Json<MutedResponse> {
    let muted = state
        .registry
        .read()
        .await
        .muted(&user_id, now_millis())
        .into_iter()
        .map(|(id, expires_at)| (id, expires_at.map(millis_to_secs)))
        .collect();
    Json(muted)
}

/// Handle to a running registry server.
pub struct RegistryServerHandle {
    /// The local address the server is bound to.
    local_addr: SocketAddr,
    /// Registry state, for in-process inspection.
    registry: SharedRegistry,
    /// Stops the HTTP server and the sweeper.
    shutdown_tx: broadcast::Sender<()>,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl RegistryServerHandle {
    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL for HTTP clients, e.g. `http://127.0.0.1:5000`.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// The registry served by this handle.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Stop the server and wait for its tasks to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "Registry server task failed");
        }
        if let Err(e) = self.sweeper.await {
            tracing::warn!(error = %e, "Registry sweeper task failed");
        }
        tracing::info!(addr = %self.local_addr, "Registry stopped");
    }
}

/// Start the registry HTTP server and its sweeper.
pub async fn start_registry_server(config: RegistryConfig) -> RegistryResult<RegistryServerHandle> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let registry: SharedRegistry = Arc::new(RwLock::new(Registry::from_config(&config)));
    let app = build_router(RegistryState::new(registry.clone()));
    let (shutdown_tx, _) = broadcast::channel(1);

    tracing::info!(
        addr = %local_addr,
        liveness_window = ?config.liveness_window,
        "Starting registry"
    );

    let mut server_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Registry server error");
        }
    });

    let sweeper = tokio::spawn(run_sweeper(
        registry.clone(),
        config.sweep_interval,
        config.stale_retention,
        shutdown_tx.subscribe(),
    ));

    Ok(RegistryServerHandle {
        local_addr,
        registry,
        shutdown_tx,
        server,
        sweeper,
    })
}

async fn run_sweeper(
    registry: SharedRegistry,
    every: Duration,
    retention: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut timer = interval(every);
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = timer.tick() => {
                let stats = registry.write().await.sweep(now_millis(), retention);
                if stats.peers > 0 || stats.mutes > 0 {
                    tracing::debug!(peers = stats.peers, mutes = stats.mutes, "Swept stale registry entries");
                }
            }
        }
    }
}
