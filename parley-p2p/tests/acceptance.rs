//! Acceptance tests for the peer layer.
//!
//! These tests verify the acceptance criteria:
//! 1. Exchange - user2 -> user1 "Hello from user2!" arrives as sender user2
//! 2. Key exchange - the dialer's key decrypts the frame to "user2:..."
//! 3. Blocking - user3 blocks user4 and sends twice: zero bytes written
//! 4. Inbound moderation - blocked and muted senders are never delivered
//! 5. Reconnect - unblocking a peer with no live connection redials it
//! 6. Robustness - malformed, undecryptable and out-of-order frames
//! 7. Tie-break - simultaneous dials converge to one connection
//! 8. Liveness - keep-alives keep a peer discoverable
//! 9. End-to-end - peers over the HTTP registry

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;
use tracing_subscriber::EnvFilter;

use parley_p2p::crypto::{self, SymmetricKey};
use parley_p2p::protocol::{seal, ChatMessage, Frame, FrameCodec, Hello};
use parley_p2p::{
    ConnectionState, HttpRegistry, Inbox, LocalRegistry, MutePolicy, P2pError, PeerConfig,
    PeerNode, RegistryRpc, SendOutcome,
};
use parley_registry::{start_registry_server, PeerAddress, Registry, RegistryConfig, SharedRegistry};

/// Upper bound for anything that should happen "soon".
const WAIT: Duration = Duration::from_secs(5);

/// How long to watch for something that must not happen.
const QUIET: Duration = Duration::from_millis(300);

type RawPeer = Framed<TcpStream, FrameCodec>;

fn local_registry(window: Duration) -> (SharedRegistry, Arc<dyn RegistryRpc>) {
    let shared: SharedRegistry = Arc::new(RwLock::new(Registry::new(window)));
    let rpc: Arc<dyn RegistryRpc> = Arc::new(LocalRegistry::new(shared.clone()));
    (shared, rpc)
}

/// Peer configuration with port 0 (OS assigns port) and no discovery loop.
fn test_config(user_id: &str) -> PeerConfig {
    PeerConfig::new(user_id, "127.0.0.1:0".parse().unwrap())
        .with_discovery_interval(None)
        .with_connect_timeout(Duration::from_secs(2))
        .with_handshake_timeout(Duration::from_secs(2))
}

/// Route node logs to the test harness; `RUST_LOG=parley_p2p=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn start_peer(config: PeerConfig, registry: &Arc<dyn RegistryRpc>) -> (PeerNode, Inbox) {
    init_tracing();
    let (node, inbox) = PeerNode::start(config, registry.clone()).await.unwrap();
    node.register().await.unwrap();
    (node, inbox)
}

/// Poll `check` until it returns true or `WAIT` elapses.
async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {}", what);
}

async fn wait_ready(node: &PeerNode, remote: &str) {
    eventually(&format!("{} -> {} ready", node.user_id(), remote), || async {
        node.connection_state(remote).await == ConnectionState::Ready
    })
    .await;
}

async fn next_message(inbox: &mut Inbox) -> ChatMessage {
    timeout(WAIT, inbox.recv())
        .await
        .expect("no message within timeout")
        .expect("inbox closed")
}

async fn assert_no_message(inbox: &mut Inbox) {
    if let Ok(Some(message)) = timeout(QUIET, inbox.recv()).await {
        panic!("unexpected delivery: {}", message);
    }
}

/// A listening socket that pretends to be a peer.
async fn raw_listener(registry: &Arc<dyn RegistryRpc>, user_id: &str) -> TcpListener {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    registry
        .register(user_id, &PeerAddress::new("127.0.0.1", port))
        .await
        .unwrap();
    listener
}

async fn accept_raw(listener: &TcpListener) -> RawPeer {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    Framed::new(stream, FrameCodec::new())
}

async fn expect_hello(raw: &mut RawPeer) -> Hello {
    match timeout(WAIT, raw.next()).await.unwrap() {
        Some(Ok(Frame::Hello(hello))) => hello,
        other => panic!("expected hello, got {:?}", other),
    }
}

/// Dial a node as a raw peer and send a hello.
async fn dial_raw(node: &PeerNode, sender: &str, key: Option<SymmetricKey>) -> RawPeer {
    let stream = TcpStream::connect(node.local_addr()).await.unwrap();
    let mut raw = Framed::new(stream, FrameCodec::new());
    raw.send(Frame::Hello(Hello {
        sender: sender.to_string(),
        key,
    }))
    .await
    .unwrap();
    raw
}

// ============================================================================
// Test 1/2: Exchange and key negotiation
// ============================================================================

#[tokio::test]
async fn test_user2_to_user1_hello() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;
    let (user2, mut inbox2) = start_peer(test_config("user2"), &registry).await;

    let report = user2.discover().await.unwrap();
    assert!(report.peers.contains_key("user1"));
    assert!(!report.peers.contains_key("user2"));
    assert_eq!(report.connected, vec!["user1".to_string()]);
    wait_ready(&user1, "user2").await;

    assert_eq!(user2.send("user1", "Hello from user2!").await.unwrap(), SendOutcome::Sent);
    let message = next_message(&mut inbox1).await;
    assert_eq!(message.sender, "user2");
    assert_eq!(message.text, "Hello from user2!");

    // The accepting side replies over the same connection.
    assert_eq!(user1.send("user2", "hi back").await.unwrap(), SendOutcome::Sent);
    assert_eq!(next_message(&mut inbox2).await, ChatMessage::new("user1", "hi back"));

    let conns = user1.connections().await;
    assert_eq!(conns.len(), 1);
    assert!(conns[0].encrypted);

    user1.shutdown().await;
    user2.shutdown().await;
}

#[tokio::test]
async fn test_dialer_key_decrypts_frame() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let listener = raw_listener(&registry, "user1").await;
    let (user2, _inbox) = start_peer(test_config("user2"), &registry).await;

    user2.discover().await.unwrap();
    let mut raw = accept_raw(&listener).await;
    let hello = expect_hello(&mut raw).await;
    assert_eq!(hello.sender, "user2");
    let key = hello.key.expect("encrypted dialer sends a key");

    user2.send("user1", "Hello from user2!").await.unwrap();
    let payload = match timeout(WAIT, raw.next()).await.unwrap() {
        Some(Ok(Frame::Message(payload))) => payload,
        other => panic!("expected message, got {:?}", other),
    };
    assert_eq!(crypto::decrypt(&key, &payload).unwrap(), b"user2:Hello from user2!");

    user2.shutdown().await;
}

#[tokio::test]
async fn test_unencrypted_variant() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1").with_encryption(false), &registry).await;
    let (user2, _inbox2) = start_peer(test_config("user2").with_encryption(false), &registry).await;

    user2.discover().await.unwrap();
    wait_ready(&user1, "user2").await;
    assert!(!user1.connections().await[0].encrypted);

    user2.send("user1", "plain").await.unwrap();
    assert_eq!(next_message(&mut inbox1).await, ChatMessage::new("user2", "plain"));

    user1.shutdown().await;
    user2.shutdown().await;
}

#[tokio::test]
async fn test_encrypting_peer_refuses_keyless_hello() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;

    let mut raw = dial_raw(&user1, "user2", None).await;
    // May race with the close.
    let _ = raw
        .send(Frame::Message(Bytes::from_static(b"user2:sneaky")))
        .await;

    // The connection is closed without ever becoming ready.
    let closed = timeout(WAIT, raw.next()).await.unwrap();
    assert!(!matches!(closed, Some(Ok(_))));
    assert_ne!(user1.connection_state("user2").await, ConnectionState::Ready);
    assert_no_message(&mut inbox1).await;

    user1.shutdown().await;
}

// ============================================================================
// Test 3/4: Moderation
// ============================================================================

#[tokio::test]
async fn test_user3_blocks_user4_zero_bytes_written() {
    let (shared, registry) = local_registry(Duration::from_secs(30));
    let listener = raw_listener(&registry, "user4").await;
    let (user3, _inbox) = start_peer(test_config("user3"), &registry).await;

    user3.discover().await.unwrap();
    let mut raw = accept_raw(&listener).await;
    let hello = expect_hello(&mut raw).await;
    assert_eq!(hello.sender, "user3");
    wait_ready(&user3, "user4").await;

    assert!(user3.block("user4").await.unwrap());
    assert_eq!(user3.send("user4", "first").await.unwrap(), SendOutcome::Blocked);
    assert_eq!(user3.send("user4", "second").await.unwrap(), SendOutcome::Blocked);

    // Nothing after the hello.
    assert!(timeout(QUIET, raw.next()).await.is_err());

    // Blocking leaves the connection open.
    assert_eq!(user3.connection_state("user4").await, ConnectionState::Ready);

    // The registry replica mirrors the block.
    assert_eq!(shared.read().await.blocked("user3"), vec!["user4".to_string()]);

    user3.shutdown().await;
}

#[tokio::test]
async fn test_block_and_unblock_inbound() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;
    let (user2, _inbox2) = start_peer(test_config("user2"), &registry).await;

    user2.discover().await.unwrap();
    wait_ready(&user1, "user2").await;

    user1.block("user2").await.unwrap();
    user2.send("user1", "dropped").await.unwrap();
    assert_no_message(&mut inbox1).await;

    // Duplicate block is a no-op.
    assert!(!user1.block("user2").await.unwrap());

    assert!(user1.unblock("user2").await.unwrap());
    user2.send("user1", "delivered").await.unwrap();
    assert_eq!(next_message(&mut inbox1).await.text, "delivered");

    user1.shutdown().await;
    user2.shutdown().await;
}

#[tokio::test]
async fn test_mute_expires() {
    let (shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;
    let (user2, _inbox2) = start_peer(test_config("user2"), &registry).await;

    user2.discover().await.unwrap();
    wait_ready(&user1, "user2").await;

    assert!(user1.mute("user2", Some(Duration::from_millis(600))).await.unwrap());
    assert!(shared.read().await.muted("user1", parley_registry::now_millis()).contains_key("user2"));

    user2.send("user1", "muted").await.unwrap();
    assert_no_message(&mut inbox1).await;

    // Inbound-only policy still lets user1 talk to user2.
    assert_eq!(user1.send("user2", "still talking").await.unwrap(), SendOutcome::Sent);

    sleep(Duration::from_millis(600)).await;
    user2.send("user1", "audible").await.unwrap();
    assert_eq!(next_message(&mut inbox1).await.text, "audible");

    user1.shutdown().await;
    user2.shutdown().await;
}

#[tokio::test]
async fn test_bidirectional_mute_suppresses_send() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let config = test_config("user1").with_mute_policy(MutePolicy::Bidirectional);
    let (user1, _inbox1) = start_peer(config, &registry).await;

    user1.mute("user2", None).await.unwrap();
    assert_eq!(user1.send("user2", "hi").await.unwrap(), SendOutcome::Muted);

    assert!(user1.unmute("user2").await.unwrap());
    assert!(matches!(
        user1.send("user2", "hi").await,
        Err(P2pError::NotConnected(_))
    ));

    user1.shutdown().await;
}

// ============================================================================
// Test 5: Reconnect
// ============================================================================

#[tokio::test]
async fn test_unblock_reconnects_from_cache() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let listener = raw_listener(&registry, "user2").await;
    let (user1, _inbox) = start_peer(test_config("user1"), &registry).await;

    user1.block("user2").await.unwrap();
    user1.discover().await.unwrap();

    // Drop the first connection from the far side.
    let mut first = accept_raw(&listener).await;
    expect_hello(&mut first).await;
    drop(first);
    eventually("connection to user2 purged", || async {
        user1.connection_state("user2").await == ConnectionState::Unknown
    })
    .await;

    // Unblock redials the cached address without a new discover.
    user1.unblock("user2").await.unwrap();
    let mut second = accept_raw(&listener).await;
    assert_eq!(expect_hello(&mut second).await.sender, "user1");
    wait_ready(&user1, "user2").await;

    user1.shutdown().await;
}

#[tokio::test]
async fn test_mute_reconnects_from_cache() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let listener = raw_listener(&registry, "user2").await;
    let (user1, _inbox) = start_peer(test_config("user1"), &registry).await;

    user1.discover().await.unwrap();
    let mut first = accept_raw(&listener).await;
    expect_hello(&mut first).await;
    drop(first);
    eventually("connection to user2 purged", || async {
        user1.connection_state("user2").await == ConnectionState::Unknown
    })
    .await;

    // Muting a peer with no live connection dials the cached address.
    assert!(user1.mute("user2", Some(Duration::from_secs(60))).await.unwrap());
    let mut second = accept_raw(&listener).await;
    assert_eq!(expect_hello(&mut second).await.sender, "user1");
    wait_ready(&user1, "user2").await;

    user1.shutdown().await;
}

#[tokio::test]
async fn test_unmute_reconnects_from_cache() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let listener = raw_listener(&registry, "user2").await;
    let (user1, _inbox) = start_peer(test_config("user1"), &registry).await;

    user1.discover().await.unwrap();
    let mut first = accept_raw(&listener).await;
    expect_hello(&mut first).await;
    wait_ready(&user1, "user2").await;

    // Muting while connected does not dial again.
    user1.mute("user2", None).await.unwrap();
    drop(first);
    eventually("connection to user2 purged", || async {
        user1.connection_state("user2").await == ConnectionState::Unknown
    })
    .await;

    assert!(user1.unmute("user2").await.unwrap());
    let mut second = accept_raw(&listener).await;
    assert_eq!(expect_hello(&mut second).await.sender, "user1");
    wait_ready(&user1, "user2").await;

    user1.shutdown().await;
}

#[tokio::test]
async fn test_oversized_message_keeps_connection() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;
    let (user2, _inbox2) = start_peer(test_config("user2"), &registry).await;

    user2.discover().await.unwrap();
    wait_ready(&user2, "user1").await;

    let huge = "x".repeat(2 * 1024 * 1024);
    assert!(matches!(
        user2.send("user1", &huge).await,
        Err(P2pError::FrameTooLarge { .. })
    ));
    assert_eq!(user2.connection_state("user1").await, ConnectionState::Ready);

    assert_eq!(user2.send("user1", "hello").await.unwrap(), SendOutcome::Sent);
    let message = next_message(&mut inbox1).await;
    assert_eq!(message.text, "hello");

    user1.shutdown().await;
    user2.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_unknown_peer() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, _inbox) = start_peer(test_config("user1"), &registry).await;

    // Never discovered: the moderation change succeeds, the reconnect does not.
    assert!(user1.mute("ghost", None).await.unwrap());
    assert!(matches!(
        user1.reconnect_peer("ghost").await,
        Err(P2pError::UnknownPeer(_))
    ));

    user1.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_peer_returns_to_unknown() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, _inbox) = start_peer(test_config("user1"), &registry).await;

    // Bind and drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    registry
        .register("user9", &PeerAddress::new("127.0.0.1", port))
        .await
        .unwrap();

    let report = user1.discover().await.unwrap();
    assert_eq!(report.failed, vec!["user9".to_string()]);
    assert_eq!(user1.connection_state("user9").await, ConnectionState::Unknown);

    user1.shutdown().await;
}

// ============================================================================
// Test 6: Robustness
// ============================================================================

#[tokio::test]
async fn test_bad_frames_keep_connection_open() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;

    let key = SymmetricKey::generate();
    let mut raw = dial_raw(&user1, "user2", Some(key.clone())).await;
    wait_ready(&user1, "user2").await;

    // No separator.
    let no_colon = crypto::encrypt(&key, b"no separator").unwrap();
    raw.send(Frame::Message(Bytes::from(no_colon))).await.unwrap();

    // Wrong key.
    let wrong = seal(Some(&SymmetricKey::generate()), &ChatMessage::new("user2", "x")).unwrap();
    raw.send(Frame::Message(wrong)).await.unwrap();

    assert_no_message(&mut inbox1).await;
    assert_eq!(user1.connection_state("user2").await, ConnectionState::Ready);

    let good = seal(Some(&key), &ChatMessage::new("user2", "after noise")).unwrap();
    raw.send(Frame::Message(good)).await.unwrap();
    assert_eq!(next_message(&mut inbox1).await.text, "after noise");

    user1.shutdown().await;
}

#[tokio::test]
async fn test_message_before_key_closes_connection() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1").with_encryption(false), &registry).await;

    let stream = TcpStream::connect(user1.local_addr()).await.unwrap();
    let mut raw = Framed::new(stream, FrameCodec::new());
    raw.send(Frame::Message(Bytes::from_static(b"user2:too early")))
        .await
        .unwrap();

    let closed = timeout(WAIT, raw.next()).await.unwrap();
    assert!(!matches!(closed, Some(Ok(_))));
    assert_no_message(&mut inbox1).await;

    user1.shutdown().await;
}

#[tokio::test]
async fn test_spoofed_sender_prefix_is_checked_against_connection() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user3, mut inbox3) = start_peer(test_config("user3"), &registry).await;
    user3.block("user4").await.unwrap();

    let key = SymmetricKey::generate();
    let mut raw = dial_raw(&user3, "user4", Some(key.clone())).await;
    wait_ready(&user3, "user4").await;

    let spoofed = seal(Some(&key), &ChatMessage::new("user5", "trust me")).unwrap();
    raw.send(Frame::Message(spoofed)).await.unwrap();
    assert_no_message(&mut inbox3).await;

    user3.shutdown().await;
}

// ============================================================================
// Test 7: Simultaneous dial
// ============================================================================

#[tokio::test]
async fn test_simultaneous_dial_converges() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, mut inbox1) = start_peer(test_config("user1"), &registry).await;
    let (user2, mut inbox2) = start_peer(test_config("user2"), &registry).await;

    let (r1, r2) = tokio::join!(user1.discover(), user2.discover());
    r1.unwrap();
    r2.unwrap();

    eventually("both sides agree on one connection", || async {
        let a = user1.connections().await;
        let b = user2.connections().await;
        a.len() == 1 && b.len() == 1 && a[0].direction != b[0].direction
    })
    .await;

    // Let any replaced socket finish closing before traffic.
    sleep(Duration::from_millis(200)).await;

    user1.send("user2", "from user1").await.unwrap();
    user2.send("user1", "from user2").await.unwrap();
    assert_eq!(next_message(&mut inbox2).await.text, "from user1");
    assert_eq!(next_message(&mut inbox1).await.text, "from user2");

    user1.shutdown().await;
    user2.shutdown().await;
}

// ============================================================================
// Test 8: Liveness and background loops
// ============================================================================

#[tokio::test]
async fn test_keep_alive_keeps_peer_discoverable() {
    let (_shared, registry) = local_registry(Duration::from_millis(400));
    let config = test_config("user1").with_keep_alive_interval(Duration::from_millis(100));
    let (user1, _inbox) = start_peer(config, &registry).await;

    // A second registration that never refreshes.
    registry
        .register("silent", &PeerAddress::new("127.0.0.1", 6999))
        .await
        .unwrap();

    sleep(Duration::from_millis(1000)).await;
    let live = registry.discover().await.unwrap();
    assert!(live.contains_key("user1"));
    assert!(!live.contains_key("silent"));

    user1.shutdown().await;
}

#[tokio::test]
async fn test_discovery_loop_connects_late_peer() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let config = test_config("user1").with_discovery_interval(Some(Duration::from_millis(100)));
    let (user1, _inbox1) = start_peer(config, &registry).await;
    let (user2, _inbox2) = start_peer(test_config("user2"), &registry).await;

    wait_ready(&user1, "user2").await;
    wait_ready(&user2, "user1").await;
    assert!(user1.known_peers().await.contains_key("user2"));

    user1.shutdown().await;
    user2.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_remote_side() {
    let (_shared, registry) = local_registry(Duration::from_secs(30));
    let (user1, _inbox1) = start_peer(test_config("user1"), &registry).await;
    let (user2, _inbox2) = start_peer(test_config("user2"), &registry).await;

    user2.discover().await.unwrap();
    wait_ready(&user1, "user2").await;

    user1.shutdown().await;
    assert!(user1.connections().await.is_empty());

    eventually("user2 notices the close", || async {
        user2.connection_state("user1").await == ConnectionState::Unknown
    })
    .await;
    assert!(matches!(
        user2.send("user1", "anyone?").await,
        Err(P2pError::NotConnected(_))
    ));

    user2.shutdown().await;
}

// ============================================================================
// Test 9: End-to-end over HTTP
// ============================================================================

#[tokio::test]
async fn test_http_registry_end_to_end() {
    let server = start_registry_server(RegistryConfig::new("127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap();

    let http = |id: &str| {
        let registry: Arc<dyn RegistryRpc> =
            Arc::new(HttpRegistry::new(server.url(), Duration::from_secs(5)).unwrap());
        (test_config(id).with_registry_url(server.url()), registry)
    };

    let (config1, registry1) = http("user1");
    let (config2, registry2) = http("user2");
    let (user1, mut inbox1) = start_peer(config1, &registry1).await;
    let (user2, _inbox2) = start_peer(config2, &registry2).await;

    let report = user2.discover().await.unwrap();
    assert_eq!(
        report.peers.get("user1"),
        Some(&PeerAddress::new("127.0.0.1", user1.local_addr().port()))
    );
    wait_ready(&user1, "user2").await;

    user2.send("user1", "Hello from user2!").await.unwrap();
    assert_eq!(
        next_message(&mut inbox1).await,
        ChatMessage::new("user2", "Hello from user2!")
    );

    user1.block("user2").await.unwrap();
    user1.mute("user3", None).await.unwrap();
    assert_eq!(registry1.blocked("user1").await.unwrap(), vec!["user2".to_string()]);
    assert_eq!(registry1.muted("user1").await.unwrap().get("user3"), Some(&None));

    user1.unblock("user2").await.unwrap();
    assert!(registry1.blocked("user1").await.unwrap().is_empty());

    user1.shutdown().await;
    user2.shutdown().await;
    server.stop().await;
}
