//! Acceptance tests for the registry HTTP interface.
//!
//! Each test starts a real server on an OS-assigned port and talks to it
//! with reqwest, the same way peers do.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::time::sleep;

use parley_registry::{start_registry_server, RegistryConfig, RegistryServerHandle};

fn test_config() -> RegistryConfig {
    RegistryConfig::new("127.0.0.1:0".parse().unwrap())
}

async fn start(config: RegistryConfig) -> RegistryServerHandle {
    start_registry_server(config).await.expect("registry failed to start")
}

async fn post(client: &Client, url: &str, body: Value) -> (StatusCode, Value) {
    let response = client.post(url).json(&body).send().await.expect("request failed");
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &Client, url: &str) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid JSON")
}

#[tokio::test]
async fn test_register_then_discover() {
    let server = start(test_config()).await;
    let client = Client::new();
    let base = server.url();

    let (status, body) = post(
        &client,
        &format!("{}/register", base),
        json!({"user_id": "user1", "ip": "127.0.0.1", "port": 6001}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered");

    let discovered = get(&client, &format!("{}/discover", base)).await;
    assert_eq!(discovered["user1"]["ip"], "127.0.0.1");
    assert_eq!(discovered["user1"]["port"], 6001);
    assert!(discovered["user1"]["last_seen"].as_f64().unwrap() > 0.0);

    server.stop().await;
}

#[tokio::test]
async fn test_silent_peer_drops_out_of_discovery() {
    let server = start(test_config().with_liveness_window(Duration::from_millis(400))).await;
    let client = Client::new();
    let base = server.url();

    post(
        &client,
        &format!("{}/register", base),
        json!({"user_id": "user1", "ip": "127.0.0.1", "port": 6001}),
    )
    .await;
    post(
        &client,
        &format!("{}/register", base),
        json!({"user_id": "user2", "ip": "127.0.0.1", "port": 6002}),
    )
    .await;

    sleep(Duration::from_millis(250)).await;
    let (status, _) = post(&client, &format!("{}/keep_alive", base), json!({"user_id": "user2"})).await;
    assert_eq!(status, StatusCode::OK);

    sleep(Duration::from_millis(250)).await;
    let discovered = get(&client, &format!("{}/discover", base)).await;
    assert!(discovered.get("user1").is_none());
    assert!(discovered.get("user2").is_some());

    server.stop().await;
}

#[tokio::test]
async fn test_keep_alive_for_unknown_peer_succeeds() {
    let server = start(test_config()).await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        &format!("{}/keep_alive", server.url()),
        json!({"user_id": "nobody"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Keep-alive received");
    assert!(server.registry().read().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_requests_are_rejected() {
    let server = start(test_config()).await;
    let client = Client::new();
    let base = server.url();

    let (status, body) = post(&client, &format!("{}/register", base), json!({"user_id": "user1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid request"));

    let (status, _) = post(
        &client,
        &format!("{}/register", base),
        json!({"user_id": "", "ip": "127.0.0.1", "port": 6001}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/block", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &client,
        &format!("{}/mute", base),
        json!({"user_id": "user3", "mute_id": "user4", "duration": -5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(
        &client,
        &format!("{}/mute", base),
        json!({"user_id": "user3", "mute_id": "user4", "duration": 1e300}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("duration"));

    server.stop().await;
}

#[tokio::test]
async fn test_moderation_replica() {
    let server = start(test_config()).await;
    let client = Client::new();
    let base = server.url();

    let (status, body) = post(
        &client,
        &format!("{}/block", base),
        json!({"user_id": "user3", "block_id": "user4"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User user4 blocked");

    let (_, body) = post(
        &client,
        &format!("{}/mute", base),
        json!({"user_id": "user3", "mute_id": "user4"}),
    )
    .await;
    assert_eq!(body["message"], "User user4 muted for 60 seconds");

    post(
        &client,
        &format!("{}/mute", base),
        json!({"user_id": "user3", "mute_id": "user5", "duration": null}),
    )
    .await;

    let blocked = get(&client, &format!("{}/block/user3", base)).await;
    assert_eq!(blocked, json!(["user4"]));

    let muted = get(&client, &format!("{}/mute/user3", base)).await;
    assert!(muted["user4"].as_f64().is_some());
    assert!(muted["user5"].is_null());
    assert!(muted.as_object().unwrap().contains_key("user5"));

    post(
        &client,
        &format!("{}/unblock", base),
        json!({"user_id": "user3", "block_id": "user4"}),
    )
    .await;
    post(
        &client,
        &format!("{}/unmute", base),
        json!({"user_id": "user3", "mute_id": "user4"}),
    )
    .await;

    assert_eq!(get(&client, &format!("{}/block/user3", base)).await, json!([]));
    let muted = get(&client, &format!("{}/mute/user3", base)).await;
    assert_eq!(muted.as_object().unwrap().len(), 1);

    // Unknown users have empty lists
    assert_eq!(get(&client, &format!("{}/block/nobody", base)).await, json!([]));
    assert_eq!(get(&client, &format!("{}/mute/nobody", base)).await, json!({}));

    server.stop().await;
}
