//! Registry client over HTTP.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parley_registry::api::{
    BlockRequest, BlockedResponse, DiscoverResponse, ErrorResponse, KeepAliveRequest,
    MuteRequest, MutedResponse, RegisterRequest, UnmuteRequest,
};
use parley_registry::PeerAddress;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::discovery::RegistryRpc;
use crate::error::{P2pError, P2pResult};

/// Registry reached with JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: String,
}

impl HttpRegistry {
    /// Create a client for the registry at `base_url` (e.g. `http://127.0.0.1:5000`).
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> P2pResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Registry base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> P2pResult<()> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> P2pResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-success status into a registry error carrying the `{error}` body.
async fn check(response: Response) -> P2pResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => "no error body".to_string(),
    };
    Err(P2pError::Registry(format!("{}: {}", status, detail)))
}

#[async_trait]
impl RegistryRpc for HttpRegistry {
    async fn register(&self, user_id: &str, address: &PeerAddress) -> P2pResult<()> {
        self.post(
            "/register",
            &RegisterRequest {
                user_id: user_id.to_string(),
                ip: address.ip.clone(),
                port: address.port,
            },
        )
        .await
    }

    async fn keep_alive(&self, user_id: &str) -> P2pResult<()> {
        self.post(
            "/keep_alive",
            &KeepAliveRequest {
                user_id: user_id.to_string(),
            },
        )
        .await
    }

    async fn discover(&self) -> P2pResult<BTreeMap<String, PeerAddress>> {
        let live: DiscoverResponse = self.get("/discover").await?;
        Ok(live
            .into_iter()
            .map(|(id, peer)| (id, peer.address()))
            .collect())
    }

    async fn block(&self, user_id: &str, target_id: &str) -> P2pResult<()> {
        self.post("/block", &block_request(user_id, target_id)).await
    }

    async fn unblock(&self, user_id: &str, target_id: &str) -> P2pResult<()> {
        self.post("/unblock", &block_request(user_id, target_id)).await
    }

    async fn mute(&self, user_id: &str, target_id: &str, duration: Option<Duration>) -> P2pResult<()> {
        self.post(
            "/mute",
            &MuteRequest {
                user_id: user_id.to_string(),
                mute_id: target_id.to_string(),
                duration: Some(duration.map(|d| d.as_secs_f64())),
            },
        )
        .await
    }

    async fn unmute(&self, user_id: &str, target_id: &str) -> P2pResult<()> {
        self.post(
            "/unmute",
            &UnmuteRequest {
                user_id: user_id.to_string(),
                mute_id: target_id.to_string(),
            },
        )
        .await
    }

    async fn blocked(&self, user_id: &str) -> P2pResult<Vec<String>> {
        let ids: BlockedResponse = self.get(&format!("/block/{}", user_id)).await?;
        Ok(ids)
    }

    async fn muted(&self, user_id: &str) -> P2pResult<BTreeMap<String, Option<f64>>> {
        let muted: MutedResponse = self.get(&format!("/mute/{}", user_id)).await?;
        Ok(muted)
    }
}

fn block_request(user_id: &str, target_id: &str) -> BlockRequest {
    BlockRequest {
        user_id: user_id.to_string(),
        block_id: target_id.to_string(),
    }
}
