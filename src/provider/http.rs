//! HttpProvider - JSON-RPC over HTTP to a development node
//!
//! A node has no consent prompt, so `eth_requestAccounts` is answered with
//! the node's unlocked accounts.

use super::{methods, Provider, ProviderHost, WalletProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct HttpProvider {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Transport(format!("http client: {e}")))?;
        Ok(Self { url: url.into(), client, next_id: AtomicU64::new(1) })
    }

    pub fn url(&self) -> &str { &self.url }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let method = if method == methods::REQUEST_ACCOUNTS { methods::ACCOUNTS } else { method };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        tracing::debug!(%method, id, "rpc request");

        let reply: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(err) = reply.get("error") {
            let code = err["code"].as_i64().unwrap_or(-32603);
            let message = err["message"].as_str().unwrap_or("unknown error");
            return Err(ProviderError::rpc(code, message));
        }
        reply
            .get("result")
            .cloned()
            .ok_or_else(|| ProviderError::Malformed(format!("no result for {method}")))
    }

    fn name(&self) -> &str { "http" }
}

/// Host backed by an optional RPC URL; no URL means no provider.
#[derive(Debug, Clone, Default)]
pub struct HttpHost {
    url: Option<String>,
}

impl HttpHost {
    pub fn new(url: Option<String>) -> Self { Self { url } }
}

impl ProviderHost for HttpHost {
    fn detect(&self) -> Option<Provider> {
        let url = self.url.as_deref()?;
        match HttpProvider::new(url) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                tracing::warn!("rpc provider unavailable: {}", e);
                None
            }
        }
    }
}
