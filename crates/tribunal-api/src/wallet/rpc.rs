//! Wallet backed by an Ethereum JSON-RPC node

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{AccountSubscription, WalletProvider, is_valid_address};
use crate::error::{Error, Result};

/// Default interval between account polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Wallet reached through `eth_requestAccounts` / `eth_accounts`.
///
/// Nodes have no push channel for account changes, so `watch` polls
/// `eth_accounts` in a background task until the subscription is dropped.
#[derive(Debug, Clone)]
pub struct JsonRpcWallet {
    client: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl JsonRpcWallet {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how often `watch` polls for account changes
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str) -> Result<Vec<String>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": [],
        });

        tracing::debug!(url = %self.url, method, id, "wallet rpc call");
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), text));
        }

        let response: RpcResponse = response.json().await?;
        parse_accounts(response)
    }
}

fn parse_accounts(response: RpcResponse) -> Result<Vec<String>> {
    if let Some(error) = response.error {
        return Err(Error::Wallet(format!("{} (code {})", error.message, error.code)));
    }
    let accounts: Vec<String> = match response.result {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };

    for account in &accounts {
        if !is_valid_address(account) {
            return Err(Error::Wallet(format!("invalid account address '{}'", account)));
        }
    }
    Ok(accounts)
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        match self.call("eth_requestAccounts").await {
            Ok(accounts) => Ok(accounts),
            // Plain nodes do not implement the prompting method
            Err(Error::Wallet(reason)) => {
                tracing::debug!(%reason, "eth_requestAccounts unavailable, using eth_accounts");
                self.call("eth_accounts").await
            }
            Err(e) => Err(e),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<String>> {
        self.call("eth_accounts").await
    }

    fn watch(&self) -> AccountSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let wallet = self.clone();
                let cancel = token.clone();
                handle.spawn(async move { wallet.poll(tx, cancel).await });
            }
            Err(_) => tracing::warn!("no async runtime, account changes will not be watched"),
        }

        AccountSubscription::new(rx, move || token.cancel())
    }
}

impl JsonRpcWallet {
    async fn poll(self, tx: mpsc::UnboundedSender<Vec<String>>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last: Option<Vec<String>> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let accounts = match self.list_accounts().await {
                Ok(accounts) => accounts,
                Err(e) => {
                    tracing::warn!(error = %e, "wallet poll failed");
                    continue;
                }
            };

            // The first sample is always sent; it may already differ from
            // what the session connected with
            if last.as_ref() != Some(&accounts) {
                if tx.send(accounts.clone()).is_err() {
                    break;
                }
                last = Some(accounts);
            }
        }
        tracing::debug!(url = %self.url, "stopped watching wallet accounts");
    }
}
