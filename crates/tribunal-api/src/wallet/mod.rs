//! Wallet providers
//!
//! A wallet is the only source of user identity. Providers hand out account
//! addresses and push account changes through an [`AccountSubscription`].

mod fixed;
mod rpc;

pub use fixed::StaticWallet;
pub use rpc::JsonRpcWallet;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::mpsc;

use crate::error::Result;

static ADDRESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

/// Source of wallet accounts
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet to expose its accounts, prompting the user if needed
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Accounts already exposed, without prompting
    async fn list_accounts(&self) -> Result<Vec<String>>;

    /// Start receiving account-list changes
    fn watch(&self) -> AccountSubscription;
}

type Release = Box<dyn FnOnce() + Send>;

/// Live registration for account changes.
///
/// Each item is the wallet's new account list; an empty list means the wallet
/// disconnected. Dropping the subscription unregisters it from the provider.
pub struct AccountSubscription {
    rx: mpsc::UnboundedReceiver<Vec<String>>,
    release: Option<Release>,
}

impl AccountSubscription {
    /// Wrap a receiver and the callback that unregisters it
    pub fn new(
        rx: mpsc::UnboundedReceiver<Vec<String>>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next change. None once the provider has gone away.
    pub async fn next(&mut self) -> Option<Vec<String>> {
        self.rx.recv().await
    }

    /// Take a change if one is already queued
    pub fn try_next(&mut self) -> Option<Vec<String>> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving changes
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        self.rx.close();
    }
}

impl Drop for AccountSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for AccountSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSubscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Compare two addresses ignoring hex case
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Shorten an address for display: `0x1234...abcd`
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Whether `address` looks like a 20-byte hex account address
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address)
}
