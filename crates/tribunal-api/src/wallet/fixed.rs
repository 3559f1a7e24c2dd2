//! Wallet serving a fixed account list

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{AccountSubscription, WalletProvider};
use crate::error::Result;

/// In-process wallet whose accounts are set by the caller.
///
/// Used for offline runs (accounts from config) and to script account
/// switches in tests.
#[derive(Clone, Default)]
pub struct StaticWallet {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    accounts: Vec<String>,
    listeners: HashMap<u64, mpsc::UnboundedSender<Vec<String>>>,
    next_listener: u64,
}

impl StaticWallet {
    pub fn new(accounts: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                accounts,
                ..Default::default()
            })),
        }
    }

    /// Replace the account list and notify every watcher
    pub fn set_accounts(&self, accounts: Vec<String>) {
        let mut inner = self.inner.lock();
        inner.accounts = accounts.clone();
        inner
            .listeners
            .retain(|_, tx| tx.send(accounts.clone()).is_ok());
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

#[async_trait]
impl WalletProvider for StaticWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().accounts.clone())
    }

    async fn list_accounts(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().accounts.clone())
    }

    fn watch(&self) -> AccountSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner.listeners.insert(id, tx);
            id
        };

        let inner = Arc::downgrade(&self.inner);
        AccountSubscription::new(rx, move || {
            if let Some(inner) = inner.upgrade() {
                inner.lock().listeners.remove(&id);
            }
        })
    }
}

impl std::fmt::Debug for StaticWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StaticWallet")
            .field("accounts", &inner.accounts)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watchers_see_switches() {
        let wallet = StaticWallet::new(vec!["0xaaa".into()]);
        let mut first = wallet.watch();
        let mut second = wallet.watch();
        assert_eq!(wallet.listener_count(), 2);

        wallet.set_accounts(vec!["0xbbb".into()]);
        assert_eq!(first.next().await, Some(vec!["0xbbb".to_string()]));
        assert_eq!(second.next().await, Some(vec!["0xbbb".to_string()]));
        assert_eq!(wallet.list_accounts().await.unwrap(), vec!["0xbbb".to_string()]);
    }

    #[test]
    fn test_drop_unregisters() {
        let wallet = StaticWallet::default();
        let sub = wallet.watch();
        assert_eq!(wallet.listener_count(), 1);
        drop(sub);
        assert_eq!(wallet.listener_count(), 0);

        // Notifying with no watchers is fine
        wallet.set_accounts(vec![]);
    }
}
