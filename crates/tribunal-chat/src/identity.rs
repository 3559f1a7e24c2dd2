//! Wallet-backed identity session
//!
//! A [`Session`] holds the connected account, persists it so the next start
//! can restore it, and follows account switches made in the wallet.

use std::sync::Arc;

use tribunal_api::{
    AccountSubscription, WalletProvider,
    wallet::{same_address, short_address},
};

use crate::{error::Result, store::KeyValueStore};

/// Store key marking a previous connection
pub const CONNECTED_KEY: &str = "wallet_connected";
/// Store key holding the connected address
pub const ADDRESS_KEY: &str = "wallet_address";

/// The connected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub address: String,
}

impl User {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// `0x1234...abcd`
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

/// Effect of an account-list change on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountChange {
    Unchanged,
    Switched(User),
    Disconnected,
}

/// Identity session
pub struct Session {
    wallet: Option<Arc<dyn WalletProvider>>,
    store: Box<dyn KeyValueStore>,
    user: Option<User>,
    is_loading: bool,
    error: Option<String>,
    subscription: Option<AccountSubscription>,
}

impl Session {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            wallet,
            store,
            user: None,
            is_loading: false,
            error: None,
            subscription: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Last connection failure, until dismissed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Whether account changes are being followed
    pub fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    /// Ask the wallet for an account and remember it
    pub async fn connect(&mut self) -> Result<User> {
        self.is_loading = true;
        self.error = None;
        let result = self.request_first_account().await;
        self.is_loading = false;

        let address = match result {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(error = %e, "wallet connection failed");
                self.error = Some(e.to_string());
                return Err(e.into());
            }
        };

        self.store.set(CONNECTED_KEY, "true")?;
        self.store.set(ADDRESS_KEY, &address)?;

        let user = User::new(address);
        tracing::debug!(address = %user.short_address(), "wallet connected");
        self.user = Some(user.clone());
        self.watch();
        Ok(user)
    }

    async fn request_first_account(&self) -> tribunal_api::Result<String> {
        let wallet = self.wallet.as_ref().ok_or(tribunal_api::Error::NoWallet)?;
        let accounts = wallet.request_accounts().await?;
        accounts.into_iter().next().ok_or(tribunal_api::Error::NoAccounts)
    }

    /// Forget the account and stop following the wallet
    pub fn disconnect(&mut self) -> Result<()> {
        self.user = None;
        self.error = None;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.clear_keys()
    }

    /// Reinstate the previous session if the wallet still exposes the same
    /// account. Stale state is cleared.
    pub async fn restore(&mut self) -> Result<Option<User>> {
        let connected = self.store.get(CONNECTED_KEY).is_some();
        let saved = self.store.get(ADDRESS_KEY);

        let (Some(saved), true, Some(wallet)) = (saved, connected, self.wallet.clone()) else {
            return Ok(None);
        };

        let accounts = match wallet.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!(error = %e, "could not check saved wallet session");
                self.clear_keys()?;
                return Ok(None);
            }
        };

        match accounts.first() {
            Some(first) if same_address(first, &saved) => {
                let user = User::new(saved);
                tracing::debug!(address = %user.short_address(), "restored wallet session");
                self.user = Some(user.clone());
                self.watch();
                Ok(Some(user))
            }
            _ => {
                tracing::warn!("saved wallet session is stale, clearing it");
                self.clear_keys()?;
                Ok(None)
            }
        }
    }

    /// React to a new account list from the wallet
    pub fn apply_accounts(&mut self, accounts: &[String]) -> AccountChange {
        let Some(first) = accounts.first() else {
            let was_connected = self.user.is_some();
            if let Err(e) = self.disconnect() {
                tracing::warn!(error = %e, "failed to clear session state");
            }
            return if was_connected {
                AccountChange::Disconnected
            } else {
                AccountChange::Unchanged
            };
        };

        let switched = matches!(&self.user, Some(user) if !same_address(&user.address, first));
        if !switched {
            return AccountChange::Unchanged;
        }

        let user = User::new(first.clone());
        if let Err(e) = self.store.set(ADDRESS_KEY, &user.address) {
            tracing::warn!(error = %e, "failed to persist switched account");
        }
        tracing::debug!(address = %user.short_address(), "wallet account switched");
        self.user = Some(user.clone());
        AccountChange::Switched(user)
    }

    /// Wait for the next change that affects the session.
    ///
    /// Never resolves while nothing is being watched.
    pub async fn next_account_change(&mut self) -> AccountChange {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return std::future::pending().await;
            };
            match subscription.next().await {
                Some(accounts) => {
                    let change = self.apply_accounts(&accounts);
                    if change != AccountChange::Unchanged {
                        return change;
                    }
                }
                None => self.subscription = None,
            }
        }
    }

    /// Apply every change already queued, without waiting
    pub fn poll_account_changes(&mut self) -> Vec<AccountChange> {
        let mut changes = Vec::new();
        while let Some(accounts) = self.subscription.as_mut().and_then(|s| s.try_next()) {
            let change = self.apply_accounts(&accounts);
            if change != AccountChange::Unchanged {
                changes.push(change);
            }
        }
        changes
    }

    fn watch(&mut self) {
        if self.subscription.is_none() {
            self.subscription = self.wallet.as_ref().map(|w| w.watch());
        }
    }

    fn clear_keys(&mut self) -> Result<()> {
        self.store.remove(CONNECTED_KEY)?;
        self.store.remove(ADDRESS_KEY)?;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("is_loading", &self.is_loading)
            .field("error", &self.error)
            .field("watching", &self.subscription.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, store::MemoryStore};
    use tribunal_api::StaticWallet;

    const ALICE: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const BOB: &str = "0x8617E340B3D01FA5F11F306F4090FD50E238070D";

    fn session_with(wallet: &StaticWallet, store: MemoryStore) -> Session {
        Session::new(Some(Arc::new(wallet.clone())), Box::new(store))
    }

    fn saved(address: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(CONNECTED_KEY, "true").unwrap();
        store.set(ADDRESS_KEY, address).unwrap();
        store
    }

    #[tokio::test]
    async fn test_connect_persists_first_account() {
        let wallet = StaticWallet::new(vec![ALICE.into(), BOB.into()]);
        let mut session = session_with(&wallet, MemoryStore::new());

        let user = session.connect().await.unwrap();
        assert_eq!(user.address, ALICE);
        assert_eq!(user.short_address(), "0x5290...9EE7");
        assert!(session.is_watching());
        assert!(!session.is_loading());
        assert_eq!(session.store.get(CONNECTED_KEY).as_deref(), Some("true"));
        assert_eq!(session.store.get(ADDRESS_KEY).as_deref(), Some(ALICE));
    }

    #[tokio::test]
    async fn test_connect_without_accounts() {
        let wallet = StaticWallet::new(vec![]);
        let mut session = session_with(&wallet, MemoryStore::new());

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::Api(tribunal_api::Error::NoAccounts)));
        assert_eq!(
            session.error(),
            Some("No accounts found. Please make sure the wallet is unlocked.")
        );
        assert!(!session.is_connected());
        session.dismiss_error();
        assert_eq!(session.error(), None);
    }

    #[tokio::test]
    async fn test_connect_without_wallet() {
        let mut session = Session::new(None, Box::new(MemoryStore::new()));
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::Api(tribunal_api::Error::NoWallet)));
        assert!(session.error().is_some());
    }

    #[tokio::test]
    async fn test_restore_matches_case_insensitively() {
        let wallet = StaticWallet::new(vec![ALICE.to_lowercase()]);
        let mut session = session_with(&wallet, saved(ALICE));

        let user = session.restore().await.unwrap().unwrap();
        assert_eq!(user.address, ALICE);
        assert!(session.is_connected());
        assert_eq!(wallet.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_restore_clears_stale_keys() {
        let wallet = StaticWallet::new(vec![BOB.into()]);
        let mut session = session_with(&wallet, saved(ALICE));

        assert_eq!(session.restore().await.unwrap(), None);
        assert!(!session.is_connected());
        assert_eq!(session.store.get(CONNECTED_KEY), None);
        assert_eq!(session.store.get(ADDRESS_KEY), None);
        assert_eq!(wallet.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_needs_both_keys() {
        let wallet = StaticWallet::new(vec![ALICE.into()]);
        let mut store = MemoryStore::new();
        store.set(ADDRESS_KEY, ALICE).unwrap();
        let mut session = session_with(&wallet, store);

        assert_eq!(session.restore().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_account_switch_replaces_user() {
        let wallet = StaticWallet::new(vec![ALICE.into()]);
        let mut session = session_with(&wallet, MemoryStore::new());
        session.connect().await.unwrap();

        wallet.set_accounts(vec![BOB.into()]);
        let change = session.next_account_change().await;
        assert_eq!(change, AccountChange::Switched(User::new(BOB)));
        assert_eq!(session.user().unwrap().address, BOB);
        assert_eq!(session.store.get(ADDRESS_KEY).as_deref(), Some(BOB));
    }

    #[tokio::test]
    async fn test_same_account_in_other_case_is_unchanged() {
        let wallet = StaticWallet::new(vec![ALICE.into()]);
        let mut session = session_with(&wallet, MemoryStore::new());
        session.connect().await.unwrap();

        wallet.set_accounts(vec![ALICE.to_lowercase()]);
        assert!(session.poll_account_changes().is_empty());
        assert_eq!(session.user().unwrap().address, ALICE);
    }

    #[tokio::test]
    async fn test_empty_account_list_disconnects() {
        let wallet = StaticWallet::new(vec![ALICE.into()]);
        let mut session = session_with(&wallet, MemoryStore::new());
        session.connect().await.unwrap();

        wallet.set_accounts(vec![]);
        assert_eq!(session.poll_account_changes(), vec![AccountChange::Disconnected]);
        assert!(!session.is_connected());
        assert_eq!(session.store.get(ADDRESS_KEY), None);
        assert_eq!(wallet.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_releases_listener() {
        let wallet = StaticWallet::new(vec![ALICE.into()]);
        let mut session = session_with(&wallet, MemoryStore::new());
        session.connect().await.unwrap();
        assert_eq!(wallet.listener_count(), 1);

        session.disconnect().unwrap();
        assert_eq!(wallet.listener_count(), 0);
        assert!(!session.is_watching());
        assert_eq!(session.store.get(CONNECTED_KEY), None);
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let wallet = StaticWallet::new(vec![ALICE.into()]);
        {
            let mut session = session_with(&wallet, MemoryStore::new());
            session.connect().await.unwrap();
            assert_eq!(wallet.listener_count(), 1);
        }
        assert_eq!(wallet.listener_count(), 0);
    }
}
