//! Wallet provider selection

use std::sync::Arc;
use std::time::Duration;

use tribunal_api::{JsonRpcWallet, StaticWallet, WalletProvider, wallet::is_valid_address};

use crate::config::WalletConfig;

/// Build the wallet described by config.
///
/// A JSON-RPC node wins over fixed accounts. None when neither is set.
pub fn from_config(cfg: &WalletConfig) -> Option<Arc<dyn WalletProvider>> {
    if let Some(url) = &cfg.rpc_url {
        let mut wallet = JsonRpcWallet::new(url.clone());
        if let Some(ms) = cfg.poll_interval_ms {
            wallet = wallet.with_poll_interval(Duration::from_millis(ms.max(100)));
        }
        tracing::debug!(url = %url, "using JSON-RPC wallet");
        return Some(Arc::new(wallet));
    }

    let accounts: Vec<String> = cfg
        .accounts
        .iter()
        .filter(|a| {
            let valid = is_valid_address(a);
            if !valid {
                tracing::warn!(account = %a, "ignoring malformed account in config");
            }
            valid
        })
        .cloned()
        .collect();

    if accounts.is_empty() {
        return None;
    }
    Some(Arc::new(StaticWallet::new(accounts)))
}
