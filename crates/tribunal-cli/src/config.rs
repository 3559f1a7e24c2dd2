//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for tribunal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Arbitration stream endpoint
    pub endpoint: Option<String>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Color theme (dark, light)
    pub theme: Option<String>,
    /// What requests carry: "sample" or "case"
    pub context: Option<String>,
    /// Policy id used in case mode
    pub policy: Option<String>,
    /// JSON file replacing the built-in policies
    pub policies_file: Option<String>,
    /// JSON file replacing the built-in evidence
    pub evidence_file: Option<String>,
    #[serde(default)]
    pub wallet: WalletConfig,
}

/// Wallet provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Ethereum JSON-RPC node exposing the user's accounts
    pub rpc_url: Option<String>,
    /// How often to check the node for account changes
    pub poll_interval_ms: Option<u64>,
    /// Fixed accounts, used when no node is configured
    pub accounts: Vec<String>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tribunal")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TRIBUNAL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            endpoint: Some(tribunal_api::client::DEFAULT_ENDPOINT.to_string()),
            tui: Some(true),
            theme: Some("dark".to_string()),
            context: Some("sample".to_string()),
            ..Config::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Whether requests should carry the selected policy and evidence on file
    pub fn uses_case_context(&self) -> bool {
        self.context
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("case"))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# tribunal configuration file
# Place at ~/.config/tribunal/config.toml or point TRIBUNAL_CONFIG_PATH at it

# Arbitration stream endpoint
endpoint = "http://localhost:8000/arbitrate/stream"

# Whether to use TUI mode by default (true by default)
tui = true

# Color theme (dark, light)
theme = "dark"

# What each request carries:
#   "sample" - the built-in data-security dispute
#   "case"   - the policy below plus the evidence on file
context = "sample"
# policy = "1"

# Replace the built-in policies or evidence with JSON files (optional)
# policies_file = "~/.config/tribunal/policies.json"
# evidence_file = "~/.config/tribunal/evidence.json"

[wallet]
# Ethereum JSON-RPC node that exposes your accounts
# rpc_url = "http://localhost:8545"
# poll_interval_ms = 2000

# Or a fixed account, used when no node is configured
# accounts = ["0x52908400098527886E0F7030069857D2E4169EE7"]
"#
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(
            config.endpoint.as_deref(),
            Some("http://localhost:8000/arbitrate/stream")
        );
        assert_eq!(config.tui, Some(true));
        assert!(!config.uses_case_context());
        assert!(config.wallet.rpc_url.is_none());
        assert!(config.wallet.accounts.is_empty());
    }

    #[test]
    fn test_wallet_table() {
        let config = Config::parse(
            r#"
context = "Case"
policy = "3"

[wallet]
rpc_url = "http://localhost:8545"
poll_interval_ms = 500
"#,
        )
        .unwrap();
        assert!(config.uses_case_context());
        assert_eq!(config.policy.as_deref(), Some("3"));
        assert_eq!(config.wallet.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.wallet.poll_interval_ms, Some(500));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse("").unwrap();
        assert!(config.endpoint.is_none());
        assert!(config.theme.is_none());
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/tmp/p.json"), PathBuf::from("/tmp/p.json"));
        assert!(!expand_path("~/p.json").starts_with("~"));
    }
}
