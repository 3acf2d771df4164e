use std::fs;
use std::path::{Path, PathBuf};

use ccwallet_core::{FeePolicy, Network, WalletOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "wallet_config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings kept next to the wallet data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    pub network: Network,
    /// Overrides the network's default Electrum server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrum_url: Option<String>,
    #[serde(default)]
    pub account: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_per_kb: Option<u64>,
}

impl WalletConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            electrum_url: None,
            account: 0,
            fee_per_kb: None,
        }
    }

    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// `None` when no config has been saved yet.
    pub fn load(data_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(data_dir)?;
        fs::write(Self::path(data_dir), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn electrum_url(&self) -> &str {
        self.electrum_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_electrum_url())
    }

    pub fn wallet_options(&self) -> WalletOptions {
        let mut options = WalletOptions::new(self.network);
        options.account = self.account;
        if let Some(fee_per_kb) = self.fee_per_kb {
            options.fee_policy = FeePolicy::new(fee_per_kb);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WalletConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut config = WalletConfig::new(Network::Regtest);
        config.electrum_url = Some("tcp://127.0.0.1:60401".into());
        config.fee_per_kb = Some(2_000);
        config.save(&nested).unwrap();
        assert_eq!(WalletConfig::load(&nested).unwrap(), Some(config));
    }

    #[test]
    fn file_uses_camel_case() {
        let mut config = WalletConfig::new(Network::Testnet);
        config.fee_per_kb = Some(5);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"network":"testnet","account":0,"feePerKb":5}"#);
    }

    #[test]
    fn electrum_url_falls_back_to_network_default() {
        let config = WalletConfig::new(Network::Mainnet);
        assert_eq!(config.electrum_url(), Network::Mainnet.default_electrum_url());
    }

    #[test]
    fn options_follow_config() {
        let mut config = WalletConfig::new(Network::Testnet);
        config.account = 2;
        assert_eq!(config.wallet_options().fee_policy, FeePolicy::default());
        config.fee_per_kb = Some(1);
        let options = config.wallet_options();
        assert_eq!(options.account, 2);
        assert_eq!(options.fee_policy, FeePolicy::new(1));
        assert_eq!(options.network, Network::Testnet);
    }
}
