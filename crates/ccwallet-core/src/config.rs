use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::composed_tx::FeePolicy;
use crate::error::Result;
use crate::network::Network;
use crate::storage::{DEFAULT_KEY_PREFIX, Storage};

const CONFIG: &str = "config";
const FEE_POLICY: &str = "feePolicy";

/// Options a [`Wallet`](crate::Wallet) is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletOptions {
    pub network: Network,
    pub account: u32,
    /// Prefix applied to every storage key the wallet writes.
    pub key_prefix: String,
    /// Used until a fee policy has been persisted.
    pub fee_policy: FeePolicy,
}

impl WalletOptions {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            account: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            fee_policy: FeePolicy::default(),
        }
    }

    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }
}

impl Default for WalletOptions {
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}

/// Persisted wallet settings: one JSON object of named values.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    storage: Storage,
}

impl ConfigStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let values = self.values()?;
        values
            .get(name)
            .map(|v| serde_json::from_value(v.clone()).map_err(Into::into))
            .transpose()
    }

    pub fn set<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.storage
            .update(CONFIG, |values: &mut BTreeMap<String, serde_json::Value>| {
                values.insert(name.to_string(), value);
                Ok(())
            })
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.storage
            .update(CONFIG, |values: &mut BTreeMap<String, serde_json::Value>| {
                values.remove(name);
                Ok(())
            })
    }

    pub fn fee_policy(&self) -> Result<Option<FeePolicy>> {
        self.get(FEE_POLICY)
    }

    pub fn set_fee_policy(&self, policy: &FeePolicy) -> Result<()> {
        self.set(FEE_POLICY, policy)
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(CONFIG)
    }

    fn values(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        Ok(self.storage.load(CONFIG)?.unwrap_or_default())
    }
}
