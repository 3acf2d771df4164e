use ccwallet_core::bitcoin::address::NetworkUnchecked;
use ccwallet_core::bitcoin::{self, OutPoint, Transaction, Txid};
use ccwallet_core::color::UNCOLORED_COLOR_ID;
use ccwallet_core::{Blockchain, Coin, CoinList, CoinQuery, CoinRequest, Network};
use electrum_client::ElectrumApi;
use thiserror::Error;

use crate::config::WalletConfig;

#[derive(Debug, Error)]
pub enum ChainAdapterError {
    #[error("electrum error: {0}")]
    Electrum(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Electrum-backed broadcast plus an uncolored coin query.
///
/// Every call opens a fresh client on a blocking task.
#[derive(Debug, Clone)]
pub struct ElectrumBlockchain {
    electrum_url: String,
    network: Network,
}

impl ElectrumBlockchain {
    pub fn new(electrum_url: &str, network: Network) -> Self {
        Self {
            electrum_url: electrum_url.to_string(),
            network,
        }
    }

    /// Adapter for the configured network, using the configured server or
    /// the network default.
    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(config.electrum_url(), config.network)
    }

    pub fn electrum_url(&self) -> &str {
        &self.electrum_url
    }

    fn client(url: &str) -> Result<electrum_client::Client, ChainAdapterError> {
        electrum_client::Client::new(url).map_err(|e| ChainAdapterError::Electrum(e.to_string()))
    }

    fn list_unspent(
        url: &str,
        network: Network,
        addresses: &[String],
    ) -> Result<Vec<Coin>, ChainAdapterError> {
        let client = Self::client(url)?;
        let mut coins = Vec::new();
        for address in addresses {
            let script = address
                .parse::<bitcoin::Address<NetworkUnchecked>>()
                .map_err(|e| ChainAdapterError::Parse(e.to_string()))?
                .require_network(network.into_bitcoin())
                .map_err(|e| ChainAdapterError::Parse(e.to_string()))?
                .script_pubkey();
            let unspent = client
                .script_list_unspent(&script)
                .map_err(|e| ChainAdapterError::Electrum(e.to_string()))?;
            for entry in unspent {
                let vout = u32::try_from(entry.tx_pos)
                    .map_err(|_| ChainAdapterError::Parse("tx_pos out of range".into()))?;
                // Electrum reports height 0 (or negative) for mempool entries.
                let height = u32::try_from(entry.height).ok().filter(|h| *h > 0);
                coins.push(Coin {
                    outpoint: OutPoint::new(entry.tx_hash, vout),
                    value: entry.value,
                    color_id: UNCOLORED_COLOR_ID,
                    address: address.clone(),
                    height,
                });
            }
        }
        Ok(coins)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ChainAdapterError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ChainAdapterError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChainAdapterError::Task(e.to_string()))?
}

impl Blockchain for ElectrumBlockchain {
    type Error = ChainAdapterError;

    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, ChainAdapterError> {
        let url = self.electrum_url.clone();
        let tx = tx.clone();
        let txid = blocking(move || {
            Self::client(&url)?
                .transaction_broadcast(&tx)
                .map_err(|e| ChainAdapterError::Electrum(e.to_string()))
        })
        .await?;
        log::info!("electrum accepted {}", txid);
        Ok(txid)
    }
}

/// Lists plain bitcoin outputs. Requests for colored coins yield nothing,
/// since telling colors apart needs the color kernel.
impl CoinQuery for ElectrumBlockchain {
    type Error = ChainAdapterError;

    async fn get_coins(&self, request: &CoinRequest) -> Result<CoinList, ChainAdapterError> {
        if !request.color_ids.contains(&UNCOLORED_COLOR_ID) {
            log::debug!("electrum query skipped for colors {:?}", request.color_ids);
            return Ok(CoinList::default());
        }
        let url = self.electrum_url.clone();
        let network = self.network;
        let addresses = request.addresses.clone();
        let coins = blocking(move || Self::list_unspent(&url, network, &addresses)).await?;
        Ok(CoinList::new(coins).scoped(request.scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccwallet_core::BalanceScope;

    #[tokio::test]
    async fn colored_requests_skip_the_network() {
        // The URL is never dialed for a colored-only request.
        let chain = ElectrumBlockchain::new("tcp://127.0.0.1:1", Network::Regtest);
        let request = CoinRequest {
            addresses: vec!["bcrt1qinvalid".into()],
            color_ids: vec![3],
            scope: BalanceScope::Total,
        };
        assert!(chain.get_coins(&request).await.unwrap().is_empty());
    }

    #[test]
    fn from_config_uses_override_or_default() {
        let mut config = WalletConfig::new(Network::Testnet);
        let chain = ElectrumBlockchain::from_config(&config);
        assert_eq!(chain.electrum_url(), Network::Testnet.default_electrum_url());

        config.electrum_url = Some("tcp://127.0.0.1:50001".into());
        let chain = ElectrumBlockchain::from_config(&config);
        assert_eq!(chain.electrum_url(), "tcp://127.0.0.1:50001");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_electrum_error() {
        let chain = ElectrumBlockchain::new("tcp://127.0.0.1:1", Network::Regtest);
        let tx = Transaction {
            version: bitcoin::transaction::Version::ONE,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: vec![],
            output: vec![],
        };
        assert!(matches!(
            chain.broadcast(&tx).await,
            Err(ChainAdapterError::Electrum(_))
        ));
    }
}
