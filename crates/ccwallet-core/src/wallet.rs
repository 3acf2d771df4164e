//! `Wallet`: ties the address manager, asset registry and collaborators into
//! balance queries and the send pipeline.
//!
//! Every public method takes `&self`; the owned stores share one backend
//! behind a mutex. Async methods never hold that lock across an await.

use std::sync::Arc;

use bitcoin::{PrivateKey, Txid};

use crate::address::{AddressManager, ChainKind};
use crate::asset::{AssetDefinition, AssetDefinitionDesc, AssetTarget, AssetValue};
use crate::asset_manager::AssetDefinitionManager;
use crate::backend::{AssetTx, Backends, Blockchain, CoinQuery, TxComposer, TxSigner};
use crate::coin::{BalanceScope, CoinRequest};
use crate::color::{ColorDataStore, ColorDefinitionStore};
use crate::composed_tx::{ComposedTx, FeePolicy};
use crate::config::{ConfigStore, WalletOptions};
use crate::derivation::{Bip32Derivation, KeyDerivation};
use crate::error::Error;
use crate::keychain::KeyChainStore;
use crate::network::Network;
use crate::storage::{SharedStore, Storage};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a wallet operation, tagged with the stage that failed.
///
/// Collaborator errors are kept as-is; use [`WalletError::downcast_ref`] to
/// recover the concrete type.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error(transparent)]
    Wallet(#[from] Error),

    #[error("coin query failed: {0}")]
    CoinQuery(#[source] BoxError),

    #[error("transaction composition failed: {0}")]
    Compose(#[source] BoxError),

    #[error("signing failed: {0}")]
    Sign(#[source] BoxError),

    #[error("broadcast failed: {0}")]
    Broadcast(#[source] BoxError),
}

impl WalletError {
    /// The collaborator error behind a pipeline failure.
    pub fn stage_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            WalletError::Wallet(_) => None,
            WalletError::CoinQuery(e)
            | WalletError::Compose(e)
            | WalletError::Sign(e)
            | WalletError::Broadcast(e) => Some(e.as_ref()),
        }
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.stage_error().and_then(|e| e.downcast_ref::<E>())
    }
}

/// A recipient supplied to [`Wallet::send_coins`], in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTarget {
    pub address: String,
    pub value: u64,
}

impl RawTarget {
    pub fn new(address: impl Into<String>, value: u64) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }
}

pub struct Wallet<Q, C, S, B> {
    options: WalletOptions,
    storage: Storage,
    addresses: AddressManager,
    assets: AssetDefinitionManager,
    color_definitions: ColorDefinitionStore,
    color_data: ColorDataStore,
    config: ConfigStore,
    backends: Backends<Q, C, S, B>,
}

// ── Construction ────────────────────────────────────────────────────────────

impl<Q, C, S, B> Wallet<Q, C, S, B>
where
    Q: CoinQuery,
    C: TxComposer,
    S: TxSigner,
    B: Blockchain,
{
    /// Open a wallet over `store`, installing the master key derived from
    /// `seed` and making sure every known asset has an address.
    pub fn open(
        seed: &[u8],
        options: WalletOptions,
        store: SharedStore,
        backends: Backends<Q, C, S, B>,
    ) -> Result<Self, Error> {
        Self::open_with_derivation(seed, options, store, backends, Arc::new(Bip32Derivation::new()))
    }

    pub fn open_with_derivation(
        seed: &[u8],
        options: WalletOptions,
        store: SharedStore,
        backends: Backends<Q, C, S, B>,
        deriver: Arc<dyn KeyDerivation>,
    ) -> Result<Self, Error> {
        let storage = Storage::new(store, options.key_prefix.clone());
        let keychain = KeyChainStore::open(storage.clone())?;
        let addresses = AddressManager::with_derivation(keychain, options.network, deriver);
        addresses.set_master_key_from_seed(seed)?;

        let wallet = Self {
            assets: AssetDefinitionManager::open(storage.clone())?,
            color_definitions: ColorDefinitionStore::new(storage.clone()),
            color_data: ColorDataStore::new(storage.clone()),
            config: ConfigStore::new(storage.clone()),
            storage,
            addresses,
            options,
            backends,
        };

        for asset in wallet.assets.all()? {
            wallet.prime_address(&asset)?;
        }
        log::info!(
            "wallet opened on {} (account {})",
            wallet.options.network,
            wallet.options.account
        );
        Ok(wallet)
    }

    /// Ensure `asset` has an address on its chain. Assets whose color set
    /// maps to no chain are skipped.
    fn prime_address(&self, asset: &AssetDefinition) -> Result<(), Error> {
        match self.some_address(asset) {
            Ok(_) => Ok(()),
            Err(Error::UndefinedChain(id)) => {
                log::warn!("asset {} has no wallet chain; skipping address", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// ── Assets and addresses ────────────────────────────────────────────────────

impl<Q, C, S, B> Wallet<Q, C, S, B>
where
    Q: CoinQuery,
    C: TxComposer,
    S: TxSigner,
    B: Blockchain,
{
    /// Register an asset and give it an address.
    pub fn add_asset_definition(
        &self,
        desc: AssetDefinitionDesc,
    ) -> Result<AssetDefinition, Error> {
        let asset = self.assets.resolve(desc)?;
        self.prime_address(&asset)?;
        Ok(asset)
    }

    pub fn get_asset_definition_by_moniker(
        &self,
        moniker: &str,
    ) -> Result<Option<AssetDefinition>, Error> {
        self.assets.get_by_moniker(moniker)
    }

    pub fn get_asset_definition_by_id(&self, id: &str) -> Result<Option<AssetDefinition>, Error> {
        self.assets.get_by_id(id)
    }

    pub fn get_all_asset_definitions(&self) -> Result<Vec<AssetDefinition>, Error> {
        self.assets.all()
    }

    /// Chain an asset's addresses live on.
    pub fn select_chain(&self, asset: &AssetDefinition) -> Result<ChainKind, Error> {
        self.addresses
            .chain_for(asset.color_set())
            .map_err(|_| Error::UndefinedChain(asset.id().to_string()))
    }

    pub fn new_address(&self, asset: &AssetDefinition) -> Result<String, Error> {
        let chain = self.select_chain(asset)?;
        Ok(self
            .addresses
            .new_address(self.options.account, chain)?
            .as_string())
    }

    pub fn some_address(&self, asset: &AssetDefinition) -> Result<String, Error> {
        let chain = self.select_chain(asset)?;
        Ok(self
            .addresses
            .some_address(self.options.account, chain)?
            .as_string())
    }

    pub fn all_addresses(&self, asset: &AssetDefinition) -> Result<Vec<String>, Error> {
        let chain = self.select_chain(asset)?;
        self.chain_addresses(chain)
    }

    fn chain_addresses(&self, chain: ChainKind) -> Result<Vec<String>, Error> {
        Ok(self
            .addresses
            .all_addresses(self.options.account, chain)?
            .iter()
            .map(|a| a.as_string())
            .collect())
    }
}

// ── Balances ────────────────────────────────────────────────────────────────

impl<Q, C, S, B> Wallet<Q, C, S, B>
where
    Q: CoinQuery,
    C: TxComposer,
    S: TxSigner,
    B: Blockchain,
{
    /// Sum of the asset's coins on its chain, in base units.
    ///
    /// Fails with `MultiColorBalanceUnsupported` when the coins carry more
    /// than one distinct color.
    pub async fn get_balance(
        &self,
        asset: &AssetDefinition,
        scope: BalanceScope,
    ) -> Result<u64, WalletError> {
        let request = CoinRequest {
            addresses: self.all_addresses(asset)?,
            color_ids: self.color_ids(asset)?,
            scope,
        };
        let coins = self
            .backends
            .coins
            .get_coins(&request)
            .await
            .map_err(|e| WalletError::CoinQuery(Box::new(e)))?
            .scoped(scope);

        let totals = coins.total_values();
        match totals.as_slice() {
            [] => Ok(0),
            [single] => Ok(single.value),
            many => Err(Error::MultiColorBalanceUnsupported(many.len()).into()),
        }
    }

    pub async fn get_available_balance(&self, asset: &AssetDefinition) -> Result<u64, WalletError> {
        self.get_balance(asset, BalanceScope::Confirmed).await
    }

    pub async fn get_total_balance(&self, asset: &AssetDefinition) -> Result<u64, WalletError> {
        self.get_balance(asset, BalanceScope::Total).await
    }

    pub async fn get_unconfirmed_balance(
        &self,
        asset: &AssetDefinition,
    ) -> Result<u64, WalletError> {
        self.get_balance(asset, BalanceScope::Unconfirmed).await
    }

    fn color_ids(&self, asset: &AssetDefinition) -> Result<Vec<u32>, Error> {
        Ok(asset
            .color_definitions(&self.color_definitions)?
            .iter()
            .map(|d| d.color_id)
            .collect())
    }
}

// ── Sending ─────────────────────────────────────────────────────────────────

impl<Q, C, S, B> Wallet<Q, C, S, B>
where
    Q: CoinQuery,
    C: TxComposer,
    S: TxSigner,
    B: Blockchain,
{
    /// Compose, sign and broadcast a payment of `asset` to `targets`.
    ///
    /// Stages run in order and the first failure ends the call. Broadcast is
    /// attempted at most once.
    pub async fn send_coins(
        &self,
        asset: &AssetDefinition,
        targets: &[RawTarget],
    ) -> Result<Txid, WalletError> {
        let asset_tx = self.build_asset_tx(asset, targets)?;
        let fee_policy = self.fee_policy()?;

        log::debug!(
            "composing {} target(s) of asset {}",
            asset_tx.targets.len(),
            asset.id()
        );
        let composed = self
            .backends
            .composer
            .compose(&asset_tx, &fee_policy)
            .await
            .map_err(|e| WalletError::Compose(Box::new(e)))?;

        let keys = self.signing_keys(&composed)?;
        log::debug!(
            "signing {} input(s) with {} key(s)",
            composed.inputs().len(),
            keys.len()
        );
        let signed = self
            .backends
            .signer
            .sign(composed, &keys)
            .await
            .map_err(|e| WalletError::Sign(Box::new(e)))?;

        let txid = self
            .backends
            .blockchain
            .broadcast(&signed)
            .await
            .map_err(|e| WalletError::Broadcast(Box::new(e)))?;
        log::info!("broadcast {} for asset {}", txid, asset.id());
        Ok(txid)
    }

    fn build_asset_tx(
        &self,
        asset: &AssetDefinition,
        targets: &[RawTarget],
    ) -> Result<AssetTx, Error> {
        if targets.is_empty() {
            return Err(Error::InvalidTarget("no targets given".into()));
        }
        let targets = targets
            .iter()
            .map(|t| {
                let value = i64::try_from(t.value)
                    .map_err(|_| Error::InvalidTarget(format!("{} is out of range", t.value)))?;
                AssetTarget::new(t.address.clone(), AssetValue::new(asset.clone(), value))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(AssetTx {
            asset: asset.clone(),
            color_ids: self.color_ids(asset)?,
            targets,
            source_addresses: self.all_addresses(asset)?,
            change_address: self.some_address(asset)?,
            fee_source_addresses: self.chain_addresses(ChainKind::Uncolored)?,
            fee_change_address: self
                .addresses
                .some_address(self.options.account, ChainKind::Uncolored)?
                .as_string(),
        })
    }

    /// Keys for the wallet addresses the composed inputs spend from.
    fn signing_keys(&self, tx: &ComposedTx) -> Result<Vec<PrivateKey>, Error> {
        let network = self.options.network.into_bitcoin();
        let mut keys: Vec<PrivateKey> = Vec::new();
        for input in tx.inputs() {
            let Ok(address) = bitcoin::Address::from_script(&input.script_pubkey, network) else {
                continue;
            };
            if let Some(key) = self.addresses.private_key_for(&address.to_string())? {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

// ── Settings, accessors and teardown ────────────────────────────────────────

impl<Q, C, S, B> Wallet<Q, C, S, B> {
    /// Persisted fee policy, or the one the wallet was opened with.
    pub fn fee_policy(&self) -> Result<FeePolicy, Error> {
        Ok(self
            .config
            .fee_policy()?
            .unwrap_or(self.options.fee_policy))
    }

    pub fn set_fee_policy(&self, policy: FeePolicy) -> Result<(), Error> {
        self.config.set_fee_policy(&policy)
    }

    pub fn options(&self) -> &WalletOptions {
        &self.options
    }

    pub fn network(&self) -> Network {
        self.options.network
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn address_manager(&self) -> &AddressManager {
        &self.addresses
    }

    pub fn asset_manager(&self) -> &AssetDefinitionManager {
        &self.assets
    }

    pub fn color_definitions(&self) -> &ColorDefinitionStore {
        &self.color_definitions
    }

    pub fn color_data(&self) -> &ColorDataStore {
        &self.color_data
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn backends(&self) -> &Backends<Q, C, S, B> {
        &self.backends
    }

    /// Wipe every store the wallet owns. Irreversible.
    pub fn clear_storage(&self) -> Result<(), Error> {
        self.config.clear()?;
        self.addresses.clear()?;
        self.color_data.clear()?;
        self.color_definitions.clear()?;
        self.assets.clear()?;
        log::info!("wallet storage cleared");
        Ok(())
    }
}

impl<Q, C, S, B> std::fmt::Debug for Wallet<Q, C, S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("options", &self.options)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
