use std::fs;
use std::path::{Path, PathBuf};

use ccwallet_core::{
    Backends, Blockchain, CoinQuery, TxComposer, TxSigner, Wallet, WalletOptions, shared,
};
use ccwallet_store::{SqliteStore, StoreError};
use thiserror::Error;
use zeroize::Zeroizing;

use super::persister::{SeedPersistError, SeedPersister};
use super::types::WalletStatus;
use crate::chain_adapter::ElectrumBlockchain;
use crate::config::{ConfigError, WalletConfig};

const STORE_FILE: &str = "wallet.sqlite";

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Wallet already exists for this network")]
    AlreadyExists,

    #[error("Invalid mnemonic")]
    InvalidMnemonic,

    #[error("Wallet not unlocked")]
    NotUnlocked,

    #[error("Invalid data path: {0}")]
    InvalidPath(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persist error: {0}")]
    Persist(#[from] SeedPersistError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ccwallet_core::Error),
}

/// Builds the collaborators for a wallet each time it is unlocked.
pub type BackendFactory<Q, C, S, B> =
    Box<dyn Fn(&WalletConfig) -> Backends<Q, C, S, B> + Send + Sync>;

/// Wallet lifecycle for one data directory and network: create or restore a
/// seed, unlock it into a running [`Wallet`], lock it again.
pub struct WalletManager<Q, C, S, B = ElectrumBlockchain> {
    data_dir: PathBuf,
    config: WalletConfig,
    persister: SeedPersister,
    backends: BackendFactory<Q, C, S, B>,
    wallet: Option<Wallet<Q, C, S, B>>,
}

impl<Q, C, S, B> WalletManager<Q, C, S, B>
where
    Q: CoinQuery,
    C: TxComposer,
    S: TxSigner,
    B: Blockchain,
{
    pub fn new(
        data_dir: &Path,
        config: WalletConfig,
        backends: BackendFactory<Q, C, S, B>,
    ) -> Self {
        let persister = SeedPersister::new(data_dir, config.network.as_str());
        Self {
            data_dir: data_dir.to_path_buf(),
            config,
            persister,
            backends,
            wallet: None,
        }
    }

    /// Use the saved config in `data_dir`, or save `fallback` as the config.
    pub fn load_or_init(
        data_dir: &Path,
        fallback: WalletConfig,
        backends: BackendFactory<Q, C, S, B>,
    ) -> Result<Self, ManagerError> {
        let config = match WalletConfig::load(data_dir)? {
            Some(config) => config,
            None => {
                fallback.save(data_dir)?;
                fallback
            }
        };
        Ok(Self::new(data_dir, config, backends))
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn options(&self) -> WalletOptions {
        self.config.wallet_options()
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir
            .join(self.config.network.as_str())
            .join(STORE_FILE)
    }

    pub fn status(&self) -> WalletStatus {
        if !self.persister.exists() {
            WalletStatus::NotCreated
        } else if self.wallet.is_none() {
            WalletStatus::Locked
        } else {
            WalletStatus::Unlocked
        }
    }

    /// Create a wallet from a fresh 12-word mnemonic, encrypted with
    /// `password`. Returns the mnemonic for user backup.
    pub fn create_wallet(&mut self, password: &str) -> Result<Zeroizing<String>, ManagerError> {
        if self.persister.exists() {
            return Err(ManagerError::AlreadyExists);
        }
        let entropy = Zeroizing::new(rand::random::<[u8; 16]>());
        let mnemonic = bip39::Mnemonic::from_entropy(&entropy[..])
            .map_err(|_| ManagerError::InvalidMnemonic)?;
        let phrase = Zeroizing::new(mnemonic.to_string());

        self.persister.save(&phrase, password)?;
        self.init_from_mnemonic(&phrase)?;
        log::info!("created wallet on {}", self.config.network);
        Ok(phrase)
    }

    /// Restore a wallet from an existing mnemonic, encrypted with `password`.
    pub fn restore_wallet(&mut self, phrase: &str, password: &str) -> Result<(), ManagerError> {
        let _mnemonic: bip39::Mnemonic =
            phrase.parse().map_err(|_| ManagerError::InvalidMnemonic)?;
        self.persister.save(phrase, password)?;
        self.init_from_mnemonic(phrase)?;
        log::info!("restored wallet on {}", self.config.network);
        Ok(())
    }

    pub fn unlock(&mut self, password: &str) -> Result<(), ManagerError> {
        let phrase = self.persister.load(password)?;
        self.init_from_mnemonic(&phrase)
    }

    /// Drop the running wallet; the seed stays encrypted on disk.
    pub fn lock(&mut self) {
        self.wallet = None;
    }

    pub fn wallet(&self) -> Result<&Wallet<Q, C, S, B>, ManagerError> {
        self.wallet.as_ref().ok_or(ManagerError::NotUnlocked)
    }

    /// Wipe wallet storage and the encrypted seed. Irreversible.
    pub fn delete_wallet(&mut self) -> Result<(), ManagerError> {
        if let Some(wallet) = self.wallet.take() {
            wallet.clear_storage()?;
        }
        let store_path = self.store_path();
        if store_path.exists() {
            fs::remove_file(&store_path)?;
        }
        self.persister.delete()?;
        log::info!("deleted wallet on {}", self.config.network);
        Ok(())
    }

    fn init_from_mnemonic(&mut self, phrase: &str) -> Result<(), ManagerError> {
        let mnemonic: bip39::Mnemonic =
            phrase.parse().map_err(|_| ManagerError::InvalidMnemonic)?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));

        let store_path = self.store_path();
        if let Some(parent) = store_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let path = store_path
            .to_str()
            .ok_or_else(|| ManagerError::InvalidPath(store_path.clone()))?;
        let store = SqliteStore::open(path)?;

        let backends = (self.backends)(&self.config);
        let wallet = Wallet::open(&seed[..], self.options(), shared(store), backends)?;
        self.wallet = Some(wallet);
        Ok(())
    }
}
