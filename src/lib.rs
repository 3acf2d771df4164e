//! Colored-coin wallet: seed lifecycle, on-disk config and an Electrum
//! adapter around [`ccwallet_core::Wallet`].

mod chain_adapter;
pub mod config;
pub mod wallet;

pub use ccwallet_core;
pub use chain_adapter::{ChainAdapterError, ElectrumBlockchain};
pub use config::{ConfigError, WalletConfig};
pub use wallet::manager::{BackendFactory, ManagerError, WalletManager};
pub use wallet::persister::{SeedPersistError, SeedPersister};
pub use wallet::types::WalletStatus;
