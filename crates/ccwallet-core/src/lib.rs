pub use bitcoin;

pub mod address;
pub mod asset;
pub mod asset_manager;
pub mod backend;
pub mod coin;
pub mod color;
pub mod composed_tx;
pub mod config;
pub mod derivation;
pub mod error;
pub mod keychain;
pub mod network;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wallet;

// Core types
pub use error::{Error, Result};
pub use network::Network;
pub use wallet::{BoxError, RawTarget, Wallet, WalletError};

// Keys and addresses
pub use address::{Address, AddressManager, ChainKind};
pub use derivation::{Bip32Derivation, KeyDerivation, RootKey};
pub use keychain::{KeyChainStore, KeyFilter, KeyRecord};

// Assets and colors
pub use asset::{AssetDefinition, AssetDefinitionDesc, AssetTarget, AssetValue};
pub use asset_manager::{AssetDefinitionManager, BITCOIN_MONIKER, SATOSHIS_PER_BITCOIN};
pub use color::{
    ColorDataEntry, ColorDataStore, ColorDefinition, ColorDefinitionStore, ColorDescriptor,
    ColorKind, ColorSet, ColorSetKind,
};

// Transactions and collaborators
pub use backend::{AssetTx, Backends, Blockchain, CoinQuery, TxComposer, TxSigner};
pub use coin::{BalanceScope, Coin, CoinList, CoinRequest, ColorValue};
pub use composed_tx::{ComposedTx, ExtraSize, FeePolicy, TxInput, TxOutput, var_int_size};

// Configuration and persistence
pub use config::{ConfigStore, WalletOptions};
pub use storage::{DEFAULT_KEY_PREFIX, KeyValueStore, MemoryStore, SharedStore, Storage, shared};
