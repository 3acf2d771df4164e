use std::sync::Arc;

use bitcoin::bip32::Xpriv;
use bitcoin::{PrivateKey, PublicKey};

use crate::color::{ColorSet, ColorSetKind};
use crate::derivation::{Bip32Derivation, KeyDerivation};
use crate::error::{Error, Result};
use crate::keychain::{KeyChainStore, KeyFilter, KeyRecord};
use crate::network::Network;

/// Address-derivation lineages. The discriminant is the BIP32 chain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChainKind {
    Uncolored = 0,
    Epobc = 826_130_763,
}

impl ChainKind {
    pub fn index(self) -> u32 {
        self as u32
    }

    /// Chain a color set's coins live on.
    pub fn for_color_set(color_set: &ColorSet) -> Result<Self> {
        match color_set.classify() {
            ColorSetKind::UncoloredOnly => Ok(ChainKind::Uncolored),
            ColorSetKind::EpobcOnly => Ok(ChainKind::Epobc),
            ColorSetKind::Other => Err(Error::UnsupportedChain(
                color_set
                    .descriptors()
                    .iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            )),
        }
    }
}

impl TryFrom<u32> for ChainKind {
    type Error = Error;

    fn try_from(chain: u32) -> Result<Self> {
        match chain {
            0 => Ok(ChainKind::Uncolored),
            826_130_763 => Ok(ChainKind::Epobc),
            other => Err(Error::UnsupportedChain(other.to_string())),
        }
    }
}

/// A wallet address rendered from a key record. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub account: u32,
    pub chain: ChainKind,
    pub index: u32,
    pub public_key: PublicKey,
    pub address: bitcoin::Address,
}

impl Address {
    pub fn as_string(&self) -> String {
        self.address.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Deterministic address derivation on top of a [`KeyChainStore`].
pub struct AddressManager {
    keychain: KeyChainStore,
    network: Network,
    deriver: Arc<dyn KeyDerivation>,
}

impl AddressManager {
    pub fn new(keychain: KeyChainStore, network: Network) -> Self {
        Self::with_derivation(keychain, network, Arc::new(Bip32Derivation::new()))
    }

    pub fn with_derivation(
        keychain: KeyChainStore,
        network: Network,
        deriver: Arc<dyn KeyDerivation>,
    ) -> Self {
        Self {
            keychain,
            network,
            deriver,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn keychain(&self) -> &KeyChainStore {
        &self.keychain
    }

    /// Install the BIP32 master key for `seed`.
    ///
    /// Existing records are kept when the stored root already matches.
    pub fn set_master_key_from_seed(&self, seed: &[u8]) -> Result<()> {
        let master = Xpriv::new_master(self.network.into_bitcoin(), seed)
            .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?
            .to_string();
        if self.keychain.root_key()?.as_deref() == Some(master.as_str()) {
            return Ok(());
        }
        log::info!("installing new root key; previous key records discarded");
        self.keychain.set_root_key(&master)
    }

    pub fn set_root_key(&self, material: &str) -> Result<()> {
        self.keychain.set_root_key(material)
    }

    /// Derive and record the address after the highest index on the chain.
    pub fn new_address(&self, account: u32, chain: ChainKind) -> Result<Address> {
        let root = self.root()?;
        let index = match self.keychain.max_index(account, chain.index())? {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| Error::Derivation("chain index space exhausted".into()))?,
            None => 0,
        };
        let public_key = self
            .deriver
            .derive_public_key(&root, account, chain.index(), index)?;
        self.keychain
            .add_key(account, chain.index(), index, &public_key.to_bytes())?;
        let address = self.render(account, chain, index, public_key);
        log::debug!("derived {:?} address {} at index {}", chain, address, index);
        Ok(address)
    }

    /// The address at index 0, or a new one if the chain has no records.
    pub fn some_address(&self, account: u32, chain: ChainKind) -> Result<Address> {
        let records = self
            .keychain
            .list_keys(KeyFilter::pair(account, chain.index()))?;
        let existing = records
            .iter()
            .find(|r| r.index == 0)
            .or_else(|| records.first());
        match existing {
            Some(record) => self.address_for_record(chain, record),
            None => self.new_address(account, chain),
        }
    }

    /// Every recorded address on the chain, by index.
    pub fn all_addresses(&self, account: u32, chain: ChainKind) -> Result<Vec<Address>> {
        let mut records = self
            .keychain
            .list_keys(KeyFilter::pair(account, chain.index()))?;
        records.sort_by_key(|r| r.index);
        records
            .iter()
            .map(|r| self.address_for_record(chain, r))
            .collect()
    }

    /// Private key behind a recorded wallet address, if it is ours.
    pub fn private_key_for(&self, address: &str) -> Result<Option<PrivateKey>> {
        let root = self.root()?;
        for record in self.keychain.list_keys(KeyFilter::all())? {
            let Ok(chain) = ChainKind::try_from(record.chain) else {
                continue;
            };
            if self.address_for_record(chain, &record)?.as_string() == address {
                let key = self.deriver.derive_private_key(
                    &root,
                    record.account,
                    record.chain,
                    record.index,
                )?;
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    pub fn chain_for(&self, color_set: &ColorSet) -> Result<ChainKind> {
        ChainKind::for_color_set(color_set)
    }

    pub fn clear(&self) -> Result<()> {
        self.keychain.clear()
    }

    fn root(&self) -> Result<String> {
        self.keychain.root_key()?.ok_or(Error::MissingRootKey)
    }

    fn address_for_record(&self, chain: ChainKind, record: &KeyRecord) -> Result<Address> {
        let public_key = PublicKey::from_slice(&record.public_key)
            .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?;
        Ok(self.render(record.account, chain, record.index, public_key))
    }

    fn render(&self, account: u32, chain: ChainKind, index: u32, public_key: PublicKey) -> Address {
        let address =
            bitcoin::Address::p2pkh(public_key.pubkey_hash(), self.network.into_bitcoin());
        Address {
            account,
            chain,
            index,
            public_key,
            address,
        }
    }
}

impl std::fmt::Debug for AddressManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressManager")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
