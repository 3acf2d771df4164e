use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{PrivateKey, PublicKey};

use crate::error::{Error, Result};

/// A parsed root extended key, as stored in the key chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKey {
    Private(Xpriv),
    /// Watch-only root; hardened derivation is unavailable.
    Public(Xpub),
}

impl RootKey {
    /// Parse a base58 serialized extended key (`xprv`/`tprv` or `xpub`/`tpub`).
    pub fn parse(material: &str) -> Result<Self> {
        if let Ok(xpriv) = Xpriv::from_str(material) {
            return Ok(RootKey::Private(xpriv));
        }
        Xpub::from_str(material)
            .map(RootKey::Public)
            .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))
    }
}

/// HD-derivation primitive: deterministic keys for (account, chain, index)
/// under a root extended key.
pub trait KeyDerivation: Send + Sync {
    fn derive_public_key(&self, root: &str, account: u32, chain: u32, index: u32)
    -> Result<PublicKey>;

    fn derive_private_key(
        &self,
        root: &str,
        account: u32,
        chain: u32,
        index: u32,
    ) -> Result<PrivateKey>;
}

/// BIP32 default wallet layout: `m/account'/chain/index` for private roots.
///
/// Public roots derive `m/account/chain/index` since hardening needs the
/// private key.
pub struct Bip32Derivation {
    secp: Secp256k1<All>,
}

impl Bip32Derivation {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    fn path(account: ChildNumber, chain: u32, index: u32) -> Result<DerivationPath> {
        let chain = ChildNumber::from_normal_idx(chain).map_err(derivation_err)?;
        let index = ChildNumber::from_normal_idx(index).map_err(derivation_err)?;
        Ok(DerivationPath::from(vec![account, chain, index]))
    }

    fn derive_xpriv(&self, root: &Xpriv, account: u32, chain: u32, index: u32) -> Result<Xpriv> {
        let account = ChildNumber::from_hardened_idx(account).map_err(derivation_err)?;
        let path = Self::path(account, chain, index)?;
        root.derive_priv(&self.secp, &path).map_err(derivation_err)
    }
}

impl Default for Bip32Derivation {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDerivation for Bip32Derivation {
    fn derive_public_key(
        &self,
        root: &str,
        account: u32,
        chain: u32,
        index: u32,
    ) -> Result<PublicKey> {
        match RootKey::parse(root)? {
            RootKey::Private(xpriv) => {
                let child = self.derive_xpriv(&xpriv, account, chain, index)?;
                let xpub = Xpub::from_priv(&self.secp, &child);
                Ok(PublicKey::new(xpub.public_key))
            }
            RootKey::Public(xpub) => {
                let account = ChildNumber::from_normal_idx(account).map_err(derivation_err)?;
                let path = Self::path(account, chain, index)?;
                let child = xpub.derive_pub(&self.secp, &path).map_err(derivation_err)?;
                Ok(PublicKey::new(child.public_key))
            }
        }
    }

    fn derive_private_key(
        &self,
        root: &str,
        account: u32,
        chain: u32,
        index: u32,
    ) -> Result<PrivateKey> {
        match RootKey::parse(root)? {
            RootKey::Private(xpriv) => {
                let child = self.derive_xpriv(&xpriv, account, chain, index)?;
                Ok(child.to_priv())
            }
            RootKey::Public(_) => Err(Error::InvalidKeyMaterial(
                "watch-only root key has no private keys".into(),
            )),
        }
    }
}

fn derivation_err(e: bitcoin::bip32::Error) -> Error {
    Error::Derivation(e.to_string())
}
