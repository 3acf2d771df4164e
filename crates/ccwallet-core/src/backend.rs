//! Collaborators the wallet delegates to.
//!
//! The color kernel, blockchain access and signing live outside this crate.
//! Each trait carries its own error type; the wallet surfaces it untouched,
//! tagged with the pipeline stage that produced it.

use std::future::Future;

use bitcoin::{PrivateKey, Transaction, Txid};

use crate::asset::{AssetDefinition, AssetTarget};
use crate::coin::{CoinList, CoinRequest};
use crate::composed_tx::{ComposedTx, FeePolicy};

/// Fetches coins for a set of addresses, restricted to some colors.
pub trait CoinQuery: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_coins(
        &self,
        request: &CoinRequest,
    ) -> impl Future<Output = Result<CoinList, Self::Error>> + Send;
}

/// Color-aware transaction builder. Uses [`ComposedTx::estimate_required_fee`]
/// to size the fee it pays.
pub trait TxComposer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn compose(
        &self,
        tx: &AssetTx,
        fee_policy: &FeePolicy,
    ) -> impl Future<Output = Result<ComposedTx, Self::Error>> + Send;
}

pub trait TxSigner: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sign every input of `tx`. `keys` holds the wallet keys for the
    /// addresses the inputs spend from.
    fn sign(
        &self,
        tx: ComposedTx,
        keys: &[PrivateKey],
    ) -> impl Future<Output = Result<Transaction, Self::Error>> + Send;
}

pub trait Blockchain: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn broadcast(&self, tx: &Transaction)
    -> impl Future<Output = Result<Txid, Self::Error>> + Send;
}

/// The collaborator handles a wallet is opened with.
#[derive(Debug, Clone)]
pub struct Backends<Q, C, S, B> {
    pub coins: Q,
    pub composer: C,
    pub signer: S,
    pub blockchain: B,
}

impl<Q, C, S, B> Backends<Q, C, S, B>
where
    Q: CoinQuery,
    C: TxComposer,
    S: TxSigner,
    B: Blockchain,
{
    pub fn new(coins: Q, composer: C, signer: S, blockchain: B) -> Self {
        Self {
            coins,
            composer,
            signer,
            blockchain,
        }
    }
}

/// A send request handed to the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTx {
    pub asset: AssetDefinition,
    pub color_ids: Vec<u32>,
    pub targets: Vec<AssetTarget>,
    /// Wallet addresses holding coins of the asset.
    pub source_addresses: Vec<String>,
    /// Receives leftover asset value.
    pub change_address: String,
    /// Wallet addresses holding uncolored coins to pay the fee from.
    pub fee_source_addresses: Vec<String>,
    /// Receives leftover fee coins.
    pub fee_change_address: String,
}

impl AssetTx {
    /// Sum of every target amount, saturating at `u64::MAX`.
    pub fn target_value(&self) -> u64 {
        self.targets
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.amount()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetDefinitionDesc, AssetValue};

    #[test]
    fn target_value_saturates() {
        let asset = AssetDefinition::new(AssetDefinitionDesc::new(
            vec!["bitcoin".into()],
            vec!["".into()],
            100_000_000,
        ))
        .unwrap();
        let target = AssetTarget::new("addr", AssetValue::new(asset.clone(), i64::MAX)).unwrap();
        let tx = AssetTx {
            asset,
            color_ids: vec![0],
            targets: vec![target.clone(), target.clone(), target],
            source_addresses: vec![],
            change_address: "change".into(),
            fee_source_addresses: vec![],
            fee_change_address: "change".into(),
        };
        assert_eq!(tx.target_value(), u64::MAX);
    }
}
