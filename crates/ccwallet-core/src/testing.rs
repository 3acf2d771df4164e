//! In-memory collaborators for exercising a [`Wallet`](crate::Wallet) without
//! a network or a color kernel.
//!
//! Every mock records the calls it receives and can be switched to fail, so
//! tests can check which pipeline stages ran.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bitcoin::{PrivateKey, Transaction, Txid};

use crate::backend::{AssetTx, Backends, Blockchain, CoinQuery, TxComposer, TxSigner};
use crate::coin::{CoinList, CoinRequest};
use crate::composed_tx::{ComposedTx, FeePolicy};
use crate::wallet::Wallet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mock {stage} failure")]
pub struct MockError {
    pub stage: &'static str,
}

pub type MockBackends = Backends<MockCoinQuery, MockComposer, MockSigner, MockBlockchain>;
pub type MockWallet = Wallet<MockCoinQuery, MockComposer, MockSigner, MockBlockchain>;

pub fn mock_backends() -> MockBackends {
    Backends::new(
        MockCoinQuery::default(),
        MockComposer::default(),
        MockSigner::default(),
        MockBlockchain::default(),
    )
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Coin query ──────────────────────────────────────────────────────────────

/// Returns a fixed coin list for every request.
#[derive(Debug, Default)]
pub struct MockCoinQuery {
    coins: Mutex<CoinList>,
    requests: Mutex<Vec<CoinRequest>>,
    failing: AtomicBool,
}

impl MockCoinQuery {
    pub fn set_coins(&self, coins: CoinList) {
        *lock(&self.coins) = coins;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CoinRequest> {
        lock(&self.requests).clone()
    }
}

impl CoinQuery for MockCoinQuery {
    type Error = MockError;

    async fn get_coins(&self, request: &CoinRequest) -> Result<CoinList, MockError> {
        lock(&self.requests).push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(MockError { stage: "coin query" });
        }
        Ok(lock(&self.coins).clone())
    }
}

// ── Composer ────────────────────────────────────────────────────────────────

/// Returns a fixed composed transaction for every request.
#[derive(Debug, Default)]
pub struct MockComposer {
    template: Mutex<ComposedTx>,
    calls: Mutex<Vec<(AssetTx, FeePolicy)>>,
    failing: AtomicBool,
}

impl MockComposer {
    pub fn set_template(&self, tx: ComposedTx) {
        *lock(&self.template) = tx;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(AssetTx, FeePolicy)> {
        lock(&self.calls).clone()
    }
}

impl TxComposer for MockComposer {
    type Error = MockError;

    async fn compose(&self, tx: &AssetTx, fee_policy: &FeePolicy) -> Result<ComposedTx, MockError> {
        lock(&self.calls).push((tx.clone(), *fee_policy));
        if self.failing.load(Ordering::SeqCst) {
            return Err(MockError { stage: "compose" });
        }
        Ok(lock(&self.template).clone())
    }
}

// ── Signer ──────────────────────────────────────────────────────────────────

/// "Signs" by returning the unsigned transaction.
#[derive(Debug, Default)]
pub struct MockSigner {
    keys_seen: Mutex<Vec<Vec<PrivateKey>>>,
    failing: AtomicBool,
}

impl MockSigner {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Keys handed to each sign call.
    pub fn keys_seen(&self) -> Vec<Vec<PrivateKey>> {
        lock(&self.keys_seen).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.keys_seen).len()
    }
}

impl TxSigner for MockSigner {
    type Error = MockError;

    async fn sign(&self, tx: ComposedTx, keys: &[PrivateKey]) -> Result<Transaction, MockError> {
        lock(&self.keys_seen).push(keys.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err(MockError { stage: "sign" });
        }
        Ok(tx.unsigned_transaction())
    }
}

// ── Blockchain ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockBlockchain {
    broadcasts: Mutex<Vec<Transaction>>,
    failing: AtomicBool,
}

impl MockBlockchain {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        lock(&self.broadcasts).clone()
    }
}

impl Blockchain for MockBlockchain {
    type Error = MockError;

    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, MockError> {
        lock(&self.broadcasts).push(tx.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(MockError { stage: "broadcast" });
        }
        Ok(tx.compute_txid())
    }
}
