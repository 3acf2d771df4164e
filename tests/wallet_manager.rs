use std::path::Path;

use ccwallet::ccwallet_core::testing::{
    MockBlockchain, MockCoinQuery, MockComposer, MockSigner, mock_backends,
};
use ccwallet::ccwallet_core::{Backends, BalanceScope, Coin, CoinList, Network};
use ccwallet::{
    BackendFactory, ElectrumBlockchain, ManagerError, SeedPersistError, WalletConfig,
    WalletManager, WalletStatus,
};

// ==================== Test Helpers ====================

type TestManager = WalletManager<MockCoinQuery, MockComposer, MockSigner, MockBlockchain>;

const PASSWORD: &str = "correct horse";
const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                       abandon abandon abandon abandon abandon about";

fn mocks() -> BackendFactory<MockCoinQuery, MockComposer, MockSigner, MockBlockchain> {
    Box::new(|_: &WalletConfig| mock_backends())
}

fn manager(dir: &Path, network: Network) -> TestManager {
    WalletManager::new(dir, WalletConfig::new(network), mocks())
}

fn bitcoin_address(m: &TestManager) -> String {
    let wallet = m.wallet().unwrap();
    let btc = wallet.get_asset_definition_by_moniker("bitcoin").unwrap().unwrap();
    wallet.some_address(&btc).unwrap()
}

// ==================== Lifecycle ====================

#[test]
fn fresh_directory_has_no_wallet() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(dir.path(), Network::Regtest);
    assert_eq!(m.status(), WalletStatus::NotCreated);
    assert!(matches!(m.wallet(), Err(ManagerError::NotUnlocked)));
}

#[test]
fn create_lock_unlock() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager(dir.path(), Network::Regtest);

    let phrase = m.create_wallet(PASSWORD).unwrap();
    assert_eq!(phrase.split_whitespace().count(), 12);
    assert_eq!(m.status(), WalletStatus::Unlocked);
    let address = bitcoin_address(&m);

    m.lock();
    assert_eq!(m.status(), WalletStatus::Locked);
    assert!(matches!(m.wallet(), Err(ManagerError::NotUnlocked)));

    m.unlock(PASSWORD).unwrap();
    assert_eq!(m.status(), WalletStatus::Unlocked);
    assert_eq!(bitcoin_address(&m), address);
}

#[test]
fn wrong_password_keeps_wallet_locked() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager(dir.path(), Network::Regtest);
    m.create_wallet(PASSWORD).unwrap();
    m.lock();

    let err = m.unlock("nope").unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Persist(SeedPersistError::WrongPassword)
    ));
    assert_eq!(m.status(), WalletStatus::Locked);
}

#[test]
fn create_twice_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager(dir.path(), Network::Regtest);
    m.create_wallet(PASSWORD).unwrap();
    assert!(matches!(
        m.create_wallet(PASSWORD),
        Err(ManagerError::AlreadyExists)
    ));
}

#[test]
fn restore_is_deterministic() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let mut first = manager(a.path(), Network::Regtest);
    let mut second = manager(b.path(), Network::Regtest);
    first.restore_wallet(ABANDON, PASSWORD).unwrap();
    second.restore_wallet(ABANDON, "another password").unwrap();
    assert_eq!(bitcoin_address(&first), bitcoin_address(&second));
}

#[test]
fn invalid_mnemonic_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager(dir.path(), Network::Regtest);
    assert!(matches!(
        m.restore_wallet("abandon abandon abandon", PASSWORD),
        Err(ManagerError::InvalidMnemonic)
    ));
    assert_eq!(m.status(), WalletStatus::NotCreated);
}

#[test]
fn delete_wipes_seed_and_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager(dir.path(), Network::Regtest);
    m.create_wallet(PASSWORD).unwrap();
    assert!(m.store_path().exists());

    m.delete_wallet().unwrap();
    assert_eq!(m.status(), WalletStatus::NotCreated);
    assert!(!m.store_path().exists());
    m.create_wallet(PASSWORD).unwrap();
}

#[test]
fn networks_do_not_share_seeds() {
    let dir = tempfile::tempdir().unwrap();
    let mut regtest = manager(dir.path(), Network::Regtest);
    regtest.create_wallet(PASSWORD).unwrap();

    let testnet = manager(dir.path(), Network::Testnet);
    assert_eq!(testnet.status(), WalletStatus::NotCreated);
}

// ==================== Config ====================

#[test]
fn load_or_init_keeps_saved_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut saved = WalletConfig::new(Network::Regtest);
    saved.fee_per_kb = Some(2_000);

    let m: TestManager = WalletManager::load_or_init(dir.path(), saved.clone(), mocks()).unwrap();
    assert_eq!(m.config(), &saved);

    let m: TestManager =
        WalletManager::load_or_init(dir.path(), WalletConfig::new(Network::Mainnet), mocks())
            .unwrap();
    assert_eq!(m.config(), &saved);
    assert_eq!(m.options().fee_policy.fee_per_kb, 2_000);
}

// ==================== Running wallet ====================

#[test]
fn electrum_backend_follows_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = WalletConfig::new(Network::Regtest);
    config.electrum_url = Some("tcp://127.0.0.1:60401".into());

    let mut m: WalletManager<MockCoinQuery, MockComposer, MockSigner> = WalletManager::new(
        dir.path(),
        config,
        Box::new(|config: &WalletConfig| {
            Backends::new(
                MockCoinQuery::default(),
                MockComposer::default(),
                MockSigner::default(),
                ElectrumBlockchain::from_config(config),
            )
        }),
    );
    m.restore_wallet(ABANDON, PASSWORD).unwrap();

    let blockchain = &m.wallet().unwrap().backends().blockchain;
    assert_eq!(blockchain.electrum_url(), "tcp://127.0.0.1:60401");
}

#[tokio::test]
async fn unlocked_wallet_reads_balances() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = manager(dir.path(), Network::Regtest);
    m.restore_wallet(ABANDON, PASSWORD).unwrap();
    let address = bitcoin_address(&m);

    let wallet = m.wallet().unwrap();
    let txid = "0000000000000000000000000000000000000000000000000000000000000001";
    wallet.backends().coins.set_coins(CoinList::new(vec![Coin {
        outpoint: format!("{txid}:0").parse().unwrap(),
        value: 50_000,
        color_id: 0,
        address,
        height: Some(10),
    }]));
    let btc = wallet.get_asset_definition_by_moniker("bitcoin").unwrap().unwrap();
    assert_eq!(
        wallet.get_balance(&btc, BalanceScope::Confirmed).await.unwrap(),
        50_000
    );
}
