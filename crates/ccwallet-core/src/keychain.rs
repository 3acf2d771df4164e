use serde::{Deserialize, Serialize};

use crate::derivation::RootKey;
use crate::error::{Error, Result};
use crate::storage::{Storage, hex_bytes};

const ROOT_KEY: &str = "root_key";
const KEY_RECORDS: &str = "key_records";

/// A derived public key recorded at (account, chain, index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub account: u32,
    pub chain: u32,
    pub index: u32,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

/// Filter for [`KeyChainStore::list_keys`]. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyFilter {
    pub account: Option<u32>,
    pub chain: Option<u32>,
}

impl KeyFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pair(account: u32, chain: u32) -> Self {
        Self {
            account: Some(account),
            chain: Some(chain),
        }
    }

    fn matches(&self, record: &KeyRecord) -> bool {
        self.account.is_none_or(|a| a == record.account)
            && self.chain.is_none_or(|c| c == record.chain)
    }
}

/// Append-only record of derived public keys plus the root key they were
/// derived from.
///
/// Records are only valid under the stored root: replacing the root discards
/// every record.
#[derive(Debug, Clone)]
pub struct KeyChainStore {
    storage: Storage,
}

impl KeyChainStore {
    /// Open the key chain. Records left behind without a root key are dropped.
    pub fn open(storage: Storage) -> Result<Self> {
        let store = Self { storage };
        if store.root_key()?.is_none() {
            store.storage.remove(ROOT_KEY)?;
            store.storage.save(KEY_RECORDS, &Vec::<KeyRecord>::new())?;
        }
        Ok(store)
    }

    pub fn root_key(&self) -> Result<Option<String>> {
        self.storage.load(ROOT_KEY)
    }

    /// Replace the root key and discard every key record.
    ///
    /// Fails with `InvalidKeyMaterial` without touching the store if
    /// `material` is not a serialized extended key. Records are discarded
    /// before the root is written, so a failed write never leaves old records
    /// under the new root.
    pub fn set_root_key(&self, material: &str) -> Result<()> {
        RootKey::parse(material)?;
        self.storage.save(KEY_RECORDS, &Vec::<KeyRecord>::new())?;
        self.storage.save(ROOT_KEY, &material)?;
        Ok(())
    }

    /// Append a record. Fails with `UniqueConstraintViolation` if the triple
    /// or the public key is already present.
    pub fn add_key(&self, account: u32, chain: u32, index: u32, public_key: &[u8]) -> Result<()> {
        self.storage
            .update(KEY_RECORDS, |records: &mut Vec<KeyRecord>| {
                let conflict = records.iter().any(|r| {
                    (r.account == account && r.chain == chain && r.index == index)
                        || r.public_key == public_key
                });
                if conflict {
                    return Err(Error::UniqueConstraintViolation {
                        account,
                        chain,
                        index,
                    });
                }
                records.push(KeyRecord {
                    account,
                    chain,
                    index,
                    public_key: public_key.to_vec(),
                });
                Ok(())
            })
    }

    pub fn max_index(&self, account: u32, chain: u32) -> Result<Option<u32>> {
        Ok(self
            .records()?
            .iter()
            .filter(|r| r.account == account && r.chain == chain)
            .map(|r| r.index)
            .max())
    }

    /// Matching records in insertion order.
    pub fn list_keys(&self, filter: KeyFilter) -> Result<Vec<KeyRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// Remove the root key and every record.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(ROOT_KEY)?;
        self.storage.remove(KEY_RECORDS)
    }

    fn records(&self) -> Result<Vec<KeyRecord>> {
        Ok(self.storage.load(KEY_RECORDS)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::bip32::Xpriv;

    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, shared};

    fn store() -> KeyChainStore {
        let storage = Storage::new(shared(MemoryStore::default()), "t_");
        let store = KeyChainStore::open(storage).unwrap();
        store.set_root_key(&root(1)).unwrap();
        store
    }

    fn root(seed: u8) -> String {
        Xpriv::new_master(bitcoin::Network::Regtest, &[seed; 32])
            .unwrap()
            .to_string()
    }

    #[test]
    fn max_index_tracks_records() {
        let s = store();
        assert_eq!(s.max_index(0, 0).unwrap(), None);
        s.add_key(0, 0, 0, &[1]).unwrap();
        s.add_key(0, 0, 1, &[2]).unwrap();
        s.add_key(0, 5, 9, &[3]).unwrap();
        assert_eq!(s.max_index(0, 0).unwrap(), Some(1));
        assert_eq!(s.max_index(0, 5).unwrap(), Some(9));
        assert_eq!(s.max_index(1, 0).unwrap(), None);
    }

    #[test]
    fn duplicate_triple_rejected() {
        let s = store();
        s.add_key(0, 0, 0, &[1]).unwrap();
        let err = s.add_key(0, 0, 0, &[2]).unwrap_err();
        assert!(matches!(err, Error::UniqueConstraintViolation { .. }));
        assert_eq!(s.list_keys(KeyFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_public_key_rejected() {
        let s = store();
        s.add_key(0, 0, 0, &[1]).unwrap();
        let err = s.add_key(1, 2, 3, &[1]).unwrap_err();
        assert!(matches!(
            err,
            Error::UniqueConstraintViolation {
                account: 1,
                chain: 2,
                index: 3
            }
        ));
        assert_eq!(s.list_keys(KeyFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn list_keys_filters() {
        let s = store();
        s.add_key(0, 0, 0, &[1]).unwrap();
        s.add_key(0, 1, 0, &[2]).unwrap();
        s.add_key(1, 1, 0, &[3]).unwrap();
        assert_eq!(s.list_keys(KeyFilter::all()).unwrap().len(), 3);
        assert_eq!(s.list_keys(KeyFilter::pair(0, 1)).unwrap().len(), 1);
        let by_chain = KeyFilter {
            account: None,
            chain: Some(1),
        };
        let keys = s.list_keys(by_chain).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].public_key, vec![2]);
        assert_eq!(keys[1].public_key, vec![3]);
        let by_account = KeyFilter {
            account: Some(1),
            chain: None,
        };
        assert_eq!(s.list_keys(by_account).unwrap().len(), 1);
    }

    #[test]
    fn new_root_discards_records() {
        let s = store();
        s.add_key(0, 0, 0, &[1]).unwrap();
        s.set_root_key(&root(2)).unwrap();
        assert!(s.list_keys(KeyFilter::all()).unwrap().is_empty());
        assert_eq!(s.max_index(0, 0).unwrap(), None);
        assert_eq!(s.root_key().unwrap(), Some(root(2)));
    }

    /// Memory backend that rejects writes to keys ending in a chosen suffix.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryStore,
        failing: Arc<Mutex<Option<&'static str>>>,
    }

    impl KeyValueStore for FailingStore {
        fn get(&mut self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            let failing = *self.failing.lock().unwrap();
            if failing.is_some_and(|suffix| key.ends_with(suffix)) {
                return Err(Error::Storage("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn clear(&mut self) -> Result<()> {
            self.inner.clear()
        }
    }

    fn failing_store() -> (KeyChainStore, Arc<Mutex<Option<&'static str>>>) {
        let backend = FailingStore::default();
        let failing = backend.failing.clone();
        let s = KeyChainStore::open(Storage::new(shared(backend), "t_")).unwrap();
        s.set_root_key(&root(1)).unwrap();
        s.add_key(0, 0, 0, &[9]).unwrap();
        (s, failing)
    }

    #[test]
    fn failed_record_wipe_keeps_old_root() {
        let (s, failing) = failing_store();
        *failing.lock().unwrap() = Some(KEY_RECORDS);
        assert!(matches!(s.set_root_key(&root(2)), Err(Error::Storage(_))));
        assert_eq!(s.root_key().unwrap(), Some(root(1)));
        assert_eq!(s.list_keys(KeyFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn failed_root_write_leaves_no_records() {
        let (s, failing) = failing_store();
        *failing.lock().unwrap() = Some(ROOT_KEY);
        assert!(s.set_root_key(&root(2)).is_err());
        assert_ne!(s.root_key().unwrap(), Some(root(2)));
        assert!(s.list_keys(KeyFilter::all()).unwrap().is_empty());
    }

    #[test]
    fn invalid_root_leaves_store_untouched() {
        let s = store();
        s.add_key(0, 0, 0, &[1]).unwrap();
        let err = s.set_root_key("xprv-garbage").unwrap_err();
        assert!(matches!(err, Error::InvalidKeyMaterial(_)));
        assert_eq!(s.root_key().unwrap(), Some(root(1)));
        assert_eq!(s.list_keys(KeyFilter::all()).unwrap().len(), 1);
    }

    #[test]
    fn records_without_root_are_dropped_on_open() {
        let storage = Storage::new(shared(MemoryStore::default()), "t_");
        storage
            .save(
                KEY_RECORDS,
                &vec![KeyRecord {
                    account: 0,
                    chain: 0,
                    index: 0,
                    public_key: vec![9],
                }],
            )
            .unwrap();
        let s = KeyChainStore::open(storage).unwrap();
        assert!(s.list_keys(KeyFilter::all()).unwrap().is_empty());
    }

    #[test]
    fn public_key_serializes_as_hex() {
        let record = KeyRecord {
            account: 0,
            chain: 0,
            index: 1,
            public_key: vec![0xab, 0xcd],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"publicKey\":\"abcd\""));
    }

    #[test]
    fn clear_removes_root_and_records() {
        let s = store();
        s.add_key(0, 0, 0, &[1]).unwrap();
        s.clear().unwrap();
        assert!(s.root_key().unwrap().is_none());
        assert!(s.list_keys(KeyFilter::all()).unwrap().is_empty());
    }
}
