//! Key/value persistence capability and the namespaced handle every domain
//! store is built on.
//!
//! Backends only move opaque strings. Domain stores (key chain, asset
//! definitions, color definitions, config) hold a [`Storage`] handle and keep
//! their records as JSON under their own logical key.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub const DEFAULT_KEY_PREFIX: &str = "ccwallet_";

/// Minimal persistence capability: get/set/remove per key, plus a full wipe.
///
/// All methods take `&mut self` so backends built on connections that need
/// exclusive access for reads (SQLite through diesel) fit without interior
/// mutability.
pub trait KeyValueStore {
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is a no-op.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Remove every key held by the backend.
    fn clear(&mut self) -> Result<()>;
}

/// One backend shared by every store a wallet owns.
pub type SharedStore = Arc<Mutex<dyn KeyValueStore + Send>>;

pub fn shared<S: KeyValueStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// In-memory backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Cloneable handle to a shared backend with a key prefix applied to every
/// logical key.
#[derive(Clone)]
pub struct Storage {
    backend: SharedStore,
    prefix: String,
}

impl Storage {
    pub fn new(backend: SharedStore, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn lock(&self) -> Result<MutexGuard<'_, dyn KeyValueStore + Send + 'static>> {
        self.backend.lock().map_err(|_| Error::MutexPoisoned)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let raw = self.lock()?.get(&self.key(name))?;
        raw.map(|s| serde_json::from_str(&s).map_err(Error::from))
            .transpose()
    }

    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.lock()?.set(&self.key(name), &raw)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.lock()?.remove(&self.key(name))
    }

    /// Read-modify-write of one logical key under a single lock.
    ///
    /// A missing key starts from `T::default()`. Nothing is written when `f`
    /// returns an error, so a failed update leaves the store unchanged.
    pub fn update<T, R, F>(&self, name: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let key = self.key(name);
        let mut backend = self.lock()?;
        let mut value: T = match backend.get(&key)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => T::default(),
        };
        let out = f(&mut value)?;
        backend.set(&key, &serde_json::to_string(&value)?)?;
        Ok(out)
    }

    /// Wipe the whole backend, including keys outside this prefix.
    pub fn clear_backend(&self) -> Result<()> {
        self.lock()?.clear()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Serde helper storing byte vectors as lowercase hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
