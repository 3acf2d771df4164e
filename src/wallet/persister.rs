use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

const SEED_FILE: &str = "seed_encrypted.json";

#[derive(Error, Debug)]
pub enum SeedPersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Wrong password")]
    WrongPassword,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptedSeedFile {
    salt: String,
    nonce: String,
    ciphertext: String,
    #[serde(default)]
    created_at: Option<String>,
}

/// Password-encrypted mnemonic on disk, one file per network directory.
pub struct SeedPersister {
    file_path: PathBuf,
}

impl SeedPersister {
    pub fn new(data_dir: &Path, network: &str) -> Self {
        Self {
            file_path: data_dir.join(network).join(SEED_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn exists(&self) -> bool {
        self.file_path.exists()
    }

    pub fn save(&self, mnemonic: &str, password: &str) -> Result<(), SeedPersistError> {
        let salt: [u8; 16] = rand::random();
        let cipher = cipher_for(password, &salt)?;
        let nonce_bytes: [u8; 12] = rand::random();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), mnemonic.as_bytes())
            .map_err(|e| SeedPersistError::Crypto(e.to_string()))?;

        let file = EncryptedSeedFile {
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file_path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Decrypt the stored mnemonic. The result is wiped from memory on drop.
    pub fn load(&self, password: &str) -> Result<Zeroizing<String>, SeedPersistError> {
        let file = self.read_file()?;
        let salt = decode(&file.salt)?;
        let nonce_bytes = decode(&file.nonce)?;
        if nonce_bytes.len() != 12 {
            return Err(SeedPersistError::Crypto("invalid nonce length".into()));
        }
        let ciphertext = decode(&file.ciphertext)?;

        let plaintext = cipher_for(password, &salt)?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| SeedPersistError::WrongPassword)?;
        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|e| SeedPersistError::Crypto(e.to_string()))
    }

    /// When the seed file was written, if recorded.
    pub fn created_at(&self) -> Result<Option<String>, SeedPersistError> {
        Ok(self.read_file()?.created_at)
    }

    pub fn delete(&self) -> Result<(), SeedPersistError> {
        if self.exists() {
            fs::remove_file(&self.file_path)?;
        }
        Ok(())
    }

    fn read_file(&self) -> Result<EncryptedSeedFile, SeedPersistError> {
        let contents = fs::read_to_string(&self.file_path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn cipher_for(password: &str, salt: &[u8]) -> Result<Aes256Gcm, SeedPersistError> {
    let mut key_bytes = Zeroizing::new([0u8; 32]);
    argon2::Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key_bytes[..])
        .map_err(|e| SeedPersistError::Crypto(e.to_string()))?;
    Aes256Gcm::new_from_slice(&key_bytes[..])
        .map_err(|e| SeedPersistError::Crypto(e.to_string()))
}

fn decode(field: &str) -> Result<Vec<u8>, SeedPersistError> {
    BASE64
        .decode(field)
        .map_err(|e| SeedPersistError::Crypto(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let p = SeedPersister::new(dir.path(), "testnet");
        assert!(!p.exists());
        p.save(PHRASE, "hunter2").unwrap();
        assert!(p.exists());
        assert_eq!(p.load("hunter2").unwrap().as_str(), PHRASE);
        assert!(p.created_at().unwrap().is_some());
    }

    #[test]
    fn wrong_password_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let p = SeedPersister::new(dir.path(), "testnet");
        p.save(PHRASE, "right").unwrap();
        assert!(matches!(p.load("wrong"), Err(SeedPersistError::WrongPassword)));
    }

    #[test]
    fn files_are_per_network() {
        let dir = tempfile::tempdir().unwrap();
        SeedPersister::new(dir.path(), "testnet").save(PHRASE, "pw").unwrap();
        assert!(!SeedPersister::new(dir.path(), "mainnet").exists());
    }

    #[test]
    fn ciphertext_does_not_contain_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let p = SeedPersister::new(dir.path(), "regtest");
        p.save(PHRASE, "pw").unwrap();
        let raw = fs::read_to_string(p.path()).unwrap();
        assert!(!raw.contains("abandon"));
        p.delete().unwrap();
        assert!(!p.exists());
    }
}
