//! Credential Vault.
//!
//! Passwords are stored as `base64(nonce || ciphertext)` under AES-256-GCM
//! with one 32-byte key per account. Keys are provisioned lazily on first
//! encryption and never rotated implicitly.

mod platform;
mod sqlite;

use std::future::Future;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

pub use self::platform::KeyringKeyStore;
pub use self::sqlite::SqliteKeyStore;
use crate::account::AccountId;
use crate::{DecryptionError, Error, Result};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (96 bits).
const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size.
const TAG_SIZE: usize = 16;

/// Raw account key.
pub type AccountKey = [u8; KEY_SIZE];

/// Persistent home of per-account keys.
pub trait KeyStore: Send + Sync {
    /// Loads the account's key, if one exists.
    fn load(&self, account: AccountId) -> impl Future<Output = Result<Option<AccountKey>>> + Send;

    /// Stores `candidate` unless a key already exists, and returns whichever
    /// key is stored afterwards.
    ///
    /// Must be atomic: concurrent callers with different candidates all get
    /// the same key back.
    fn provision(
        &self,
        account: AccountId,
        candidate: AccountKey,
    ) -> impl Future<Output = Result<AccountKey>> + Send;

    /// Opaque reference recorded in account settings.
    fn key_ref(&self, account: AccountId) -> String;
}

/// Encrypts and decrypts stored credentials with per-account keys.
#[derive(Debug, Clone)]
pub struct CredentialVault<K> {
    keys: K,
}

impl<K: KeyStore> CredentialVault<K> {
    /// Creates a vault backed by `keys`.
    pub const fn new(keys: K) -> Self {
        Self { keys }
    }

    /// Returns the key store.
    pub const fn key_store(&self) -> &K {
        &self.keys
    }

    /// Makes sure the account has a key and returns its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store fails.
    pub async fn ensure_key(&self, account: AccountId) -> Result<String> {
        self.key_for(account).await?;
        Ok(self.keys.key_ref(account))
    }

    /// Encrypts `plaintext` for `account`, provisioning a key if needed.
    ///
    /// A fresh nonce is drawn for every call, so equal plaintexts never
    /// produce equal ciphertexts.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store fails or encryption fails.
    pub async fn encrypt(&self, plaintext: &str, account: AccountId) -> Result<String> {
        let key = self.key_for(account).await?;
        let cipher = Aes256Gcm::new(&key.into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypts a string produced by [`encrypt`](Self::encrypt) for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptionError`] if the account has no key, the input is
    /// malformed, or it was encrypted under another key. Key store failures
    /// are returned as-is.
    pub async fn decrypt(&self, ciphertext: &str, account: AccountId) -> Result<String> {
        let key = self
            .keys
            .load(account)
            .await?
            .ok_or(DecryptionError::MissingKey(account))?;

        let combined = BASE64
            .decode(ciphertext)
            .map_err(|e| DecryptionError::Malformed(e.to_string()))?;
        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err(DecryptionError::Malformed(format!(
                "expected at least {} bytes, got {}",
                NONCE_SIZE + TAG_SIZE,
                combined.len()
            ))
            .into());
        }

        let (nonce_bytes, body) = combined.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new(&key.into());
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|_| DecryptionError::Mismatch)?;

        String::from_utf8(plaintext)
            .map_err(|_| DecryptionError::Malformed("plaintext is not UTF-8".into()).into())
    }

    async fn key_for(&self, account: AccountId) -> Result<AccountKey> {
        if let Some(key) = self.keys.load(account).await? {
            return Ok(key);
        }
        let mut candidate = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut candidate);
        let key = self.keys.provision(account, candidate).await?;
        debug!(account = %account, "Provisioned account key");
        Ok(key)
    }
}

fn encode_key(key: &AccountKey) -> String {
    BASE64.encode(key)
}

fn decode_key(encoded: &str) -> Result<AccountKey> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| DecryptionError::Malformed(format!("stored key: {e}")))?;
    AccountKey::try_from(bytes.as_slice()).map_err(|_| {
        DecryptionError::Malformed(format!("stored key has {} bytes", bytes.len())).into()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Database;

    async fn vault() -> CredentialVault<SqliteKeyStore> {
        CredentialVault::new(Database::in_memory().await.unwrap().keys())
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn decrypt_inverts_encrypt(plaintext in ".*") {
            let rt = runtime();
            let (round_trip, c1, c2) = rt.block_on(async {
                let vault = vault().await;
                let account = AccountId::new(1);
                let c1 = vault.encrypt(&plaintext, account).await.unwrap();
                let c2 = vault.encrypt(&plaintext, account).await.unwrap();
                (vault.decrypt(&c1, account).await.unwrap(), c1, c2)
            });
            prop_assert_eq!(round_trip, plaintext);
            prop_assert_ne!(c1, c2);
        }
    }

    #[tokio::test]
    async fn other_account_cannot_decrypt() {
        let vault = vault().await;
        let alice = AccountId::new(1);
        let bob = AccountId::new(2);
        let ciphertext = vault.encrypt("secret", alice).await.unwrap();
        vault.ensure_key(bob).await.unwrap();

        let err = vault.decrypt(&ciphertext, bob).await.unwrap_err();
        assert!(matches!(err, Error::Decryption(DecryptionError::Mismatch)));
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let vault = vault().await;
        let err = vault.decrypt("AAAA", AccountId::new(9)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Decryption(DecryptionError::MissingKey(AccountId(9)))
        ));
    }

    #[tokio::test]
    async fn malformed_ciphertext_is_reported() {
        let vault = vault().await;
        let account = AccountId::new(1);
        vault.ensure_key(account).await.unwrap();

        let err = vault.decrypt("not base64!", account).await.unwrap_err();
        assert!(matches!(err, Error::Decryption(DecryptionError::Malformed(_))));

        let short = BASE64.encode([0u8; 8]);
        let err = vault.decrypt(&short, account).await.unwrap_err();
        assert!(matches!(err, Error::Decryption(DecryptionError::Malformed(_))));
    }

    #[tokio::test]
    async fn tampered_ciphertext_is_a_mismatch() {
        let vault = vault().await;
        let account = AccountId::new(1);
        let ciphertext = vault.encrypt("secret", account).await.unwrap();
        let mut raw = BASE64.decode(&ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        let err = vault.decrypt(&BASE64.encode(raw), account).await.unwrap_err();
        assert!(matches!(err, Error::Decryption(DecryptionError::Mismatch)));
    }

    #[tokio::test]
    async fn key_is_provisioned_once() {
        let vault = vault().await;
        let account = AccountId::new(1);
        vault.ensure_key(account).await.unwrap();
        let first = vault.key_store().load(account).await.unwrap().unwrap();
        vault.encrypt("x", account).await.unwrap();
        let second = vault.key_store().load(account).await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stored_key_length_is_checked() {
        assert!(decode_key(&BASE64.encode([1u8; 16])).is_err());
        let key = [7u8; KEY_SIZE];
        assert_eq!(decode_key(&encode_key(&key)).unwrap(), key);
    }
}
