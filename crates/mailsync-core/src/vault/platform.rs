//! Keys stored in the platform keyring.
//!
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use std::future::Future;

use keyring::Entry;
use tokio::sync::Mutex;
use tracing::debug;

use super::{AccountKey, KeyStore, decode_key, encode_key};
use crate::account::AccountId;
use crate::{Error, Result};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailsync";

/// Key store backed by the system keyring.
///
/// The keyring has no insert-if-absent primitive, so provisioning is
/// serialized within the process.
#[derive(Debug, Default)]
pub struct KeyringKeyStore {
    provision_lock: Mutex<()>,
}

impl KeyringKeyStore {
    /// Creates a keyring-backed store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn entry_name(account: AccountId) -> String {
    format!("{SERVICE_NAME}_account_key_{account}")
}

fn read_entry(account: AccountId) -> Result<Option<AccountKey>> {
    let entry = Entry::new(SERVICE_NAME, &entry_name(account))?;
    match entry.get_password() {
        Ok(encoded) => decode_key(&encoded).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_entry(account: AccountId, key: &AccountKey) -> Result<()> {
    let entry = Entry::new(SERVICE_NAME, &entry_name(account))?;
    entry.set_password(&encode_key(key))?;
    debug!(account = %account, "Stored account key in keyring");
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

impl KeyStore for KeyringKeyStore {
    fn load(&self, account: AccountId) -> impl Future<Output = Result<Option<AccountKey>>> + Send {
        blocking(move || read_entry(account))
    }

    fn provision(
        &self,
        account: AccountId,
        candidate: AccountKey,
    ) -> impl Future<Output = Result<AccountKey>> + Send {
        async move {
            let _guard = self.provision_lock.lock().await;
            blocking(move || {
                if let Some(existing) = read_entry(account)? {
                    return Ok(existing);
                }
                write_entry(account, &candidate)?;
                Ok(candidate)
            })
            .await
        }
    }

    fn key_ref(&self, account: AccountId) -> String {
        format!("keyring:{}", entry_name(account))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::CredentialVault;

    #[test]
    fn key_ref_names_the_entry() {
        let store = KeyringKeyStore::new();
        assert_eq!(
            store.key_ref(AccountId::new(4)),
            "keyring:mailsync_account_key_4"
        );
    }

    #[tokio::test]
    #[ignore = "requires a platform keyring"]
    async fn keyring_round_trip() {
        let vault = CredentialVault::new(KeyringKeyStore::new());
        let account = AccountId::new(987_654);
        let ciphertext = vault.encrypt("secret", account).await.unwrap();
        assert_eq!(vault.decrypt(&ciphertext, account).await.unwrap(), "secret");
        let entry = Entry::new(SERVICE_NAME, &entry_name(account)).unwrap();
        let _ = entry.delete_credential();
    }
}
