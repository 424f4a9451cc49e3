//! Keys stored in the engine database.

use std::future::Future;

use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::{AccountKey, KeyStore, decode_key, encode_key};
use crate::Result;
use crate::account::AccountId;

/// Key store backed by the `account_keys` table.
#[derive(Debug, Clone)]
pub struct SqliteKeyStore {
    pool: SqlitePool,
}

impl SqliteKeyStore {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_key(&self, account: AccountId) -> Result<Option<AccountKey>> {
        let row = sqlx::query("SELECT key FROM account_keys WHERE account_id = ?")
            .bind(account.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_key(&row.get::<String, _>("key")))
            .transpose()
    }

    async fn provision_key(&self, account: AccountId, candidate: AccountKey) -> Result<AccountKey> {
        // First writer wins; losers read the winner's key back.
        sqlx::query("INSERT OR IGNORE INTO account_keys (account_id, key) VALUES (?, ?)")
            .bind(account.0)
            .bind(encode_key(&candidate))
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT key FROM account_keys WHERE account_id = ?")
            .bind(account.0)
            .fetch_one(&self.pool)
            .await?;
        decode_key(&row.get::<String, _>("key"))
    }
}

impl KeyStore for SqliteKeyStore {
    fn load(&self, account: AccountId) -> impl Future<Output = Result<Option<AccountKey>>> + Send {
        self.load_key(account)
    }

    fn provision(
        &self,
        account: AccountId,
        candidate: AccountKey,
    ) -> impl Future<Output = Result<AccountKey>> + Send {
        self.provision_key(account, candidate)
    }

    fn key_ref(&self, account: AccountId) -> String {
        format!("sqlite:account_keys/{account}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn provision_keeps_first_key() {
        let store = Database::in_memory().await.unwrap().keys();
        let account = AccountId::new(1);
        assert!(store.load(account).await.unwrap().is_none());

        let first = store.provision(account, [1u8; 32]).await.unwrap();
        let second = store.provision(account, [2u8; 32]).await.unwrap();
        assert_eq!(first, [1u8; 32]);
        assert_eq!(second, [1u8; 32]);
        assert_eq!(store.load(account).await.unwrap(), Some([1u8; 32]));
        assert_eq!(store.key_ref(account), "sqlite:account_keys/1");
    }
}
