//! Settings storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{AccountId, AccountSettings, ServerSettings, Signature};
use crate::Result;

/// Repository for account settings and signatures.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns true if settings exist for the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, account_id: AccountId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM account_settings WHERE account_id = ?")
            .bind(account_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Get settings for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, account_id: AccountId) -> Result<Option<AccountSettings>> {
        let row = sqlx::query(
            r"
            SELECT account_id,
                   imap_host, imap_port, imap_username, imap_password, imap_secure,
                   smtp_host, smtp_port, smtp_username, smtp_password, smtp_secure,
                   sender_address, sync_enabled, sync_interval_secs, last_synced_at, key_ref
            FROM account_settings
            WHERE account_id = ?
            ",
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_settings))
    }

    /// IDs of every account with stored settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn account_ids(&self) -> Result<Vec<AccountId>> {
        let rows = sqlx::query("SELECT account_id FROM account_settings ORDER BY account_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| AccountId(row.get::<i64, _>("account_id")))
            .collect())
    }

    /// Insert or replace settings. `last_synced_at` of an existing row is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, settings: &AccountSettings) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO account_settings (
                account_id,
                imap_host, imap_port, imap_username, imap_password, imap_secure,
                smtp_host, smtp_port, smtp_username, smtp_password, smtp_secure,
                sender_address, sync_enabled, sync_interval_secs, last_synced_at, key_ref
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                imap_host = excluded.imap_host,
                imap_port = excluded.imap_port,
                imap_username = excluded.imap_username,
                imap_password = excluded.imap_password,
                imap_secure = excluded.imap_secure,
                smtp_host = excluded.smtp_host,
                smtp_port = excluded.smtp_port,
                smtp_username = excluded.smtp_username,
                smtp_password = excluded.smtp_password,
                smtp_secure = excluded.smtp_secure,
                sender_address = excluded.sender_address,
                sync_enabled = excluded.sync_enabled,
                sync_interval_secs = excluded.sync_interval_secs,
                key_ref = excluded.key_ref
            ",
        )
        .bind(settings.account_id.0)
        .bind(&settings.imap.host)
        .bind(i64::from(settings.imap.port))
        .bind(&settings.imap.username)
        .bind(&settings.imap.password)
        .bind(settings.imap.secure)
        .bind(&settings.smtp.host)
        .bind(i64::from(settings.smtp.port))
        .bind(&settings.smtp.username)
        .bind(&settings.smtp.password)
        .bind(settings.smtp.secure)
        .bind(&settings.sender_address)
        .bind(settings.sync_enabled)
        .bind(i64::try_from(settings.sync_interval_secs).unwrap_or(i64::MAX))
        .bind(settings.last_synced_at.map(|t| t.to_rfc3339()))
        .bind(&settings.key_ref)
        .execute(&self.pool)
        .await?;

        debug!(account = %settings.account_id, "Saved account settings");
        Ok(())
    }

    /// Record a completed sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_synced(&self, account_id: AccountId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE account_settings SET last_synced_at = ? WHERE account_id = ?")
            .bind(at.to_rfc3339())
            .bind(account_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get the account's signature, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn signature(&self, account_id: AccountId) -> Result<Option<Signature>> {
        let row = sqlx::query("SELECT html, text, enabled FROM signatures WHERE account_id = ?")
            .bind(account_id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Signature {
            html: row.get("html"),
            text: row.get("text"),
            enabled: row.get::<bool, _>("enabled"),
        }))
    }

    /// Insert or replace the account's signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save_signature(&self, account_id: AccountId, signature: &Signature) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO signatures (account_id, html, text, enabled)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                html = excluded.html,
                text = excluded.text,
                enabled = excluded.enabled
            ",
        )
        .bind(account_id.0)
        .bind(&signature.html)
        .bind(&signature.text)
        .bind(signature.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_settings(row: &SqliteRow) -> AccountSettings {
    let last_synced_at = row
        .get::<Option<String>, _>("last_synced_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc));

    AccountSettings {
        account_id: AccountId(row.get::<i64, _>("account_id")),
        imap: ServerSettings {
            host: row.get("imap_host"),
            port: row.get::<u16, _>("imap_port"),
            username: row.get("imap_username"),
            password: row.get("imap_password"),
            secure: row.get::<bool, _>("imap_secure"),
        },
        smtp: ServerSettings {
            host: row.get("smtp_host"),
            port: row.get::<u16, _>("smtp_port"),
            username: row.get("smtp_username"),
            password: row.get("smtp_password"),
            secure: row.get::<bool, _>("smtp_secure"),
        },
        sender_address: row.get("sender_address"),
        sync_enabled: row.get::<bool, _>("sync_enabled"),
        sync_interval_secs: u64::try_from(row.get::<i64, _>("sync_interval_secs")).unwrap_or(0),
        last_synced_at,
        key_ref: row.get("key_ref"),
    }
}
