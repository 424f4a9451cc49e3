//! Database handle and schema.

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::Result;
use crate::account::SettingsRepository;
use crate::cache::CacheRepository;
use crate::vault::SqliteKeyStore;

/// Shared `SQLite` pool holding settings, keys and the message cache.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the connection
    /// fails or schema creation fails.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        debug!(path = %path.display(), "Opened database");
        Ok(db)
    }

    /// Creates an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Account settings and signatures.
    #[must_use]
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Local message cache. Outside this crate only its read methods are
    /// reachable; writes go through the orchestrator.
    #[must_use]
    pub fn cache(&self) -> CacheRepository {
        CacheRepository::new(self.pool.clone())
    }

    /// Per-account encryption keys.
    #[must_use]
    pub fn keys(&self) -> SqliteKeyStore {
        SqliteKeyStore::new(self.pool.clone())
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS account_settings (
                account_id INTEGER PRIMARY KEY,
                imap_host TEXT NOT NULL,
                imap_port INTEGER NOT NULL,
                imap_username TEXT NOT NULL,
                imap_password TEXT NOT NULL,
                imap_secure INTEGER NOT NULL,
                smtp_host TEXT NOT NULL,
                smtp_port INTEGER NOT NULL,
                smtp_username TEXT NOT NULL,
                smtp_password TEXT NOT NULL,
                smtp_secure INTEGER NOT NULL,
                sender_address TEXT,
                sync_enabled INTEGER NOT NULL DEFAULT 1,
                sync_interval_secs INTEGER NOT NULL DEFAULT 300,
                last_synced_at TEXT,
                key_ref TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS signatures (
                account_id INTEGER PRIMARY KEY,
                html TEXT,
                text TEXT,
                enabled INTEGER NOT NULL DEFAULT 1
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS account_keys (
                account_id INTEGER PRIMARY KEY,
                key TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cached_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                folder TEXT NOT NULL,
                uid INTEGER NOT NULL,
                message_id TEXT,
                from_addr TEXT NOT NULL,
                to_json TEXT NOT NULL,
                cc_json TEXT NOT NULL,
                bcc_json TEXT NOT NULL,
                reply_to TEXT,
                subject TEXT NOT NULL,
                date TEXT NOT NULL,
                text_body TEXT,
                html_body TEXT,
                attachments_json TEXT NOT NULL,
                flags_json TEXT NOT NULL,
                is_read INTEGER NOT NULL,
                is_flagged INTEGER NOT NULL,
                UNIQUE(account_id, uid, folder)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_cached_messages_folder_date
            ON cached_messages(account_id, folder, date DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
