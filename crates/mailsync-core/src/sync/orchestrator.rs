//! Orchestrator operations.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::factory::{ClientFactory, NetworkClients};
use super::phase::{SyncPhase, SyncRun};
use crate::account::{
    AccountContext, AccountId, AccountSettings, NewAccountSettings, ServerSettings, Signature,
};
use crate::cache::{CachedMessage, UpsertOutcome};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::service::{Dispatcher, FetchStage, OutgoingMessage, RemoteMailbox, RemoteMessage};
use crate::vault::{CredentialVault, KeyStore, SqliteKeyStore};

const SEEN: &str = "\\Seen";
const DRAFT: &str = "\\Draft";

/// Outcome of one `sync_messages` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Folder that was synced.
    pub folder: String,
    /// Messages returned by the remote mailbox.
    pub fetched: usize,
    /// New cache rows.
    pub inserted: usize,
    /// Rewritten cache rows.
    pub updated: usize,
    /// Rows that already matched.
    pub unchanged: usize,
}

/// Outcome of `send_email`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Whether a copy was stored in the sent folder. Sending succeeded
    /// either way.
    pub archived: bool,
}

/// Coordinates the vault, the cache and the protocol clients.
pub struct SyncOrchestrator<F, K = SqliteKeyStore> {
    db: Database,
    vault: CredentialVault<K>,
    config: EngineConfig,
    factory: F,
    permits: Mutex<HashMap<AccountId, Arc<Semaphore>>>,
}

impl SyncOrchestrator<NetworkClients> {
    /// Orchestrator over real IMAP/SMTP with keys stored in the database.
    #[must_use]
    pub fn with_network(db: Database, config: EngineConfig) -> Self {
        let vault = CredentialVault::new(db.keys());
        Self::new(db, vault, config, NetworkClients)
    }
}

impl<F: ClientFactory, K: KeyStore> SyncOrchestrator<F, K> {
    /// Creates an orchestrator.
    pub fn new(db: Database, vault: CredentialVault<K>, config: EngineConfig, factory: F) -> Self {
        Self {
            db,
            vault,
            config,
            factory,
            permits: Mutex::new(HashMap::new()),
        }
    }

    /// Engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying database.
    pub const fn database(&self) -> &Database {
        &self.db
    }

    // ========== Settings ==========

    /// Returns true if the account has stored settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn has_settings(&self, ctx: &AccountContext) -> Result<bool> {
        self.db.settings().exists(ctx.account_id).await
    }

    /// Accounts with stored settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn account_ids(&self) -> Result<Vec<AccountId>> {
        self.db.settings().account_ids().await
    }

    /// Stores settings, encrypting both passwords independently.
    ///
    /// The account's key is provisioned here on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the database write fails.
    pub async fn save_settings(
        &self,
        ctx: &AccountContext,
        new: NewAccountSettings,
    ) -> Result<AccountSettings> {
        let account = ctx.account_id;
        let key_ref = self.vault.ensure_key(account).await?;
        let imap_password = self.vault.encrypt(&new.imap.password, account).await?;
        let smtp_password = self.vault.encrypt(&new.smtp.password, account).await?;

        let settings = AccountSettings {
            account_id: account,
            imap: new.imap.with_password(imap_password),
            smtp: new.smtp.with_password(smtp_password),
            sender_address: new.sender_address,
            sync_enabled: new.sync_enabled,
            sync_interval_secs: new.sync_interval_secs,
            last_synced_at: None,
            key_ref,
        };
        self.db.settings().save(&settings).await?;
        info!(account = %account, "Saved account settings");
        self.settings(ctx).await
    }

    /// Stored settings (passwords still encrypted).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the account has no settings.
    pub async fn settings(&self, ctx: &AccountContext) -> Result<AccountSettings> {
        self.db
            .settings()
            .get(ctx.account_id)
            .await?
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "Email settings not configured for account {}",
                    ctx.account_id
                ))
            })
    }

    /// Stores the account's signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn save_signature(&self, ctx: &AccountContext, signature: &Signature) -> Result<()> {
        self.db
            .settings()
            .save_signature(ctx.account_id, signature)
            .await
    }

    /// The account's signature, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn signature(&self, ctx: &AccountContext) -> Result<Option<Signature>> {
        self.db.settings().signature(ctx.account_id).await
    }

    /// Returns true when the account is due for a background sync at `now`.
    /// Accounts without settings are never due.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn sync_due(&self, ctx: &AccountContext, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .db
            .settings()
            .get(ctx.account_id)
            .await?
            .is_some_and(|s| s.is_sync_due(now)))
    }

    // ========== Sync ==========

    /// Pulls the most recent `limit` messages of `folder` into the cache.
    ///
    /// Rows are upserted by `(account, uid, folder)`; rows for messages that
    /// vanished remotely are left alone (see
    /// [`reconcile_folder`](Self::reconcile_folder)).
    ///
    /// # Errors
    ///
    /// Returns an error if settings are missing, credentials cannot be
    /// decrypted, the remote mailbox fails, or the cache write fails.
    pub async fn sync_messages(
        &self,
        ctx: &AccountContext,
        folder: &str,
        limit: Option<usize>,
    ) -> Result<SyncReport> {
        let mut run = SyncRun::new(ctx.account_id, folder);
        self.sync_messages_with(ctx, folder, limit, &mut run).await
    }

    /// [`sync_messages`](Self::sync_messages), recording phases in `run`.
    ///
    /// # Errors
    ///
    /// See [`sync_messages`](Self::sync_messages).
    pub async fn sync_messages_with(
        &self,
        ctx: &AccountContext,
        folder: &str,
        limit: Option<usize>,
        run: &mut SyncRun,
    ) -> Result<SyncReport> {
        let result = self.drive_sync(ctx, folder, limit, run).await;
        match &result {
            Ok(report) => {
                run.finish();
                info!(
                    account = %ctx.account_id,
                    folder,
                    fetched = report.fetched,
                    inserted = report.inserted,
                    updated = report.updated,
                    "Sync complete"
                );
            }
            Err(e) => run.fail(e),
        }
        result
    }

    async fn drive_sync(
        &self,
        ctx: &AccountContext,
        folder: &str,
        limit: Option<usize>,
        run: &mut SyncRun,
    ) -> Result<SyncReport> {
        let account = ctx.account_id;
        let _permit = self.permit(account).await?;

        run.advance(SyncPhase::Connecting);
        let mailbox = self.mailbox(ctx).await?;
        let messages = mailbox
            .fetch_messages_with(folder, limit, &mut |stage: FetchStage| run.observe(stage))
            .await?;

        run.advance(SyncPhase::Merging);
        let cache = self.db.cache();
        let mut report = SyncReport {
            folder: folder.to_string(),
            fetched: messages.len(),
            ..SyncReport::default()
        };
        for message in messages {
            match cache.upsert(&to_cached(account, folder, message)).await? {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
        }

        self.db.settings().mark_synced(account, Utc::now()).await?;
        Ok(report)
    }

    /// Re-fetches one message and upserts it.
    ///
    /// Returns `None`, leaving the cache untouched, if the message no longer
    /// exists remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch or the cache write fails.
    pub async fn refresh_message(
        &self,
        ctx: &AccountContext,
        uid: u32,
        folder: &str,
    ) -> Result<Option<CachedMessage>> {
        let account = ctx.account_id;
        let _permit = self.permit(account).await?;
        let mailbox = self.mailbox(ctx).await?;

        let Some(message) = mailbox.fetch_message(uid, folder).await? else {
            debug!(account = %account, folder, uid, "Message absent remotely");
            return Ok(None);
        };
        let cache = self.db.cache();
        cache.upsert(&to_cached(account, folder, message)).await?;
        cache.get(account, folder, uid).await
    }

    /// Deletes cache rows of `folder` whose identifier no longer exists
    /// remotely. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or the cache write fails.
    pub async fn reconcile_folder(&self, ctx: &AccountContext, folder: &str) -> Result<u64> {
        let account = ctx.account_id;
        let _permit = self.permit(account).await?;
        let mailbox = self.mailbox(ctx).await?;

        let present = mailbox.list_identifiers(folder).await?;
        let removed = self
            .db
            .cache()
            .remove_absent(account, folder, &present)
            .await?;
        info!(account = %account, folder, removed, "Reconciled folder");
        Ok(removed)
    }

    /// Every folder name of the remote account.
    ///
    /// # Errors
    ///
    /// Returns an error if settings are missing or listing fails.
    pub async fn list_folders(&self, ctx: &AccountContext) -> Result<Vec<String>> {
        let _permit = self.permit(ctx.account_id).await?;
        let mailbox = self.mailbox(ctx).await?;
        Ok(mailbox.list_folders().await?)
    }

    // ========== Mutations ==========

    /// Sets `\Seen` remotely, then marks the cache row read.
    ///
    /// The cache is not touched if the remote update fails. A missing cache
    /// row is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote update or the cache write fails.
    pub async fn mark_as_read(&self, ctx: &AccountContext, uid: u32, folder: &str) -> Result<()> {
        let account = ctx.account_id;
        let _permit = self.permit(account).await?;
        let mailbox = self.mailbox(ctx).await?;

        mailbox
            .update_flags(uid, &[SEEN.to_string()], folder)
            .await?;
        if !self.db.cache().set_read(account, folder, uid, true).await? {
            debug!(account = %account, folder, uid, "Marked read remotely; not cached");
        }
        Ok(())
    }

    /// Moves a message into the trash folder and re-keys its cache row.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote move or the cache write fails.
    pub async fn move_to_trash(
        &self,
        ctx: &AccountContext,
        uid: u32,
        from_folder: &str,
    ) -> Result<()> {
        let account = ctx.account_id;
        let trash = self.config.folders.trash.as_str();
        let _permit = self.permit(account).await?;
        let mailbox = self.mailbox(ctx).await?;

        let new_uid = mailbox.move_message(uid, from_folder, trash).await?;
        let moved = self
            .db
            .cache()
            .relocate(account, from_folder, uid, trash, new_uid)
            .await?;
        if !moved {
            debug!(account = %account, folder = from_folder, uid, "Moved remotely; not cached");
        }
        Ok(())
    }

    /// Permanently deletes a message remotely, then drops its cache row.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote delete or the cache write fails.
    pub async fn delete_message(&self, ctx: &AccountContext, uid: u32, folder: &str) -> Result<()> {
        let account = ctx.account_id;
        let _permit = self.permit(account).await?;
        let mailbox = self.mailbox(ctx).await?;

        mailbox.delete_message(uid, folder).await?;
        self.db.cache().delete(account, folder, uid).await?;
        info!(account = %account, folder, uid, "Deleted message");
        Ok(())
    }

    /// Sends `message` with the account's signature, then stores a copy in
    /// the sent folder.
    ///
    /// An empty `from` is filled with the account's sender address. Failure
    /// to store the copy is logged and reported as `archived: false`.
    ///
    /// # Errors
    ///
    /// Returns an error if settings are missing, credentials cannot be
    /// decrypted, or dispatch fails.
    pub async fn send_email(
        &self,
        ctx: &AccountContext,
        mut message: OutgoingMessage,
    ) -> Result<SendReport> {
        let account = ctx.account_id;
        let settings = self.settings(ctx).await?;
        if message.from.trim().is_empty() {
            message.from = settings.sender().to_string();
        }
        let signature = self
            .signature(ctx)
            .await?
            .filter(Signature::is_usable);

        let _permit = self.permit(account).await?;
        let smtp = self.decrypted(account, &settings.smtp).await?;
        let dispatcher = self.factory.dispatcher(smtp, self.config.timeouts);
        dispatcher
            .send_with_signature(&message, signature.as_ref())
            .await?;
        info!(account = %account, "Email sent");

        let sent_copy = match &signature {
            Some(sig) => message.with_signature(sig),
            None => message,
        };
        let archived = match self.archive_sent(account, &settings, &sent_copy).await {
            Ok(()) => true,
            Err(e) => {
                warn!(account = %account, error = %e, "Failed to store sent copy");
                false
            }
        };
        Ok(SendReport { archived })
    }

    async fn archive_sent(
        &self,
        account: AccountId,
        settings: &AccountSettings,
        message: &OutgoingMessage,
    ) -> Result<()> {
        let imap = self.decrypted(account, &settings.imap).await?;
        let mailbox = self.factory.mailbox(imap, self.config.timeouts);
        let raw = message.to_folder_copy(Utc::now(), false);
        mailbox
            .append_message(&self.config.folders.sent, raw.as_bytes(), &[SEEN.to_string()])
            .await?;
        Ok(())
    }

    /// Stores `message` in the drafts folder with `\Draft`. Drafts are not
    /// cached. Returns the assigned identifier when the server reports it.
    ///
    /// # Errors
    ///
    /// Returns an error if settings are missing or the append fails.
    pub async fn save_draft(
        &self,
        ctx: &AccountContext,
        mut message: OutgoingMessage,
    ) -> Result<Option<u32>> {
        let account = ctx.account_id;
        let settings = self.settings(ctx).await?;
        if message.from.trim().is_empty() {
            message.from = settings.sender().to_string();
        }

        let _permit = self.permit(account).await?;
        let imap = self.decrypted(account, &settings.imap).await?;
        let mailbox = self.factory.mailbox(imap, self.config.timeouts);
        let raw = message.to_folder_copy(Utc::now(), true);
        let uid = mailbox
            .append_message(&self.config.folders.drafts, raw.as_bytes(), &[DRAFT.to_string()])
            .await?;
        debug!(account = %account, ?uid, "Saved draft");
        Ok(uid)
    }

    /// Connects and authenticates to the dispatch server without sending.
    /// Any failure, including missing settings, yields false.
    pub async fn verify_dispatch(&self, ctx: &AccountContext) -> bool {
        let account = ctx.account_id;
        let smtp = match self.settings(ctx).await {
            Ok(settings) => self.decrypted(account, &settings.smtp).await,
            Err(e) => Err(e),
        };
        match smtp {
            Ok(server) => {
                self.factory
                    .dispatcher(server, self.config.timeouts)
                    .verify_connection()
                    .await
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Cannot verify dispatch settings");
                false
            }
        }
    }

    // ========== Cache reads ==========

    /// Cached messages of `folder`, newest first. `limit` defaults to the
    /// configured page size.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cached_messages(
        &self,
        ctx: &AccountContext,
        folder: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CachedMessage>> {
        self.db
            .cache()
            .list(
                ctx.account_id,
                folder,
                limit.unwrap_or(self.config.cached_page_size),
            )
            .await
    }

    /// One cached message by remote identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cached_message(
        &self,
        ctx: &AccountContext,
        folder: &str,
        uid: u32,
    ) -> Result<Option<CachedMessage>> {
        self.db.cache().get(ctx.account_id, folder, uid).await
    }

    /// One cached message by row ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn message_by_id(
        &self,
        ctx: &AccountContext,
        id: i64,
    ) -> Result<Option<CachedMessage>> {
        self.db.cache().get_by_id(ctx.account_id, id).await
    }

    // ========== Internals ==========

    async fn permit(&self, account: AccountId) -> Result<OwnedSemaphorePermit> {
        let semaphore = {
            let mut permits = self.permits.lock().await;
            Arc::clone(permits.entry(account).or_insert_with(|| {
                Arc::new(Semaphore::new(self.config.max_connections_per_account.max(1)))
            }))
        };
        semaphore
            .acquire_owned()
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))
    }

    async fn decrypted(&self, account: AccountId, server: &ServerSettings) -> Result<ServerSettings> {
        let password = self.vault.decrypt(&server.password, account).await?;
        Ok(server.with_password(password))
    }

    async fn mailbox(&self, ctx: &AccountContext) -> Result<F::Mailbox> {
        let settings = self.settings(ctx).await?;
        let imap = self.decrypted(ctx.account_id, &settings.imap).await?;
        Ok(self.factory.mailbox(imap, self.config.timeouts))
    }
}

fn to_cached(account: AccountId, folder: &str, message: RemoteMessage) -> CachedMessage {
    let is_read = message.is_read();
    let is_flagged = message.is_flagged();
    CachedMessage {
        id: None,
        account_id: account,
        folder: folder.to_string(),
        uid: message.uid,
        message_id: message.message_id,
        from: message.from,
        to: message.to,
        cc: message.cc,
        bcc: message.bcc,
        reply_to: message.reply_to,
        subject: message.subject,
        date: message.date,
        text_body: message.text_body,
        html_body: message.html_body,
        attachments: message.attachments,
        flags: message.flags,
        is_read,
        is_flagged,
    }
}
