//! Cache storage repository.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{CachedMessage, UpsertOutcome};
use crate::{Error, Result};
use crate::account::AccountId;

const COLUMNS: &str = "id, account_id, folder, uid, message_id, from_addr, to_json, cc_json, \
                       bcc_json, reply_to, subject, date, text_body, html_body, \
                       attachments_json, flags_json, is_read, is_flagged";

/// Repository for cached messages.
///
/// Other crates get the read side only:
///
/// ```compile_fail
/// # async fn purge(db: mailsync_core::Database) {
/// let _ = db.cache().delete(mailsync_core::AccountId::new(1), "INBOX", 1).await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CacheRepository {
    pool: SqlitePool,
}

impl CacheRepository {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a message keyed by `(account, uid, folder)`.
    ///
    /// Nothing is written when the stored row already matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub(crate) async fn upsert(&self, message: &CachedMessage) -> Result<UpsertOutcome> {
        let existing = self
            .get(message.account_id, &message.folder, message.uid)
            .await?;
        if let Some(existing) = &existing
            && existing.same_content(message)
        {
            return Ok(UpsertOutcome::Unchanged);
        }

        sqlx::query(
            r"
            INSERT INTO cached_messages
                (account_id, folder, uid, message_id, from_addr, to_json, cc_json, bcc_json,
                 reply_to, subject, date, text_body, html_body, attachments_json, flags_json,
                 is_read, is_flagged)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, uid, folder) DO UPDATE SET
                message_id = excluded.message_id,
                from_addr = excluded.from_addr,
                to_json = excluded.to_json,
                cc_json = excluded.cc_json,
                bcc_json = excluded.bcc_json,
                reply_to = excluded.reply_to,
                subject = excluded.subject,
                date = excluded.date,
                text_body = excluded.text_body,
                html_body = excluded.html_body,
                attachments_json = excluded.attachments_json,
                flags_json = excluded.flags_json,
                is_read = excluded.is_read,
                is_flagged = excluded.is_flagged
            ",
        )
        .bind(message.account_id.0)
        .bind(&message.folder)
        .bind(message.uid)
        .bind(&message.message_id)
        .bind(&message.from)
        .bind(serde_json::to_string(&message.to)?)
        .bind(serde_json::to_string(&message.cc)?)
        .bind(serde_json::to_string(&message.bcc)?)
        .bind(&message.reply_to)
        .bind(&message.subject)
        .bind(format_date(message.date))
        .bind(&message.text_body)
        .bind(&message.html_body)
        .bind(serde_json::to_string(&message.attachments)?)
        .bind(serde_json::to_string(&message.flags)?)
        .bind(message.is_read)
        .bind(message.is_flagged)
        .execute(&self.pool)
        .await?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Messages of a folder, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn list(
        &self,
        account_id: AccountId,
        folder: &str,
        limit: u32,
    ) -> Result<Vec<CachedMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cached_messages \
             WHERE account_id = ? AND folder = ? \
             ORDER BY date DESC, uid DESC LIMIT ?"
        ))
        .bind(account_id.0)
        .bind(folder)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }

    /// Message by natural key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupt.
    pub async fn get(
        &self,
        account_id: AccountId,
        folder: &str,
        uid: u32,
    ) -> Result<Option<CachedMessage>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cached_messages \
             WHERE account_id = ? AND folder = ? AND uid = ?"
        ))
        .bind(account_id.0)
        .bind(folder)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    /// Message by surrogate ID, restricted to the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupt.
    pub async fn get_by_id(&self, account_id: AccountId, id: i64) -> Result<Option<CachedMessage>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cached_messages WHERE account_id = ? AND id = ?"
        ))
        .bind(account_id.0)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    /// Sets or clears the read state, keeping the raw `\Seen` flag in step.
    ///
    /// Returns false if no row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub(crate) async fn set_read(
        &self,
        account_id: AccountId,
        folder: &str,
        uid: u32,
        read: bool,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT flags_json FROM cached_messages WHERE account_id = ? AND folder = ? AND uid = ?",
        )
        .bind(account_id.0)
        .bind(folder)
        .bind(uid)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(false);
        };

        let mut flags: Vec<String> = serde_json::from_str(&row.get::<String, _>("flags_json"))?;
        let has_seen = flags.iter().any(|f| f.eq_ignore_ascii_case("\\Seen"));
        if read && !has_seen {
            flags.push("\\Seen".to_string());
        } else if !read {
            flags.retain(|f| !f.eq_ignore_ascii_case("\\Seen"));
        }

        sqlx::query(
            r"
            UPDATE cached_messages SET is_read = ?, flags_json = ?
            WHERE account_id = ? AND folder = ? AND uid = ?
            ",
        )
        .bind(read)
        .bind(serde_json::to_string(&flags)?)
        .bind(account_id.0)
        .bind(folder)
        .bind(uid)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Re-keys a row into another folder under the UID the server assigned.
    ///
    /// A stale row already occupying the target key is replaced, so exactly
    /// one row remains. UIDs are per folder, so without `new_uid` the source
    /// row is dropped instead and the next sync of `to_folder` caches the
    /// message under its real UID. Returns false if the source row did not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub(crate) async fn relocate(
        &self,
        account_id: AccountId,
        from_folder: &str,
        uid: u32,
        to_folder: &str,
        new_uid: Option<u32>,
    ) -> Result<bool> {
        let Some(target_uid) = new_uid else {
            let dropped = self.delete(account_id, from_folder, uid).await?;
            debug!(
                account = %account_id,
                from = from_folder,
                to = to_folder,
                uid,
                "Destination UID unknown; dropped cached row"
            );
            return Ok(dropped);
        };
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query(
            "SELECT 1 FROM cached_messages WHERE account_id = ? AND folder = ? AND uid = ?",
        )
        .bind(account_id.0)
        .bind(from_folder)
        .bind(uid)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
        if !exists {
            return Ok(false);
        }

        sqlx::query("DELETE FROM cached_messages WHERE account_id = ? AND folder = ? AND uid = ?")
            .bind(account_id.0)
            .bind(to_folder)
            .bind(target_uid)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            UPDATE cached_messages SET folder = ?, uid = ?
            WHERE account_id = ? AND folder = ? AND uid = ?
            ",
        )
        .bind(to_folder)
        .bind(target_uid)
        .bind(account_id.0)
        .bind(from_folder)
        .bind(uid)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            account = %account_id,
            from = from_folder,
            to = to_folder,
            uid,
            new_uid = target_uid,
            "Relocated cached message"
        );
        Ok(true)
    }

    /// Removes one row. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub(crate) async fn delete(&self, account_id: AccountId, folder: &str, uid: u32) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM cached_messages WHERE account_id = ? AND folder = ? AND uid = ?",
        )
        .bind(account_id.0)
        .bind(folder)
        .bind(uid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes rows of `folder` whose UID is not in `present`. Returns the
    /// number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub(crate) async fn remove_absent(
        &self,
        account_id: AccountId,
        folder: &str,
        present: &[u32],
    ) -> Result<u64> {
        let present: HashSet<u32> = present.iter().copied().collect();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("SELECT uid FROM cached_messages WHERE account_id = ? AND folder = ?")
            .bind(account_id.0)
            .bind(folder)
            .fetch_all(&mut *tx)
            .await?;
        let stale: Vec<u32> = rows
            .iter()
            .map(|row| row.get::<u32, _>("uid"))
            .filter(|uid| !present.contains(uid))
            .collect();

        let mut removed = 0;
        for uid in stale {
            removed += sqlx::query(
                "DELETE FROM cached_messages WHERE account_id = ? AND folder = ? AND uid = ?",
            )
            .bind(account_id.0)
            .bind(folder)
            .bind(uid)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// Number of cached messages in a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self, account_id: AccountId, folder: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM cached_messages WHERE account_id = ? AND folder = ?",
        )
        .bind(account_id.0)
        .bind(folder)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn row_to_message(row: &SqliteRow) -> Result<CachedMessage> {
    let date = DateTime::parse_from_rfc3339(&row.get::<String, _>("date"))
        .map_err(|e| Error::Corrupt(format!("cached message date: {e}")))?
        .with_timezone(&Utc);

    Ok(CachedMessage {
        id: Some(row.get("id")),
        account_id: AccountId(row.get::<i64, _>("account_id")),
        folder: row.get("folder"),
        uid: row.get::<u32, _>("uid"),
        message_id: row.get("message_id"),
        from: row.get("from_addr"),
        to: serde_json::from_str(&row.get::<String, _>("to_json"))?,
        cc: serde_json::from_str(&row.get::<String, _>("cc_json"))?,
        bcc: serde_json::from_str(&row.get::<String, _>("bcc_json"))?,
        reply_to: row.get("reply_to"),
        subject: row.get("subject"),
        date,
        text_body: row.get("text_body"),
        html_body: row.get("html_body"),
        attachments: serde_json::from_str(&row.get::<String, _>("attachments_json"))?,
        flags: serde_json::from_str(&row.get::<String, _>("flags_json"))?,
        is_read: row.get::<bool, _>("is_read"),
        is_flagged: row.get::<bool, _>("is_flagged"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::cache::AttachmentMeta;
    use crate::Database;

    fn message(uid: u32, folder: &str, day: u32) -> CachedMessage {
        CachedMessage {
            id: None,
            account_id: AccountId::new(1),
            folder: folder.into(),
            uid,
            message_id: Some(format!("<{uid}@example.com>")),
            from: "alice@example.com".into(),
            to: vec!["bob@example.com".into()],
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: None,
            subject: format!("Message {uid}"),
            date: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            text_body: Some("hello".into()),
            html_body: None,
            attachments: vec![AttachmentMeta {
                filename: Some("a.pdf".into()),
                content_type: "application/pdf".into(),
                size: 10,
            }],
            flags: Vec::new(),
            is_read: false,
            is_flagged: false,
        }
    }

    async fn repo() -> CacheRepository {
        Database::in_memory().await.unwrap().cache()
    }

    #[tokio::test]
    async fn upsert_reports_outcome() {
        let repo = repo().await;
        let mut msg = message(1, "INBOX", 1);
        assert_eq!(repo.upsert(&msg).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(repo.upsert(&msg).await.unwrap(), UpsertOutcome::Unchanged);

        msg.flags = vec!["\\Flagged".into()];
        msg.is_flagged = true;
        assert_eq!(repo.upsert(&msg).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(repo.count(AccountId::new(1), "INBOX").await.unwrap(), 1);

        let stored = repo.get(AccountId::new(1), "INBOX", 1).await.unwrap().unwrap();
        assert!(stored.is_flagged);
        assert!(stored.same_content(&msg));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let repo = repo().await;
        for (uid, day) in [(1, 5), (2, 9), (3, 2)] {
            repo.upsert(&message(uid, "INBOX", day)).await.unwrap();
        }
        let uids: Vec<u32> = repo
            .list(AccountId::new(1), "INBOX", 50)
            .await
            .unwrap()
            .iter()
            .map(|m| m.uid)
            .collect();
        assert_eq!(uids, vec![2, 1, 3]);

        let page = repo.list(AccountId::new(1), "INBOX", 1).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn same_uid_in_two_folders_is_two_rows() {
        let repo = repo().await;
        repo.upsert(&message(7, "INBOX", 1)).await.unwrap();
        repo.upsert(&message(7, "Archive", 1)).await.unwrap();
        assert_eq!(repo.count(AccountId::new(1), "INBOX").await.unwrap(), 1);
        assert_eq!(repo.count(AccountId::new(1), "Archive").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_by_id_is_account_scoped() {
        let repo = repo().await;
        repo.upsert(&message(1, "INBOX", 1)).await.unwrap();
        let id = repo
            .get(AccountId::new(1), "INBOX", 1)
            .await
            .unwrap()
            .unwrap()
            .id
            .unwrap();
        assert!(repo.get_by_id(AccountId::new(1), id).await.unwrap().is_some());
        assert!(repo.get_by_id(AccountId::new(2), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_read_tracks_seen_flag() {
        let repo = repo().await;
        repo.upsert(&message(1, "INBOX", 1)).await.unwrap();
        assert!(repo.set_read(AccountId::new(1), "INBOX", 1, true).await.unwrap());
        let stored = repo.get(AccountId::new(1), "INBOX", 1).await.unwrap().unwrap();
        assert!(stored.is_read);
        assert_eq!(stored.flags, vec!["\\Seen".to_string()]);

        assert!(!repo.set_read(AccountId::new(1), "INBOX", 99, true).await.unwrap());
    }

    #[tokio::test]
    async fn relocate_replaces_stale_target() {
        let repo = repo().await;
        repo.upsert(&message(4, "INBOX", 1)).await.unwrap();
        repo.upsert(&message(12, "Trash", 3)).await.unwrap();

        assert!(
            repo.relocate(AccountId::new(1), "INBOX", 4, "Trash", Some(12))
                .await
                .unwrap()
        );
        assert_eq!(repo.count(AccountId::new(1), "INBOX").await.unwrap(), 0);
        assert_eq!(repo.count(AccountId::new(1), "Trash").await.unwrap(), 1);
        let moved = repo.get(AccountId::new(1), "Trash", 12).await.unwrap().unwrap();
        assert_eq!(moved.subject, "Message 4");

        assert!(
            !repo
                .relocate(AccountId::new(1), "INBOX", 4, "Trash", None)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn relocate_without_new_uid_keeps_unrelated_target() {
        let repo = repo().await;
        repo.upsert(&message(5, "INBOX", 1)).await.unwrap();
        let mut unrelated = message(5, "Trash", 2);
        unrelated.subject = "Already in trash".into();
        repo.upsert(&unrelated).await.unwrap();

        assert!(
            repo.relocate(AccountId::new(1), "INBOX", 5, "Trash", None)
                .await
                .unwrap()
        );
        assert_eq!(repo.count(AccountId::new(1), "INBOX").await.unwrap(), 0);
        let kept = repo.get(AccountId::new(1), "Trash", 5).await.unwrap().unwrap();
        assert_eq!(kept.subject, "Already in trash");
        assert_eq!(repo.count(AccountId::new(1), "Trash").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unreadable_date_is_an_error() {
        let repo = repo().await;
        repo.upsert(&message(1, "INBOX", 1)).await.unwrap();
        sqlx::query("UPDATE cached_messages SET date = 'yesterday' WHERE uid = 1")
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.get(AccountId::new(1), "INBOX", 1).await.unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        assert!(repo.list(AccountId::new(1), "INBOX", 10).await.is_err());
    }

    #[tokio::test]
    async fn remove_absent_only_touches_folder() {
        let repo = repo().await;
        for uid in 1..=4 {
            repo.upsert(&message(uid, "INBOX", 1)).await.unwrap();
        }
        repo.upsert(&message(2, "Archive", 1)).await.unwrap();

        let removed = repo
            .remove_absent(AccountId::new(1), "INBOX", &[1, 3])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count(AccountId::new(1), "INBOX").await.unwrap(), 2);
        assert_eq!(repo.count(AccountId::new(1), "Archive").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let repo = repo().await;
        repo.upsert(&message(1, "INBOX", 1)).await.unwrap();
        assert!(repo.delete(AccountId::new(1), "INBOX", 1).await.unwrap());
        assert!(!repo.delete(AccountId::new(1), "INBOX", 1).await.unwrap());
    }
}
