//! Cache model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Metadata of one attachment. Content is not cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    /// File name from `Content-Disposition` or `Content-Type`.
    pub filename: Option<String>,
    /// Media type, e.g. `application/pdf`.
    pub content_type: String,
    /// Decoded size in bytes.
    pub size: usize,
}

/// A cached message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMessage {
    /// Surrogate row ID; `None` until stored.
    pub id: Option<i64>,
    /// Owning account.
    pub account_id: AccountId,
    /// Folder the message lives in.
    pub folder: String,
    /// Remote identifier within `folder`.
    pub uid: u32,
    /// `Message-ID` header.
    pub message_id: Option<String>,
    /// Sender.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind-copy recipients (only known for our own sent mail).
    pub bcc: Vec<String>,
    /// `Reply-To` header.
    pub reply_to: Option<String>,
    /// Decoded subject.
    pub subject: String,
    /// Message date.
    pub date: DateTime<Utc>,
    /// Plain-text body.
    pub text_body: Option<String>,
    /// Markup body.
    pub html_body: Option<String>,
    /// Attachment metadata.
    pub attachments: Vec<AttachmentMeta>,
    /// Raw protocol flags in server order.
    pub flags: Vec<String>,
    /// `\Seen` is set.
    pub is_read: bool,
    /// `\Flagged` is set.
    pub is_flagged: bool,
}

impl CachedMessage {
    /// Returns true if everything except the row ID matches.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        Self { id: None, ..self.clone() } == Self { id: None, ..other.clone() }
    }

    /// Returns true if the message has attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// What an upsert did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was created.
    Inserted,
    /// An existing row was rewritten.
    Updated,
    /// The stored row already matched; nothing was written.
    Unchanged,
}
