//! Account model types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scope of a single engine call.
///
/// Every orchestrator operation takes one explicitly instead of looking up
/// "the current user".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountContext {
    /// Account the operation acts on.
    pub account_id: AccountId,
}

impl AccountContext {
    /// Creates a context for `account_id`.
    #[must_use]
    pub const fn new(account_id: AccountId) -> Self {
        Self { account_id }
    }
}

/// One protocol endpoint.
///
/// In [`AccountSettings`] the password is vault ciphertext; in
/// [`NewAccountSettings`] it is plaintext.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    /// Password (see type docs).
    pub password: String,
    /// Use TLS. For dispatch, ports 465 and 587 override this.
    pub secure: bool,
}

impl ServerSettings {
    /// Creates endpoint settings.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        secure: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            secure,
        }
    }

    /// Copy with the password replaced.
    #[must_use]
    pub fn with_password(&self, password: String) -> Self {
        Self {
            password,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .finish()
    }
}

/// Stored settings for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSettings {
    /// Owning account.
    pub account_id: AccountId,
    /// Retrieval endpoint (encrypted password).
    pub imap: ServerSettings,
    /// Dispatch endpoint (encrypted password).
    pub smtp: ServerSettings,
    /// `From` address; the dispatch username when unset.
    pub sender_address: Option<String>,
    /// Whether the background daemon syncs this account.
    pub sync_enabled: bool,
    /// Minimum seconds between background syncs.
    pub sync_interval_secs: u64,
    /// Completion time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Where the account's encryption key lives.
    pub key_ref: String,
}

impl AccountSettings {
    /// Address used in `From` headers.
    #[must_use]
    pub fn sender(&self) -> &str {
        self.sender_address
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.smtp.username)
    }

    /// Returns true when a background sync should run at `now`.
    #[must_use]
    pub fn is_sync_due(&self, now: DateTime<Utc>) -> bool {
        if !self.sync_enabled {
            return false;
        }
        // An interval too large to represent is never reached.
        let Some(interval) = i64::try_from(self.sync_interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
        else {
            return self.last_synced_at.is_none();
        };
        self.last_synced_at
            .is_none_or(|last| last.checked_add_signed(interval).is_some_and(|due| due <= now))
    }
}

/// Plaintext settings accepted by `save_settings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccountSettings {
    /// Retrieval endpoint.
    pub imap: ServerSettings,
    /// Dispatch endpoint.
    pub smtp: ServerSettings,
    /// `From` address override.
    pub sender_address: Option<String>,
    /// Background sync toggle.
    pub sync_enabled: bool,
    /// Minimum seconds between background syncs.
    pub sync_interval_secs: u64,
}

impl NewAccountSettings {
    /// Settings with sync enabled every five minutes.
    #[must_use]
    pub const fn new(imap: ServerSettings, smtp: ServerSettings) -> Self {
        Self {
            imap,
            smtp,
            sender_address: None,
            sync_enabled: true,
            sync_interval_secs: 300,
        }
    }
}

/// Per-account signature block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Markup variant.
    pub html: Option<String>,
    /// Plain-text variant.
    pub text: Option<String>,
    /// Whether the signature is applied.
    pub enabled: bool,
}

impl Signature {
    /// Returns true if enabled and at least one variant is non-empty.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled
            && (self.html.as_deref().is_some_and(|s| !s.is_empty())
                || self.text.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(last: Option<DateTime<Utc>>, enabled: bool) -> AccountSettings {
        AccountSettings {
            account_id: AccountId::new(1),
            imap: ServerSettings::new("imap.example.com", 993, "u", "c1", true),
            smtp: ServerSettings::new("smtp.example.com", 587, "u@example.com", "c2", true),
            sender_address: None,
            sync_enabled: enabled,
            sync_interval_secs: 300,
            last_synced_at: last,
            key_ref: "sqlite:1".into(),
        }
    }

    #[test]
    fn never_synced_is_due() {
        assert!(settings(None, true).is_sync_due(Utc::now()));
        assert!(!settings(None, false).is_sync_due(Utc::now()));
    }

    #[test]
    fn due_after_interval() {
        let now = Utc::now();
        let recent = settings(Some(now - Duration::seconds(60)), true);
        assert!(!recent.is_sync_due(now));
        let stale = settings(Some(now - Duration::seconds(300)), true);
        assert!(stale.is_sync_due(now));
    }

    #[test]
    fn unrepresentable_interval_is_never_due_again() {
        let now = Utc::now();
        for secs in [u64::MAX, 9_223_372_036_854_775_807, 9_223_372_036_854_776] {
            let mut synced = settings(Some(now - Duration::days(365)), true);
            synced.sync_interval_secs = secs;
            assert!(!synced.is_sync_due(now), "interval {secs}");

            let mut fresh = settings(None, true);
            fresh.sync_interval_secs = secs;
            assert!(fresh.is_sync_due(now));
        }
    }

    #[test]
    fn sender_defaults_to_smtp_username() {
        let mut s = settings(None, true);
        assert_eq!(s.sender(), "u@example.com");
        s.sender_address = Some("Alice <alice@example.com>".into());
        assert_eq!(s.sender(), "Alice <alice@example.com>");
    }

    #[test]
    fn debug_redacts_password() {
        let server = ServerSettings::new("h", 1, "u", "hunter2", false);
        assert!(!format!("{server:?}").contains("hunter2"));
    }

    #[test]
    fn disabled_signature_is_not_usable() {
        let sig = Signature {
            html: Some("<b>x</b>".into()),
            text: None,
            enabled: false,
        };
        assert!(!sig.is_usable());
        assert!(Signature { enabled: true, ..sig }.is_usable());
    }
}
