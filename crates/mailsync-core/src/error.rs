//! Error types for the engine.

use std::fmt;

use thiserror::Error;

use crate::account::AccountId;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable settings for the account. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stored credentials cannot be decrypted with the account's key.
    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    /// Retrieval-side failure.
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    /// Send-side failure.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A stored row holds a value that cannot be read back.
    #[error("Corrupt cache row: {0}")]
    Corrupt(String),

    /// Credential could not be encrypted.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Platform keyring failure.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// What the user has to do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Credentials or settings must be re-entered.
    Reconfigure,
    /// Transient; the same request may succeed later.
    RetryLater,
    /// A bug or unexpected server behavior; nothing the user can fix.
    Internal,
}

impl Error {
    /// Classifies the error by remediation path.
    #[must_use]
    pub const fn remediation(&self) -> Remediation {
        match self {
            Self::Configuration(_) | Self::Decryption(_) => Remediation::Reconfigure,
            Self::Mailbox(e) => match e.kind {
                MailboxErrorKind::Auth(_) => Remediation::Reconfigure,
                MailboxErrorKind::Connect(_) | MailboxErrorKind::Timeout(_) => {
                    Remediation::RetryLater
                }
                MailboxErrorKind::Protocol(_) => Remediation::Internal,
            },
            Self::Dispatch(e) => match e {
                DispatchError::Authentication(_) => Remediation::Reconfigure,
                DispatchError::Connection(_) | DispatchError::Timeout(_) => {
                    Remediation::RetryLater
                }
                DispatchError::Rejected { code, .. } if *code >= 400 && *code < 500 => {
                    Remediation::RetryLater
                }
                DispatchError::Rejected { .. }
                | DispatchError::Send(_)
                | DispatchError::InvalidAddress(_) => Remediation::Internal,
            },
            Self::Encryption(_)
            | Self::Database(_)
            | Self::Serde(_)
            | Self::Corrupt(_)
            | Self::Keyring(_)
            | Self::Io(_) => Remediation::Internal,
        }
    }

    /// Short, actionable text suitable for showing to the account owner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => "Email is not configured for this account.".to_string(),
            Self::Dispatch(DispatchError::InvalidAddress(addr)) => {
                format!("The address {addr} is not valid.")
            }
            _ => match self.remediation() {
                Remediation::Reconfigure => {
                    "Credentials are invalid, please reconfigure the email account.".to_string()
                }
                Remediation::RetryLater => {
                    "The mail server is temporarily unavailable, please try again later."
                        .to_string()
                }
                Remediation::Internal => "An unexpected mail error occurred.".to_string(),
            },
        }
    }
}

/// Why stored ciphertext could not be turned back into plaintext.
///
/// Every variant is unrecoverable for the account: the credentials have to
/// be entered again.
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// The account has no key.
    #[error("No encryption key exists for account {0}")]
    MissingKey(AccountId),

    /// The stored string is not `base64(nonce || ciphertext)`.
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    /// Authentication failed: wrong key or tampered data.
    #[error("Ciphertext does not match the account key")]
    Mismatch,
}

/// Remote mailbox failure, tagged with operation and folder.
#[derive(Debug, Error)]
#[error("{operation} failed{}: {kind}", folder.as_deref().map(|f| format!(" in {f}")).unwrap_or_default())]
pub struct MailboxError {
    /// Operation name (`fetch_messages`, `move_message`, ...).
    pub operation: &'static str,
    /// Folder the operation targeted, if any.
    pub folder: Option<String>,
    /// Failure class.
    pub kind: MailboxErrorKind,
}

impl MailboxError {
    /// Creates an error for `operation` on `folder`.
    #[must_use]
    pub fn new(operation: &'static str, folder: Option<&str>, kind: MailboxErrorKind) -> Self {
        Self {
            operation,
            folder: folder.map(str::to_string),
            kind,
        }
    }
}

/// Failure class of a [`MailboxError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxErrorKind {
    /// TCP/TLS connection could not be established or broke.
    Connect(String),
    /// Credentials were refused.
    Auth(String),
    /// The server rejected a command or sent something unparseable.
    Protocol(String),
    /// A stage exceeded its configured timeout.
    Timeout(&'static str),
}

impl fmt::Display for MailboxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(m) => write!(f, "connection error: {m}"),
            Self::Auth(m) => write!(f, "authentication failed: {m}"),
            Self::Protocol(m) => write!(f, "protocol error: {m}"),
            Self::Timeout(stage) => write!(f, "timed out during {stage}"),
        }
    }
}

/// Outbound dispatch failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Connection or TLS negotiation failed.
    #[error("Dispatch connection failed: {0}")]
    Connection(String),

    /// Credentials were refused.
    #[error("Dispatch authentication failed: {0}")]
    Authentication(String),

    /// The server refused the envelope or the message.
    #[error("Dispatch rejected ({code}): {message}")]
    Rejected {
        /// SMTP reply code.
        code: u16,
        /// Server text.
        message: String,
    },

    /// Transmission broke mid-transaction.
    #[error("Dispatch failed: {0}")]
    Send(String),

    /// A sender or recipient address is unusable.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A stage exceeded its configured timeout.
    #[error("Dispatch timed out during {0}")]
    Timeout(&'static str),
}
