//! # mailsync-core
//!
//! Mailbox synchronization and dispatch engine.
//!
//! This crate provides:
//! - **Credential Vault**: per-account AES-256-GCM encryption of stored
//!   passwords with lazily provisioned keys
//! - **Account settings and signatures** stored in `SQLite`
//! - **Local Message Cache**: the read path for everything above the engine
//! - **Remote Mailbox Client**: one connection per operation over IMAP
//! - **Outbound Dispatcher**: SMTP submission with signature injection
//! - **Synchronization Orchestrator**: the only writer of the cache
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsync_core::{AccountContext, AccountId, Database, EngineConfig, SyncOrchestrator};
//!
//! let config = EngineConfig::load_default()?;
//! let db = Database::open(&config.database_path()?).await?;
//! let engine = SyncOrchestrator::with_network(db, config);
//!
//! let ctx = AccountContext::new(AccountId::new(1));
//! let report = engine.sync_messages(&ctx, "INBOX", Some(50)).await?;
//! let page = engine.cached_messages(&ctx, "INBOX", None).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod cache;
pub mod config;
mod db;
mod error;
pub mod service;
pub mod sync;
pub mod vault;

pub use account::{
    AccountContext, AccountId, AccountSettings, NewAccountSettings, ServerSettings, Signature,
    SettingsRepository,
};
pub use cache::{AttachmentMeta, CacheRepository, CachedMessage, UpsertOutcome};
pub use config::{EngineConfig, Timeouts, WellKnownFolders};
pub use db::Database;
pub use error::{
    DecryptionError, DispatchError, Error, MailboxError, MailboxErrorKind, Remediation, Result,
};
pub use service::{
    Attachment, Dispatcher, FetchStage, ImapMailbox, OutgoingMessage, RemoteMailbox,
    RemoteMessage, SmtpDispatcher, Transport,
};
pub use sync::{
    ClientFactory, NetworkClients, SendReport, SyncOrchestrator, SyncPhase, SyncReport, SyncRun,
};
pub use vault::{CredentialVault, KeyStore, KeyringKeyStore, SqliteKeyStore};
