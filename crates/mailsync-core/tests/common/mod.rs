//! In-memory protocol clients shared by the orchestrator tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use mailsync_core::{
    AccountContext, AccountId, ClientFactory, CredentialVault, Database, DispatchError,
    Dispatcher, EngineConfig, FetchStage, MailboxError, MailboxErrorKind, NewAccountSettings,
    OutgoingMessage, RemoteMailbox, RemoteMessage, ServerSettings, SqliteKeyStore,
    SyncOrchestrator, Timeouts,
};

/// A message appended to a remote folder.
#[derive(Debug, Clone)]
pub struct Appended {
    pub folder: String,
    pub raw: String,
    pub flags: Vec<String>,
}

/// Shared state behind the fake clients.
#[derive(Debug, Default)]
pub struct Remote {
    pub folders: BTreeMap<String, Vec<RemoteMessage>>,
    pub appended: Vec<Appended>,
    pub sent: Vec<OutgoingMessage>,
    pub passwords: Vec<String>,
    pub next_uid: u32,
    pub fail_fetch: bool,
    pub fail_flags: bool,
    pub fail_append: bool,
    pub fail_send: bool,
    /// Moves succeed but report no destination UID.
    pub no_copyuid: bool,
}

impl Remote {
    pub fn put(&mut self, folder: &str, message: RemoteMessage) {
        self.folders.entry(folder.to_string()).or_default().push(message);
    }

    pub fn folder(&self, folder: &str) -> Vec<RemoteMessage> {
        self.folders.get(folder).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeClients {
    pub remote: Arc<Mutex<Remote>>,
}

impl FakeClients {
    pub fn with<T>(&self, f: impl FnOnce(&mut Remote) -> T) -> T {
        f(&mut self.remote.lock().unwrap())
    }
}

impl ClientFactory for FakeClients {
    type Mailbox = FakeMailbox;
    type Dispatcher = FakeDispatcher;

    fn mailbox(&self, server: ServerSettings, _timeouts: Timeouts) -> FakeMailbox {
        self.with(|r| r.passwords.push(server.password));
        FakeMailbox {
            remote: Arc::clone(&self.remote),
        }
    }

    fn dispatcher(&self, server: ServerSettings, _timeouts: Timeouts) -> FakeDispatcher {
        self.with(|r| r.passwords.push(server.password));
        FakeDispatcher {
            remote: Arc::clone(&self.remote),
        }
    }
}

pub struct FakeMailbox {
    remote: Arc<Mutex<Remote>>,
}

fn unavailable(op: &'static str, folder: &str) -> MailboxError {
    MailboxError::new(
        op,
        Some(folder),
        MailboxErrorKind::Connect("connection refused".into()),
    )
}

impl RemoteMailbox for FakeMailbox {
    async fn fetch_messages_with(
        &self,
        folder: &str,
        limit: Option<usize>,
        on_stage: &mut (dyn FnMut(FetchStage) + Send),
    ) -> Result<Vec<RemoteMessage>, MailboxError> {
        let messages = {
            let remote = self.remote.lock().unwrap();
            if remote.fail_fetch {
                return Err(unavailable("fetch_messages", folder));
            }
            remote.folder(folder)
        };
        on_stage(FetchStage::Listing);
        let skip = limit.map_or(0, |l| messages.len().saturating_sub(l));
        let batch: Vec<_> = messages.into_iter().skip(skip).collect();
        on_stage(FetchStage::FetchingBatch { count: batch.len() });
        Ok(batch)
    }

    async fn fetch_message(
        &self,
        uid: u32,
        folder: &str,
    ) -> Result<Option<RemoteMessage>, MailboxError> {
        let remote = self.remote.lock().unwrap();
        Ok(remote.folder(folder).into_iter().find(|m| m.uid == uid))
    }

    async fn list_identifiers(&self, folder: &str) -> Result<Vec<u32>, MailboxError> {
        let remote = self.remote.lock().unwrap();
        Ok(remote.folder(folder).iter().map(|m| m.uid).collect())
    }

    async fn update_flags(
        &self,
        uid: u32,
        flags: &[String],
        folder: &str,
    ) -> Result<(), MailboxError> {
        let mut remote = self.remote.lock().unwrap();
        if remote.fail_flags {
            return Err(unavailable("update_flags", folder));
        }
        if let Some(message) = remote
            .folders
            .get_mut(folder)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.uid == uid))
        {
            for flag in flags {
                if !message.flags.contains(flag) {
                    message.flags.push(flag.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete_message(&self, uid: u32, folder: &str) -> Result<(), MailboxError> {
        let mut remote = self.remote.lock().unwrap();
        if let Some(msgs) = remote.folders.get_mut(folder) {
            msgs.retain(|m| m.uid != uid);
        }
        Ok(())
    }

    async fn move_message(
        &self,
        uid: u32,
        from: &str,
        to: &str,
    ) -> Result<Option<u32>, MailboxError> {
        let mut remote = self.remote.lock().unwrap();
        let Some(msgs) = remote.folders.get_mut(from) else {
            return Ok(None);
        };
        let Some(pos) = msgs.iter().position(|m| m.uid == uid) else {
            return Ok(None);
        };
        let mut message = msgs.remove(pos);
        remote.next_uid += 1;
        let new_uid = 100 + remote.next_uid;
        message.uid = new_uid;
        remote.put(to, message);
        Ok((!remote.no_copyuid).then_some(new_uid))
    }

    async fn append_message(
        &self,
        folder: &str,
        raw: &[u8],
        flags: &[String],
    ) -> Result<Option<u32>, MailboxError> {
        let mut remote = self.remote.lock().unwrap();
        if remote.fail_append {
            return Err(unavailable("append_message", folder));
        }
        remote.appended.push(Appended {
            folder: folder.to_string(),
            raw: String::from_utf8_lossy(raw).into_owned(),
            flags: flags.to_vec(),
        });
        Ok(u32::try_from(remote.appended.len()).ok())
    }

    async fn list_folders(&self) -> Result<Vec<String>, MailboxError> {
        let remote = self.remote.lock().unwrap();
        Ok(remote.folders.keys().cloned().collect())
    }
}

pub struct FakeDispatcher {
    remote: Arc<Mutex<Remote>>,
}

impl Dispatcher for FakeDispatcher {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DispatchError> {
        let mut remote = self.remote.lock().unwrap();
        if remote.fail_send {
            return Err(DispatchError::Rejected {
                code: 451,
                message: "try again".into(),
            });
        }
        remote.sent.push(message.clone());
        Ok(())
    }

    async fn verify_connection(&self) -> bool {
        !self.remote.lock().unwrap().fail_send
    }
}

pub type Engine = SyncOrchestrator<FakeClients, SqliteKeyStore>;

pub const ACCOUNT: AccountContext = AccountContext::new(AccountId::new(1));

/// An orchestrator over an in-memory database and fake clients.
pub async fn engine() -> (Engine, FakeClients) {
    let db = Database::in_memory().await.unwrap();
    let vault = CredentialVault::new(db.keys());
    let clients = FakeClients::default();
    let engine = SyncOrchestrator::new(db, vault, EngineConfig::default(), clients.clone());
    (engine, clients)
}

/// Same as [`engine`], with settings saved for [`ACCOUNT`].
pub async fn configured_engine() -> (Engine, FakeClients) {
    let (engine, clients) = engine().await;
    engine
        .save_settings(&ACCOUNT, new_settings())
        .await
        .unwrap();
    (engine, clients)
}

pub fn new_settings() -> NewAccountSettings {
    NewAccountSettings::new(
        ServerSettings::new("imap.example.com", 993, "alice@example.com", "imap-secret", true),
        ServerSettings::new("smtp.example.com", 587, "alice@example.com", "smtp-secret", false),
    )
}

/// A remote message dated on `day` of January 2024.
pub fn remote_message(uid: u32, subject: &str, day: u32, flags: &[&str]) -> RemoteMessage {
    RemoteMessage {
        uid,
        flags: flags.iter().map(ToString::to_string).collect(),
        message_id: Some(format!("<{uid}@example.com>")),
        from: "Bob <bob@example.com>".into(),
        to: vec!["alice@example.com".into()],
        cc: Vec::new(),
        bcc: Vec::new(),
        reply_to: None,
        subject: subject.into(),
        date: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
        text_body: Some(format!("Body of {subject}")),
        html_body: None,
        attachments: Vec::new(),
    }
}
