//! Remote Mailbox Client.
//!
//! Every operation opens its own connection, authenticates, opens the folder
//! (EXAMINE for reads, SELECT for mutations), runs, and logs out. Dropping
//! the client closes the socket, so failure paths never leak a connection.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use mailsync_imap::{
    Authenticated, Client, FetchAttribute, FetchItem, Flag, MailStream, NotAuthenticated,
    Selected, StoreAction, Uid, UidSet,
};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::parse::{RemoteMessage, parse_message};
use crate::account::ServerSettings;
use crate::config::Timeouts;
use crate::error::{MailboxError, MailboxErrorKind};

/// Progress reported by [`RemoteMailbox::fetch_messages_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Connected and the folder is open; identifiers are being listed.
    Listing,
    /// Identifiers are known; `count` messages are being fetched and parsed.
    FetchingBatch {
        /// Messages in the batch.
        count: usize,
    },
}

type MailboxResult<T> = std::result::Result<T, MailboxError>;

/// Connection-scoped operations against a remote mailbox.
pub trait RemoteMailbox: Send + Sync {
    /// Fetches the most recent `limit` messages (all when `None`) in
    /// ascending UID order, reporting progress through `on_stage`.
    fn fetch_messages_with(
        &self,
        folder: &str,
        limit: Option<usize>,
        on_stage: &mut (dyn FnMut(FetchStage) + Send),
    ) -> impl Future<Output = MailboxResult<Vec<RemoteMessage>>> + Send;

    /// [`fetch_messages_with`](Self::fetch_messages_with) without progress.
    fn fetch_messages(
        &self,
        folder: &str,
        limit: Option<usize>,
    ) -> impl Future<Output = MailboxResult<Vec<RemoteMessage>>> + Send {
        async move { self.fetch_messages_with(folder, limit, &mut |_: FetchStage| {}).await }
    }

    /// Fetches a single message; `None` if the identifier does not exist.
    fn fetch_message(
        &self,
        uid: u32,
        folder: &str,
    ) -> impl Future<Output = MailboxResult<Option<RemoteMessage>>> + Send;

    /// Every identifier in the folder, in ascending UID order.
    fn list_identifiers(&self, folder: &str)
    -> impl Future<Output = MailboxResult<Vec<u32>>> + Send;

    /// Adds `flags` to the message's flag set.
    fn update_flags(
        &self,
        uid: u32,
        flags: &[String],
        folder: &str,
    ) -> impl Future<Output = MailboxResult<()>> + Send;

    /// Marks the message deleted and expunges it.
    fn delete_message(&self, uid: u32, folder: &str)
    -> impl Future<Output = MailboxResult<()>> + Send;

    /// Moves the message. Returns its identifier in `to` when the server
    /// reports it.
    fn move_message(
        &self,
        uid: u32,
        from: &str,
        to: &str,
    ) -> impl Future<Output = MailboxResult<Option<u32>>> + Send;

    /// Stores a caller-built message in `folder` with initial `flags`.
    /// Returns the assigned identifier when the server reports it.
    fn append_message(
        &self,
        folder: &str,
        raw: &[u8],
        flags: &[String],
    ) -> impl Future<Output = MailboxResult<Option<u32>>> + Send;

    /// Every folder name in the account's hierarchy.
    fn list_folders(&self) -> impl Future<Output = MailboxResult<Vec<String>>> + Send;
}

/// IMAP implementation of [`RemoteMailbox`].
#[derive(Debug, Clone)]
pub struct ImapMailbox {
    server: ServerSettings,
    timeouts: Timeouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadOnly,
    ReadWrite,
}

const FETCH_ITEMS: &[FetchAttribute] = &[
    FetchAttribute::Uid,
    FetchAttribute::Flags,
    FetchAttribute::InternalDate,
    FetchAttribute::BodyPeek,
];

impl ImapMailbox {
    /// Creates a client for `server`, whose password must be plaintext.
    #[must_use]
    pub const fn new(server: ServerSettings, timeouts: Timeouts) -> Self {
        Self { server, timeouts }
    }

    async fn login(&self, op: &'static str) -> MailboxResult<Client<MailStream, Authenticated>> {
        let host = self.server.host.as_str();
        let port = self.server.port;
        let secure = self.server.secure;

        let client = stage(op, None, "connect", self.timeouts.connect(), async {
            let stream = if secure {
                mailsync_imap::connect_tls(host, port).await?
            } else {
                mailsync_imap::connect_plain(host, port).await?
            };
            let client: Client<MailStream, NotAuthenticated> = Client::from_stream(stream).await?;
            if !secure && client.supports_starttls() {
                debug!(host, "Upgrading IMAP connection with STARTTLS");
                return client.starttls(host).await;
            }
            Ok(client)
        })
        .await?;

        stage(
            op,
            None,
            "auth",
            self.timeouts.auth(),
            client.login(&self.server.username, &self.server.password),
        )
        .await
    }

    async fn open(
        &self,
        op: &'static str,
        folder: &str,
        access: Access,
    ) -> MailboxResult<Client<MailStream, Selected>> {
        let client = self.login(op).await?;
        let (client, status) = stage(op, Some(folder), "select", self.timeouts.command(), async {
            match access {
                Access::ReadOnly => client.examine(folder).await,
                Access::ReadWrite => client.select(folder).await,
            }
        })
        .await?;
        debug!(op, folder, exists = status.exists, "Opened folder");
        Ok(client)
    }

    async fn run<T>(
        &self,
        op: &'static str,
        folder: &str,
        fut: impl Future<Output = mailsync_imap::Result<T>>,
    ) -> MailboxResult<T> {
        stage(op, Some(folder), "command", self.timeouts.command(), fut).await
    }

    async fn close<State>(&self, client: Client<MailStream, State>) {
        match tokio::time::timeout(self.timeouts.command(), client.logout()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "IMAP logout failed"),
            Err(_) => debug!("IMAP logout timed out"),
        }
    }

    async fn fetch_raw(
        &self,
        folder: &str,
        limit: Option<usize>,
        on_stage: &mut (dyn FnMut(FetchStage) + Send),
    ) -> MailboxResult<Vec<(u32, Vec<FetchItem>)>> {
        const OP: &str = "fetch_messages";
        let mut client = self.open(OP, folder, Access::ReadOnly).await?;

        on_stage(FetchStage::Listing);
        let uids = match self.run(OP, folder, client.uid_search_all()).await {
            Ok(uids) => uids,
            Err(e) => {
                self.close(client).await;
                return Err(e);
            }
        };
        let uids = tail(uids, limit);
        on_stage(FetchStage::FetchingBatch { count: uids.len() });

        let set = UidSet::from_uids(uids.iter().copied());
        let fetched = self.run(OP, folder, client.uid_fetch(&set, FETCH_ITEMS)).await;
        self.close(client).await;

        Ok(in_listing_order(&uids, fetched?))
    }
}

impl RemoteMailbox for ImapMailbox {
    async fn fetch_messages_with(
        &self,
        folder: &str,
        limit: Option<usize>,
        on_stage: &mut (dyn FnMut(FetchStage) + Send),
    ) -> MailboxResult<Vec<RemoteMessage>> {
        let batch = self.fetch_raw(folder, limit, on_stage).await?;
        let messages = parse_batch(batch).await;
        debug!(folder, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    async fn fetch_message(&self, uid: u32, folder: &str) -> MailboxResult<Option<RemoteMessage>> {
        const OP: &str = "fetch_message";
        let Some(target) = Uid::new(uid) else {
            return Ok(None);
        };
        let mut client = self.open(OP, folder, Access::ReadOnly).await?;
        let fetched = self
            .run(OP, folder, client.uid_fetch(&UidSet::single(target), FETCH_ITEMS))
            .await;
        self.close(client).await;

        let batch = in_listing_order(&[target], fetched?);
        Ok(parse_batch(batch).await.into_iter().next())
    }

    async fn list_identifiers(&self, folder: &str) -> MailboxResult<Vec<u32>> {
        const OP: &str = "list_identifiers";
        let mut client = self.open(OP, folder, Access::ReadOnly).await?;
        let uids = self.run(OP, folder, client.uid_search_all()).await;
        self.close(client).await;
        Ok(uids?.into_iter().map(Uid::get).collect())
    }

    async fn update_flags(&self, uid: u32, flags: &[String], folder: &str) -> MailboxResult<()> {
        const OP: &str = "update_flags";
        let target = valid_uid(OP, folder, uid)?;
        let flags: Vec<Flag> = flags.iter().map(|f| Flag::parse(f)).collect();

        let mut client = self.open(OP, folder, Access::ReadWrite).await?;
        let result = self
            .run(
                OP,
                folder,
                client.uid_store(&UidSet::single(target), StoreAction::Add(flags)),
            )
            .await;
        self.close(client).await;
        if result.is_ok() {
            debug!(folder, uid, "Updated flags");
        }
        result
    }

    async fn delete_message(&self, uid: u32, folder: &str) -> MailboxResult<()> {
        const OP: &str = "delete_message";
        let target = valid_uid(OP, folder, uid)?;
        let set = UidSet::single(target);

        let mut client = self.open(OP, folder, Access::ReadWrite).await?;
        let mut result = self
            .run(
                OP,
                folder,
                client.uid_store(&set, StoreAction::Add(vec![Flag::Deleted])),
            )
            .await;
        if result.is_ok() {
            result = self.run(OP, folder, client.expunge_uids(&set)).await;
        }
        self.close(client).await;
        if result.is_ok() {
            debug!(folder, uid, "Deleted message");
        }
        result
    }

    async fn move_message(&self, uid: u32, from: &str, to: &str) -> MailboxResult<Option<u32>> {
        const OP: &str = "move_message";
        let target = valid_uid(OP, from, uid)?;

        let mut client = self.open(OP, from, Access::ReadWrite).await?;
        let pairs = self
            .run(OP, to, client.uid_move(&UidSet::single(target), to))
            .await;
        self.close(client).await;

        let new_uid = pairs?
            .into_iter()
            .find(|(source, _)| *source == target)
            .map(|(_, dest)| dest.get());
        debug!(from, to, uid, ?new_uid, "Moved message");
        Ok(new_uid)
    }

    async fn append_message(
        &self,
        folder: &str,
        raw: &[u8],
        flags: &[String],
    ) -> MailboxResult<Option<u32>> {
        const OP: &str = "append_message";
        let flags: Vec<Flag> = flags.iter().map(|f| Flag::parse(f)).collect();

        let mut client = self.login(OP).await?;
        let uid = self.run(OP, folder, client.append(folder, &flags, raw)).await;
        self.close(client).await;

        let uid = uid?.map(Uid::get);
        debug!(folder, ?uid, size = raw.len(), "Appended message");
        Ok(uid)
    }

    async fn list_folders(&self) -> MailboxResult<Vec<String>> {
        const OP: &str = "list_folders";
        let mut client = self.login(OP).await?;
        let entries = stage(
            OP,
            None,
            "command",
            self.timeouts.command(),
            client.list("", "*"),
        )
        .await;
        self.close(client).await;
        Ok(entries?.into_iter().map(|e| e.name).collect())
    }
}

/// Runs one protocol stage under a timeout, classifying failures.
async fn stage<T>(
    op: &'static str,
    folder: Option<&str>,
    name: &'static str,
    limit: Duration,
    fut: impl Future<Output = mailsync_imap::Result<T>>,
) -> MailboxResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(op, folder, stage = name, error = %e, "IMAP operation failed");
            Err(MailboxError::new(op, folder, classify(name, &e)))
        }
        Err(_) => {
            warn!(op, folder, stage = name, "IMAP operation timed out");
            Err(MailboxError::new(op, folder, MailboxErrorKind::Timeout(name)))
        }
    }
}

fn classify(stage: &str, error: &mailsync_imap::Error) -> MailboxErrorKind {
    use mailsync_imap::Error;
    let message = error.to_string();
    match error {
        Error::Io(_) | Error::Tls(_) | Error::InvalidDnsName(_) => MailboxErrorKind::Connect(message),
        Error::No(_) | Error::Bad(_) if stage == "auth" => MailboxErrorKind::Auth(message),
        Error::Bye(_) if stage == "connect" => MailboxErrorKind::Connect(message),
        _ => MailboxErrorKind::Protocol(message),
    }
}

fn valid_uid(op: &'static str, folder: &str, uid: u32) -> MailboxResult<Uid> {
    Uid::new(uid).ok_or_else(|| {
        MailboxError::new(
            op,
            Some(folder),
            MailboxErrorKind::Protocol("0 is not a valid UID".into()),
        )
    })
}

/// Keeps the last `limit` identifiers.
fn tail(mut uids: Vec<Uid>, limit: Option<usize>) -> Vec<Uid> {
    if let Some(limit) = limit
        && uids.len() > limit
    {
        let skip = uids.len() - limit;
        uids.drain(..skip);
    }
    uids
}

/// Pairs FETCH responses with their UID and reorders them to match `uids`.
fn in_listing_order(uids: &[Uid], fetched: Vec<Vec<FetchItem>>) -> Vec<(u32, Vec<FetchItem>)> {
    let mut by_uid: HashMap<u32, Vec<FetchItem>> = fetched
        .into_iter()
        .filter_map(|items| {
            let uid = items.iter().find_map(|item| match item {
                FetchItem::Uid(uid) => Some(uid.get()),
                _ => None,
            })?;
            Some((uid, items))
        })
        .collect();
    uids.iter()
        .filter_map(|uid| by_uid.remove(&uid.get()).map(|items| (uid.get(), items)))
        .collect()
}

/// Parses a fetched batch off the async runtime.
///
/// Completes only once every spawned parse has resolved. Messages that fail
/// to parse are logged and left out.
async fn parse_batch(batch: Vec<(u32, Vec<FetchItem>)>) -> Vec<RemoteMessage> {
    let expected = batch.len();
    let mut tasks = JoinSet::new();
    for (index, (uid, items)) in batch.into_iter().enumerate() {
        tasks.spawn_blocking(move || (index, uid, parse_items(uid, items)));
    }

    let mut slots: Vec<Option<RemoteMessage>> = vec![None; expected];
    let mut resolved = 0;
    while let Some(joined) = tasks.join_next().await {
        resolved += 1;
        match joined {
            Ok((index, _, Some(message))) => slots[index] = Some(message),
            Ok((_, uid, None)) => warn!(uid, "Skipping unparseable message"),
            Err(e) => warn!(error = %e, "Message parse task failed"),
        }
    }
    debug_assert_eq!(resolved, expected);
    slots.into_iter().flatten().collect()
}

fn parse_items(uid: u32, items: Vec<FetchItem>) -> Option<RemoteMessage> {
    let mut flags = Vec::new();
    let mut internal_date = None;
    let mut body = None;
    for item in items {
        match item {
            FetchItem::Flags(f) => flags = f.iter().map(|flag| flag.as_str().to_string()).collect(),
            FetchItem::InternalDate(d) => internal_date = Some(d),
            FetchItem::Body { data, .. } => body = data,
            _ => {}
        }
    }

    let raw = body.unwrap_or_default();
    match parse_message(uid, &raw, flags, internal_date.as_deref()) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(uid, error = %e, "Failed to parse message");
            None
        }
    }
}
