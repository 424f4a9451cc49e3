//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::command::{Command, FetchAttribute, StoreAction};
use crate::parser::{FetchItem, Response, UntaggedResponse};
use crate::types::{Flag, MailboxStatus, Uid, UidSet};
use crate::Result;

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Name of the open mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.state.mailbox
    }

    /// Status reported when the mailbox was opened.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.state.status
    }

    /// Returns every UID in the mailbox, ascending.
    pub async fn uid_search_all(&mut self) -> Result<Vec<Uid>> {
        let responses = self.execute(&Command::UidSearchAll).await?;
        let mut uids: Vec<Uid> = responses
            .iter()
            .filter_map(|r| match r {
                Response::Untagged(UntaggedResponse::Search(ids)) => Some(ids),
                _ => None,
            })
            .flatten()
            .filter_map(|&n| Uid::new(n))
            .collect();
        uids.sort_unstable();
        uids.dedup();
        Ok(uids)
    }

    /// Fetches data items for the given UIDs.
    ///
    /// Returns one item list per FETCH response, in server order.
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        items: &[FetchAttribute],
    ) -> Result<Vec<Vec<FetchItem>>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let responses = self
            .execute(&Command::UidFetch {
                uids: uids.clone(),
                items: items.to_vec(),
            })
            .await?;

        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                Response::Untagged(UntaggedResponse::Fetch { items, .. }) => Some(items),
                _ => None,
            })
            .collect())
    }

    /// Adds or removes flags without requesting the updated values back.
    pub async fn uid_store(&mut self, uids: &UidSet, action: StoreAction) -> Result<()> {
        self.execute(&Command::UidStore {
            uids: uids.clone(),
            action,
        })
        .await
        .map(drop)
    }

    /// Copies messages to `mailbox`.
    ///
    /// Returns source→destination UID pairs when the server reports COPYUID.
    pub async fn uid_copy(&mut self, uids: &UidSet, mailbox: &str) -> Result<Vec<(Uid, Uid)>> {
        let responses = self
            .execute(&Command::UidCopy {
                uids: uids.clone(),
                mailbox: mailbox.to_string(),
            })
            .await?;
        Ok(super::copy_uid_pairs(&responses))
    }

    /// Moves messages to `mailbox`.
    ///
    /// Uses UID MOVE when advertised. Otherwise copies, marks the originals
    /// `\Deleted` and expunges them (only those UIDs if UIDPLUS is present).
    pub async fn uid_move(&mut self, uids: &UidSet, mailbox: &str) -> Result<Vec<(Uid, Uid)>> {
        if self.supports_move() {
            let responses = self
                .execute(&Command::UidMove {
                    uids: uids.clone(),
                    mailbox: mailbox.to_string(),
                })
                .await?;
            return Ok(super::copy_uid_pairs(&responses));
        }

        let pairs = self.uid_copy(uids, mailbox).await?;
        self.uid_store(uids, StoreAction::Add(vec![Flag::Deleted]))
            .await?;
        self.expunge_uids(uids).await?;
        Ok(pairs)
    }

    /// Permanently removes `\Deleted` messages.
    ///
    /// With UIDPLUS only `uids` are expunged; otherwise every `\Deleted`
    /// message in the mailbox is.
    pub async fn expunge_uids(&mut self, uids: &UidSet) -> Result<()> {
        let command = if self.supports_uidplus() {
            Command::UidExpunge(uids.clone())
        } else {
            Command::Expunge
        };
        self.execute(&command).await.map(drop)
    }
}
