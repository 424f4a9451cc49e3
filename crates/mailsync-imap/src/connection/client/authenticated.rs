//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::Command;
use crate::parser::{Response, ResponseCode, UntaggedResponse};
use crate::types::{Flag, ListEntry, MailboxStatus, Uid};
use crate::Result;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens a mailbox read-write.
    pub async fn select(self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        self.open(Command::Select(mailbox.to_string()), mailbox).await
    }

    /// Opens a mailbox read-only; flags are not altered by reads.
    pub async fn examine(self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        self.open(Command::Examine(mailbox.to_string()), mailbox).await
    }

    async fn open(
        mut self,
        command: Command,
        mailbox: &str,
    ) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let read_only = matches!(command, Command::Examine(_));
        let responses = self.execute(&command).await?;
        let mut status = mailbox_status(&responses);
        status.read_only |= read_only;

        let client = self.transition(Selected {
            mailbox: mailbox.to_string(),
            status: status.clone(),
        });
        Ok((client, status))
    }

    /// Lists all mailboxes.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        let responses = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                Response::Untagged(UntaggedResponse::List(entry)) => Some(entry),
                _ => None,
            })
            .collect())
    }

    /// Appends a complete RFC 5322 message to `mailbox`.
    ///
    /// Returns the assigned UID when the server reports APPENDUID.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        message: &[u8],
    ) -> Result<Option<Uid>> {
        let tag = self.tag_gen.next();
        let command = Command::Append {
            mailbox: mailbox.to_string(),
            flags: flags.to_vec(),
            size: message.len(),
        };
        self.send(&command, &tag).await?;
        self.await_continuation().await?;

        let mut literal = Vec::with_capacity(message.len() + 2);
        literal.extend_from_slice(message);
        literal.extend_from_slice(b"\r\n");
        self.stream.write_all(&literal).await?;

        let raw = self.stream.read_until_tagged(&tag).await?;
        let responses = super::parse_all(&raw)?;
        super::check_completion(&responses)?;

        Ok(responses.iter().find_map(|r| match r {
            Response::Tagged {
                code: Some(ResponseCode::AppendUid { uid, .. }),
                ..
            } => Uid::new(*uid),
            _ => None,
        }))
    }
}

fn mailbox_status(responses: &[Response]) -> MailboxStatus {
    let mut status = MailboxStatus::default();
    for response in responses {
        let code = match response {
            Response::Untagged(UntaggedResponse::Exists(n)) => {
                status.exists = *n;
                continue;
            }
            Response::Untagged(UntaggedResponse::Status { code, .. })
            | Response::Tagged { code, .. } => code,
            _ => continue,
        };
        match code {
            Some(ResponseCode::UidValidity(v)) => status.uid_validity = Some(*v),
            Some(ResponseCode::UidNext(v)) => status.uid_next = Some(*v),
            Some(ResponseCode::ReadOnly) => status.read_only = true,
            _ => {}
        }
    }
    status
}
