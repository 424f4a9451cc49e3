//! Type-state IMAP client connection.
//!
//! The protocol states are:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after a successful LOGIN
//! - `Selected`: after a successful SELECT/EXAMINE
//!
//! Each state only exposes the commands valid in it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseCode, ResponseParser, UntaggedResponse};
use crate::types::{Status, Uid};
use crate::{Error, Result};

use tokio::io::{AsyncRead, AsyncWrite};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<String>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities last advertised.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks a capability by name, case-insensitively.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns true if the server supports MOVE (RFC 6851).
    #[must_use]
    pub fn supports_move(&self) -> bool {
        self.has_capability("MOVE")
    }

    /// Returns true if the server supports UIDPLUS (RFC 4315).
    #[must_use]
    pub fn supports_uidplus(&self) -> bool {
        self.has_capability("UIDPLUS")
    }

    /// Returns true if the server advertises STARTTLS.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.has_capability("STARTTLS")
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(drop)
    }

    /// Re-reads the capability list from the server.
    pub async fn refresh_capabilities(&mut self) -> Result<()> {
        self.capabilities.clear();
        let responses = self.execute(&Command::Capability).await?;
        self.absorb_capabilities(&responses);
        Ok(())
    }

    /// Sends LOGOUT and consumes the connection.
    ///
    /// The server's reply is read but not checked; the connection is closed
    /// either way.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        self.stream
            .write_all(&Command::Logout.serialize(&tag))
            .await?;
        if let Err(e) = self.stream.read_until_tagged(&tag).await {
            tracing::debug!(error = %e, "LOGOUT reply not received");
        }
        Ok(())
    }

    /// Runs one command to completion.
    ///
    /// Returns all parsed responses, the tagged completion last. A NO, BAD
    /// or BYE completion becomes an error.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Response>> {
        let tag = self.tag_gen.next();
        self.send(command, &tag).await?;
        let raw = self.stream.read_until_tagged(&tag).await?;
        let responses = parse_all(&raw)?;
        check_completion(&responses)?;
        Ok(responses)
    }

    /// Writes `command`, waiting for a continuation after each literal
    /// announcement inside it.
    pub(crate) async fn send(&mut self, command: &Command, tag: &str) -> Result<()> {
        let parts = command.serialize_parts(tag);
        let last = parts.len().saturating_sub(1);
        for (i, part) in parts.iter().enumerate() {
            self.stream.write_all(part).await?;
            if i < last {
                self.await_continuation().await?;
            }
        }
        Ok(())
    }

    /// Reads until the server's `+` continuation. Untagged data is skipped;
    /// a tagged NO or BAD means the command was refused.
    pub(crate) async fn await_continuation(&mut self) -> Result<()> {
        loop {
            match ResponseParser::parse(&self.stream.read_response().await?)? {
                Response::Continuation { .. } => return Ok(()),
                Response::Untagged(_) => {}
                Response::Tagged {
                    status: Status::No,
                    text,
                    ..
                } => return Err(Error::No(text)),
                Response::Tagged {
                    status: Status::Bad,
                    text,
                    ..
                } => return Err(Error::Bad(text)),
                Response::Tagged { .. } => {
                    return Err(Error::Protocol("expected continuation".to_string()));
                }
            }
        }
    }

    pub(crate) fn absorb_capabilities(&mut self, responses: &[Response]) {
        for response in responses {
            match response {
                Response::Untagged(UntaggedResponse::Capability(caps))
                | Response::Untagged(UntaggedResponse::Status {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                })
                | Response::Tagged {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                } => self.capabilities.clone_from(caps),
                _ => {}
            }
        }
    }

    pub(crate) fn transition<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }
}

/// Parses raw responses. Untagged lines the parser does not understand are
/// skipped; an unparseable completion is an error.
fn parse_all(raw: &[Vec<u8>]) -> Result<Vec<Response>> {
    let mut out = Vec::with_capacity(raw.len());
    let last = raw.len().saturating_sub(1);
    for (i, bytes) in raw.iter().enumerate() {
        match ResponseParser::parse(bytes) {
            Ok(response) => out.push(response),
            Err(e) if i == last => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, line = %String::from_utf8_lossy(bytes), "skipping unparsed response");
            }
        }
    }
    Ok(out)
}

fn check_completion(responses: &[Response]) -> Result<()> {
    match responses.last() {
        Some(Response::Tagged { status, text, .. }) => match status {
            Status::Ok | Status::PreAuth => Ok(()),
            Status::No => Err(Error::No(text.clone())),
            Status::Bad => Err(Error::Bad(text.clone())),
            Status::Bye => Err(Error::Bye(text.clone())),
        },
        _ => Err(Error::Protocol("missing tagged response".to_string())),
    }
}

/// Collects source→destination pairs from any COPYUID code in `responses`.
fn copy_uid_pairs(responses: &[Response]) -> Vec<(Uid, Uid)> {
    responses
        .iter()
        .filter_map(|r| match r {
            Response::Tagged {
                code: Some(ResponseCode::CopyUid { source, dest, .. }),
                ..
            }
            | Response::Untagged(UntaggedResponse::Status {
                code: Some(ResponseCode::CopyUid { source, dest, .. }),
                ..
            }) => Some(source.iter().zip(dest.iter())),
            _ => None,
        })
        .flatten()
        .filter_map(|(&s, &d)| Some((Uid::new(s)?, Uid::new(d)?)))
        .collect()
}
