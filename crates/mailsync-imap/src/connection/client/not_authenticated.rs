//! Implementation for the not-authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::connection::stream::MailStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::Status;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream by reading the greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = ResponseParser::parse(&framed.read_response().await?)?;

        let mut client = Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };

        match &greeting {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text.clone())),
            Response::Untagged(UntaggedResponse::Status { .. }) => {
                client.absorb_capabilities(std::slice::from_ref(&greeting));
            }
            _ => return Err(Error::Protocol("unexpected greeting".to_string())),
        }

        Ok(client)
    }

    /// Authenticates with LOGIN and consumes the client.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let responses = self
            .execute(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.absorb_capabilities(&responses);

        let mut client = self.transition(Authenticated);
        if client.capabilities.is_empty() {
            client.refresh_capabilities().await?;
        }
        tracing::debug!(capabilities = ?client.capabilities, "IMAP login complete");
        Ok(client)
    }
}

impl Client<MailStream, NotAuthenticated> {
    /// Negotiates STARTTLS and returns the client on the encrypted stream.
    ///
    /// Capabilities are discarded and re-read over TLS.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.execute(&Command::StartTls).await?;
        let stream = self.stream.into_inner()?.upgrade_to_tls(host).await?;

        let mut client = Self {
            stream: FramedStream::new(stream),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.refresh_capabilities().await?;
        Ok(client)
    }
}
