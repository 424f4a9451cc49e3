//! Type-state SMTP client.

use std::marker::PhantomData;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};

/// Greeting received; EHLO and STARTTLS may follow.
#[derive(Debug)]
pub struct Connected;

/// Credentials accepted.
#[derive(Debug)]
pub struct Authenticated;

/// `MAIL FROM` accepted, no recipient yet.
#[derive(Debug)]
pub struct MailTransaction;

/// At least one recipient accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// `DATA` accepted; the message body is expected next.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Reads the 220 greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the server refuses the session.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let hostname = greeting
            .message
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                ..ServerInfo::default()
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?
            .expect_success()?;
        self.server_info.apply_ehlo(&reply.message);
        Ok(self)
    }

    /// Upgrades to TLS with STARTTLS and repeats EHLO over the new channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if STARTTLS was not advertised, or an
    /// error if the command or handshake fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.send_command(&Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        self.stream = self.stream.upgrade_to_tls(hostname).await?;
        self.ehlo(hostname).await
    }

    /// Authenticates with AUTH PLAIN, falling back to AUTH LOGIN.
    ///
    /// PLAIN is used when advertised or when no mechanism is advertised at
    /// all. LOGIN is used when it is the only one advertised, or when the
    /// server answers PLAIN with 504 (mechanism not supported).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the credentials are refused.
    pub async fn authenticate(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let info = &self.server_info;
        let try_plain =
            info.supports_auth(&AuthMechanism::Plain) || !info.supports_auth(&AuthMechanism::Login);

        if try_plain {
            match self.auth_plain(username, password).await {
                Ok(()) => return Ok(self.transition()),
                Err(Error::Rejected { code: 504, .. })
                    if self.server_info.supports_auth(&AuthMechanism::Login)
                        || self.server_info.auth_mechanisms.is_empty() =>
                {
                    tracing::debug!("AUTH PLAIN not accepted, trying AUTH LOGIN");
                }
                Err(e) => return Err(e),
            }
        }

        self.auth_login(username, password).await?;
        Ok(self.transition())
    }

    async fn auth_plain(&mut self, username: &str, password: &str) -> Result<()> {
        let encoded = STANDARD.encode(format!("\0{username}\0{password}"));
        self.send_command(&Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        })
        .await?
        .expect_code(ReplyCode::AUTH_OK)
        .map(drop)
    }

    async fn auth_login(&mut self, username: &str, password: &str) -> Result<()> {
        self.send_command(&Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        })
        .await?
        .expect_code(ReplyCode::AUTH_CONTINUE)?;
        self.send_command(&Command::AuthResponse(STANDARD.encode(username)))
            .await?
            .expect_code(ReplyCode::AUTH_CONTINUE)?;
        self.send_command(&Command::AuthResponse(STANDARD.encode(password)))
            .await?
            .expect_code(ReplyCode::AUTH_OK)
            .map(drop)
    }

    /// Starts a mail transaction without authenticating.
    ///
    /// # Errors
    ///
    /// Returns an error if MAIL FROM is rejected.
    pub async fn mail_from(self, from: &Address) -> Result<Client<MailTransaction>> {
        self.start_transaction(from).await
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if MAIL FROM is rejected.
    pub async fn mail_from(self, from: &Address) -> Result<Client<MailTransaction>> {
        self.start_transaction(from).await
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Client<RecipientAdded>> {
        self.add_recipient(to).await?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Self> {
        self.add_recipient(to).await?;
        Ok(self)
    }

    /// Sends DATA.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<Data>> {
        self.send_command(&Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the server rejects the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        self.stream.write_all(&encode_data(message)).await?;
        read_reply(&mut self.stream).await?.expect_success()?;
        Ok(self.transition())
    }
}

impl<State> Client<State> {
    /// Server greeting and extension data.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 2xx.
    pub async fn noop(&mut self) -> Result<()> {
        self.send_command(&Command::Noop)
            .await?
            .expect_success()
            .map(drop)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if reply.is_success() || reply.code == ReplyCode::CLOSING {
            Ok(())
        } else {
            Err(Error::rejected(&reply))
        }
    }

    async fn start_transaction(mut self, from: &Address) -> Result<Client<MailTransaction>> {
        self.send_command(&Command::MailFrom { from: from.clone() })
            .await?
            .expect_success()?;
        Ok(self.transition())
    }

    async fn add_recipient(&mut self, to: &Address) -> Result<()> {
        self.send_command(&Command::RcptTo { to: to.clone() })
            .await?
            .expect_success()
            .map(drop)
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::trace!(command = %cmd.redacted(), "SMTP >");
        self.stream.write_all(&cmd.serialize()).await?;
        let reply = read_reply(&mut self.stream).await?;
        tracing::trace!(code = %reply.code, "SMTP <");
        Ok(reply)
    }

    fn transition<Next>(self) -> Client<Next> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        let last = is_last_reply_line(&line);
        lines.push(line);
        if last {
            return parse_reply(&lines);
        }
        if lines.len() > 512 {
            return Err(Error::Protocol("reply has too many lines".into()));
        }
    }
}

/// Normalizes line endings, dot-stuffs, and appends the terminator.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}
