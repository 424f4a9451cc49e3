//! Outbound Dispatcher.
//!
//! Each send opens a fresh SMTP session. Nothing is retried here.

use std::future::Future;
use std::time::Duration;

use mailsync_smtp::{Address, Client, Connected};
use tracing::{debug, info, warn};

use super::compose::{OutgoingMessage, envelope_address};
use crate::account::{ServerSettings, Signature};
use crate::config::Timeouts;
use crate::error::DispatchError;

type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Connection security for a dispatch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// TLS from the first byte.
    Tls,
    /// Plaintext, then a mandatory STARTTLS upgrade.
    StartTls,
    /// Plaintext, upgraded with STARTTLS when the server offers it.
    Opportunistic,
}

impl Transport {
    /// Derives the transport from the port, then from the stored flag.
    ///
    /// Port 465 always uses implicit TLS and port 587 always uses STARTTLS,
    /// whatever `secure` says.
    #[must_use]
    pub const fn resolve(port: u16, secure: bool) -> Self {
        match port {
            465 => Self::Tls,
            587 => Self::StartTls,
            _ if secure => Self::Tls,
            _ => Self::Opportunistic,
        }
    }
}

/// Sends messages.
pub trait Dispatcher: Send + Sync {
    /// Transmits `message` to every To, Cc and Bcc recipient.
    fn send(&self, message: &OutgoingMessage) -> impl Future<Output = DispatchResult<()>> + Send;

    /// Applies `signature` (when given and enabled), then sends.
    fn send_with_signature(
        &self,
        message: &OutgoingMessage,
        signature: Option<&Signature>,
    ) -> impl Future<Output = DispatchResult<()>> + Send {
        async move {
            match signature {
                Some(sig) if sig.is_usable() => {
                    self.send(&message.clone().with_signature(sig)).await
                }
                _ => self.send(message).await,
            }
        }
    }

    /// Connects and authenticates without sending. Never fails; problems
    /// are logged and reported as `false`.
    fn verify_connection(&self) -> impl Future<Output = bool> + Send;
}

/// SMTP implementation of [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct SmtpDispatcher {
    server: ServerSettings,
    timeouts: Timeouts,
    client_hostname: String,
    dial: Option<(String, u16)>,
}

impl SmtpDispatcher {
    /// Creates a dispatcher for `server`, whose password must be plaintext.
    #[must_use]
    pub fn new(server: ServerSettings, timeouts: Timeouts) -> Self {
        Self {
            server,
            timeouts,
            client_hostname: "localhost".to_string(),
            dial: None,
        }
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn with_client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Dials `host:port` instead of the configured address. The transport
    /// is still chosen from the configured port and flag.
    #[must_use]
    pub fn connect_to(mut self, host: impl Into<String>, port: u16) -> Self {
        self.dial = Some((host.into(), port));
        self
    }

    /// Transport this dispatcher will use.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        Transport::resolve(self.server.port, self.server.secure)
    }

    async fn session(&self) -> DispatchResult<Client<mailsync_smtp::Authenticated>> {
        let host = self.server.host.as_str();
        let port = self.server.port;
        let transport = self.transport();
        let (dial_host, dial_port) = self
            .dial
            .as_ref()
            .map_or((host, port), |(h, p)| (h.as_str(), *p));
        debug!(host, port, dial_host, dial_port, ?transport, "Opening SMTP session");

        let client = stage("connect", self.timeouts.connect(), async {
            let stream = match transport {
                Transport::Tls => mailsync_smtp::connect_tls(dial_host, dial_port).await?,
                Transport::StartTls | Transport::Opportunistic => {
                    mailsync_smtp::connect(dial_host, dial_port).await?
                }
            };
            let client: Client<Connected> = Client::from_stream(stream).await?;
            let client = client.ehlo(&self.client_hostname).await?;
            match transport {
                Transport::StartTls => client.starttls(host).await,
                Transport::Opportunistic if client.server_info().supports_starttls() => {
                    client.starttls(host).await
                }
                Transport::Tls | Transport::Opportunistic => Ok(client),
            }
        })
        .await?;

        stage(
            "auth",
            self.timeouts.auth(),
            client.authenticate(&self.server.username, &self.server.password),
        )
        .await
    }
}

impl Dispatcher for SmtpDispatcher {
    async fn send(&self, message: &OutgoingMessage) -> DispatchResult<()> {
        let recipients = message
            .envelope_recipients()
            .into_iter()
            .map(Address::new)
            .collect::<mailsync_smtp::Result<Vec<_>>>()
            .map_err(|e| DispatchError::InvalidAddress(e.to_string()))?;
        if recipients.is_empty() {
            return Err(DispatchError::InvalidAddress(
                "No recipients specified".into(),
            ));
        }
        let from = Address::new(envelope_address(&message.from))
            .map_err(|e| DispatchError::InvalidAddress(e.to_string()))?;

        let client = self.session().await?;
        let body = message.to_rfc5322();

        let client = stage("send", self.timeouts.command(), async {
            let client = client.mail_from(&from).await?;
            let (first, rest) = recipients
                .split_first()
                .ok_or_else(|| mailsync_smtp::Error::InvalidAddress("no recipients".into()))?;
            let mut client = client.rcpt_to(first).await?;
            for rcpt in rest {
                client = client.rcpt_to(rcpt).await?;
            }
            client.data().await?.send_message(body.as_bytes()).await
        })
        .await?;

        if let Err(e) = client.quit().await {
            debug!(error = %e, "SMTP QUIT failed after delivery");
        }
        info!(recipients = recipients.len(), "Message dispatched");
        Ok(())
    }

    async fn verify_connection(&self) -> bool {
        match self.session().await {
            Ok(client) => {
                if let Err(e) = client.quit().await {
                    debug!(error = %e, "SMTP QUIT failed during verification");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "SMTP verification failed");
                false
            }
        }
    }
}

async fn stage<T>(
    name: &'static str,
    limit: Duration,
    fut: impl Future<Output = mailsync_smtp::Result<T>>,
) -> DispatchResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(stage = name, error = %e, "SMTP operation failed");
            Err(classify(name, e))
        }
        Err(_) => {
            warn!(stage = name, "SMTP operation timed out");
            Err(DispatchError::Timeout(name))
        }
    }
}

fn classify(stage: &str, error: mailsync_smtp::Error) -> DispatchError {
    use mailsync_smtp::Error;
    match (stage, error) {
        (_, e @ (Error::Io(_) | Error::Tls(_) | Error::InvalidDnsName(_))) => {
            DispatchError::Connection(e.to_string())
        }
        ("connect", e) => DispatchError::Connection(e.to_string()),
        ("auth", e) => DispatchError::Authentication(e.to_string()),
        (_, Error::Rejected { code, message }) => DispatchError::Rejected { code, message },
        (_, Error::InvalidAddress(m)) => DispatchError::InvalidAddress(m),
        (_, e) => DispatchError::Send(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ports_override_secure_flag() {
        assert_eq!(Transport::resolve(587, true), Transport::StartTls);
        assert_eq!(Transport::resolve(587, false), Transport::StartTls);
        assert_eq!(Transport::resolve(465, false), Transport::Tls);
        assert_eq!(Transport::resolve(465, true), Transport::Tls);
    }

    #[test]
    fn other_ports_follow_secure_flag() {
        assert_eq!(Transport::resolve(2525, true), Transport::Tls);
        assert_eq!(Transport::resolve(25, false), Transport::Opportunistic);
    }

    #[test]
    fn dispatcher_reports_resolved_transport() {
        let server = ServerSettings::new("smtp.example.com", 587, "u", "p", true);
        let dispatcher = SmtpDispatcher::new(server, Timeouts::default());
        assert_eq!(dispatcher.transport(), Transport::StartTls);
    }

    #[test]
    fn errors_are_classified_by_stage() {
        use mailsync_smtp::Error;
        let rejected = || Error::Rejected {
            code: 535,
            message: "bad credentials".into(),
        };
        assert!(matches!(
            classify("auth", rejected()),
            DispatchError::Authentication(_)
        ));
        assert!(matches!(
            classify("send", rejected()),
            DispatchError::Rejected { code: 535, .. }
        ));
        assert!(matches!(
            classify("connect", Error::NotSupported("STARTTLS".into())),
            DispatchError::Connection(_)
        ));
        assert!(matches!(
            classify("send", Error::Io(std::io::Error::other("reset"))),
            DispatchError::Connection(_)
        ));
    }

    #[tokio::test]
    async fn no_recipients_is_rejected_before_connecting() {
        let server = ServerSettings::new("127.0.0.1", 1, "u", "p", false);
        let dispatcher = SmtpDispatcher::new(server, Timeouts::default());
        let err = dispatcher
            .send(&OutgoingMessage::new("a@example.com", "x").text("y"))
            .await;
        assert!(matches!(err, Err(DispatchError::InvalidAddress(_))));
    }
}
