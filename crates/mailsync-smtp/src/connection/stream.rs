//! Low-level SMTP stream handling.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::{Error, Result};

/// Longest reply line accepted.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// SMTP stream (TCP or TLS), buffered for line reads.
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Reads one line with the line terminator removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails, the peer closes the connection, or
    /// the line is unreasonably long.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = match self {
            Self::Tcp(reader) => reader.read_line(&mut line).await?,
            Self::Tls(reader) => reader.read_line(&mut line).await?,
        };
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("reply line too long".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Upgrades a TCP stream to TLS after a successful STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS, bytes were buffered
    /// past the STARTTLS reply, or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let reader = match self {
            Self::Tcp(reader) => reader,
            Self::Tls(_) => return Err(Error::Protocol("already using TLS".into())),
        };
        if !reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "unexpected data buffered before TLS upgrade".into(),
            ));
        }

        let server_name = ServerName::try_from(hostname.to_string())?;
        let tls = create_tls_connector()
            .connect(server_name, reader.into_inner())
            .await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// Connects over plain TCP (port 25/587, or STARTTLS later).
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let stream = TcpStream::connect((hostname, port)).await?;
    tracing::debug!(hostname, port, "SMTP plaintext connection established");
    Ok(SmtpStream::Tcp(BufReader::new(stream)))
}

/// Connects with implicit TLS (port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream> {
    let tcp = TcpStream::connect((hostname, port)).await?;
    let server_name = ServerName::try_from(hostname.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    tracing::debug!(hostname, port, "SMTP TLS connection established");
    Ok(SmtpStream::Tls(Box::new(BufReader::new(tls))))
}

fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}
