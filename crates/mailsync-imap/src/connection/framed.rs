//! Framed I/O for the IMAP protocol.
//!
//! Server output is a sequence of CRLF-terminated lines. A line ending in
//! `{n}` announces a literal: exactly `n` raw bytes follow, after which the
//! logical response continues on the next line.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

const READ_CHUNK: usize = 8192;

/// Upper bound on a single line, literals excluded.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Upper bound on a single literal.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered IMAP connection.
pub struct FramedStream<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Reads one complete response, including any embedded literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(len) = literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            self.fill_to(len).await?;
            response.extend_from_slice(&self.buffer.split_to(len));
        }

        Ok(response)
    }

    /// Reads responses until the tagged completion for `tag` arrives.
    ///
    /// Returns every response read, the tagged one last.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buffer[scanned..]) {
                return Ok(self.buffer.split_to(scanned + pos + 2).to_vec());
            }
            scanned = self.buffer.len().saturating_sub(1);
            if scanned > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
            self.read_more().await?;
        }
    }

    async fn fill_to(&mut self, len: usize) -> Result<()> {
        while self.buffer.len() < len {
            self.read_more().await?;
        }
        Ok(())
    }

    async fn read_more(&mut self) -> Result<()> {
        self.buffer.reserve(READ_CHUNK);
        let n = self.stream.read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        Ok(())
    }

    /// Writes bytes and flushes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Returns the inner stream.
    ///
    /// Fails if the server already sent bytes that were not consumed, which
    /// after STARTTLS would indicate plaintext injection.
    pub fn into_inner(self) -> Result<S> {
        if !self.buffer.is_empty() {
            return Err(Error::Protocol(
                "unexpected data buffered before TLS upgrade".to_string(),
            ));
        }
        Ok(self.stream)
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn is_tagged(response: &[u8], tag: &str) -> bool {
    response.strip_prefix(tag.as_bytes()).is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Parses `{123}\r\n` or `{123+}\r\n` at the end of a line.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    std::str::from_utf8(&line[open + 1..]).ok()?.parse().ok()
}
