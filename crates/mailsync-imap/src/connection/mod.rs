//! IMAP connection management.
//!
//! - Plaintext/TLS stream abstraction with STARTTLS upgrade
//! - Framed I/O for CRLF lines and literals
//! - Type-state client wrapper

mod client;
mod framed;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use framed::FramedStream;
pub use stream::{MailStream, connect_plain, connect_tls, create_tls_connector};
