//! # mailsync-smtp
//!
//! An async SMTP submission client (RFC 5321): EHLO, STARTTLS, AUTH PLAIN and
//! LOGIN, and a single-message mail transaction.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsync_smtp::{Address, Client, connect};
//!
//! let stream = connect("smtp.example.com", 587).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo("localhost").await?;
//! let client = client.starttls("smtp.example.com").await?;
//! let client = client.authenticate("user@example.com", "password").await?;
//!
//! let client = client.mail_from(&Address::new("user@example.com")?).await?;
//! let client = client.rcpt_to(&Address::new("friend@example.com")?).await?;
//! let client = client.data().await?;
//! let client = client.send_message(b"Subject: hi\r\n\r\nHello\r\n").await?;
//! client.quit().await?;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── authenticate() ──→ Authenticated
//!     │                               │
//!     └──────── mail_from() ──────────┴──→ MailTransaction
//!                                              │ rcpt_to()
//!                                              ▼
//!                         Connected ←── RecipientAdded ── data() ──→ Data
//!                             ▲                                      │
//!                             └──────────── send_message() ──────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SmtpStream, connect, connect_tls,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Reply, ReplyCode};
