//! # mailsync-imap
//!
//! A compact async IMAP client (RFC 9051 / RFC 3501 subset) covering what a
//! mailbox synchronizer needs: LOGIN, LIST, SELECT/EXAMINE, UID SEARCH,
//! UID FETCH, UID STORE, MOVE (with COPY fallback), EXPUNGE and APPEND.
//!
//! ## Connection States
//!
//! The client uses the type-state pattern so that only commands valid in the
//! current protocol state can be issued:
//!
//! ```text
//! ┌─────────────────────┐
//! │   NotAuthenticated  │ ─── login() ───→ Authenticated
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── select()/examine() ───→ Selected
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsync_imap::connection::{Client, connect_tls};
//!
//! let stream = connect_tls("imap.example.com", 993).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.login("user@example.com", "password").await?;
//! let (mut client, status) = client.examine("INBOX").await?;
//! let uids = client.uid_search_all().await?;
//! client.logout().await?;
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

pub use command::{Command, FetchAttribute, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Client, FramedStream, MailStream, NotAuthenticated, Selected, connect_plain,
    connect_tls,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseCode, ResponseParser, UntaggedResponse};
pub use types::{Flag, Flags, ListEntry, MailboxStatus, Status, Uid, UidSet};
