//! Network services: the remote mailbox client and the outbound dispatcher.

mod compose;
mod dispatch;
mod mailbox;
mod parse;

pub use compose::{Attachment, OutgoingMessage, envelope_address};
pub use dispatch::{Dispatcher, SmtpDispatcher, Transport};
pub use mailbox::{FetchStage, ImapMailbox, RemoteMailbox};
pub use parse::{RemoteMessage, parse_message};
