//! Construction of per-operation protocol clients.

use crate::account::ServerSettings;
use crate::config::Timeouts;
use crate::service::{Dispatcher, ImapMailbox, RemoteMailbox, SmtpDispatcher};

/// Builds the clients the orchestrator uses for one operation.
///
/// `server` always carries a decrypted password.
pub trait ClientFactory: Send + Sync {
    /// Retrieval client.
    type Mailbox: RemoteMailbox;
    /// Dispatch client.
    type Dispatcher: Dispatcher;

    /// Creates a retrieval client.
    fn mailbox(&self, server: ServerSettings, timeouts: Timeouts) -> Self::Mailbox;

    /// Creates a dispatch client.
    fn dispatcher(&self, server: ServerSettings, timeouts: Timeouts) -> Self::Dispatcher;
}

/// Real IMAP and SMTP clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkClients;

impl ClientFactory for NetworkClients {
    type Mailbox = ImapMailbox;
    type Dispatcher = SmtpDispatcher;

    fn mailbox(&self, server: ServerSettings, timeouts: Timeouts) -> ImapMailbox {
        ImapMailbox::new(server, timeouts)
    }

    fn dispatcher(&self, server: ServerSettings, timeouts: Timeouts) -> SmtpDispatcher {
        SmtpDispatcher::new(server, timeouts)
    }
}
