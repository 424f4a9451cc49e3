//! IMAP command serialization and tag generation.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{Flag, UidSet};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0000", "A0001", etc.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", self.prefix, n)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

/// Message data items requested by UID FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `BODY.PEEK[]`: full message without setting `\Seen`.
    BodyPeek,
}

impl FetchAttribute {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Uid => "UID",
            Self::Flags => "FLAGS",
            Self::InternalDate => "INTERNALDATE",
            Self::Rfc822Size => "RFC822.SIZE",
            Self::BodyPeek => "BODY.PEEK[]",
        }
    }
}

/// Flag modification for UID STORE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`
    Add(Vec<Flag>),
    /// `-FLAGS`
    Remove(Vec<Flag>),
}

/// An IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CAPABILITY`
    Capability,
    /// `STARTTLS`
    StartTls,
    /// `LOGIN user pass`
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// `LOGOUT`
    Logout,
    /// `NOOP`
    Noop,
    /// `LIST reference pattern`
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// `SELECT mailbox`
    Select(String),
    /// `EXAMINE mailbox`
    Examine(String),
    /// `UID SEARCH ALL`
    UidSearchAll,
    /// `UID FETCH set (items)`
    UidFetch {
        /// UIDs to fetch.
        uids: UidSet,
        /// Requested data items.
        items: Vec<FetchAttribute>,
    },
    /// `UID STORE set +FLAGS.SILENT (...)`
    UidStore {
        /// UIDs to modify.
        uids: UidSet,
        /// Flag change.
        action: StoreAction,
    },
    /// `UID COPY set mailbox`
    UidCopy {
        /// UIDs to copy.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: String,
    },
    /// `UID MOVE set mailbox` (RFC 6851)
    UidMove {
        /// UIDs to move.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: String,
    },
    /// `EXPUNGE`
    Expunge,
    /// `UID EXPUNGE set` (RFC 4315)
    UidExpunge(UidSet),
    /// `APPEND mailbox (flags) {size}`; the literal follows a continuation.
    Append {
        /// Destination mailbox.
        mailbox: String,
        /// Flags to set on the stored message.
        flags: Vec<Flag>,
        /// Literal size in bytes.
        size: usize,
    },
}

impl Command {
    /// Serializes the command with the given tag, CRLF-terminated.
    ///
    /// Literals are inlined; use [`serialize_parts`](Self::serialize_parts)
    /// to send a command that carries them.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        self.serialize_parts(tag).concat()
    }

    /// Serializes the command split at each synchronizing literal.
    ///
    /// Every part but the last ends with `{n}\r\n`; the server must answer
    /// it with a continuation before the next part is sent.
    #[must_use]
    pub fn serialize_parts(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut enc = Encoder::default();
        enc.raw(tag.as_bytes());
        enc.raw(b" ");

        match self {
            Self::Capability => enc.raw(b"CAPABILITY"),
            Self::StartTls => enc.raw(b"STARTTLS"),
            Self::Login { username, password } => {
                enc.raw(b"LOGIN ");
                enc.astring(username);
                enc.raw(b" ");
                enc.astring(password);
            }
            Self::Logout => enc.raw(b"LOGOUT"),
            Self::Noop => enc.raw(b"NOOP"),
            Self::List { reference, pattern } => {
                enc.raw(b"LIST ");
                enc.string(reference);
                enc.raw(b" ");
                enc.string(pattern);
            }
            Self::Select(mailbox) => {
                enc.raw(b"SELECT ");
                enc.astring(mailbox);
            }
            Self::Examine(mailbox) => {
                enc.raw(b"EXAMINE ");
                enc.astring(mailbox);
            }
            Self::UidSearchAll => enc.raw(b"UID SEARCH ALL"),
            Self::UidFetch { uids, items } => {
                enc.raw(format!("UID FETCH {uids} (").as_bytes());
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        enc.raw(b" ");
                    }
                    enc.raw(item.as_str().as_bytes());
                }
                enc.raw(b")");
            }
            Self::UidStore { uids, action } => {
                let (prefix, flags) = match action {
                    StoreAction::Add(f) => ("+FLAGS.SILENT", f),
                    StoreAction::Remove(f) => ("-FLAGS.SILENT", f),
                };
                enc.raw(format!("UID STORE {uids} {prefix} ").as_bytes());
                enc.flag_list(flags);
            }
            Self::UidCopy { uids, mailbox } => {
                enc.raw(format!("UID COPY {uids} ").as_bytes());
                enc.astring(mailbox);
            }
            Self::UidMove { uids, mailbox } => {
                enc.raw(format!("UID MOVE {uids} ").as_bytes());
                enc.astring(mailbox);
            }
            Self::Expunge => enc.raw(b"EXPUNGE"),
            Self::UidExpunge(uids) => enc.raw(format!("UID EXPUNGE {uids}").as_bytes()),
            Self::Append {
                mailbox,
                flags,
                size,
            } => {
                enc.raw(b"APPEND ");
                enc.astring(mailbox);
                if !flags.is_empty() {
                    enc.raw(b" ");
                    enc.flag_list(flags);
                }
                enc.raw(format!(" {{{size}}}").as_bytes());
            }
        }

        enc.raw(b"\r\n");
        enc.finish()
    }
}

/// Accumulates command bytes, starting a new part after each literal
/// announcement.
#[derive(Default)]
struct Encoder {
    parts: Vec<Vec<u8>>,
    buf: Vec<u8>,
}

impl Encoder {
    fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Atom when possible, else quoted string, else literal.
    fn astring(&mut self, s: &str) {
        if !s.is_empty() && !s.bytes().any(needs_quoting) {
            self.raw(s.as_bytes());
        } else {
            self.string(s);
        }
    }

    /// Quoted string, or a literal when the value cannot be quoted.
    fn string(&mut self, s: &str) {
        if s.bytes().any(needs_literal) {
            self.literal(s.as_bytes());
            return;
        }
        self.buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.buf.push(b'\\');
            }
            self.buf.push(b);
        }
        self.buf.push(b'"');
    }

    fn literal(&mut self, bytes: &[u8]) {
        self.raw(format!("{{{}}}\r\n", bytes.len()).as_bytes());
        self.parts.push(std::mem::take(&mut self.buf));
        self.raw(bytes);
    }

    fn flag_list(&mut self, flags: &[Flag]) {
        self.buf.push(b'(');
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            self.raw(flag.as_str().as_bytes());
        }
        self.buf.push(b')');
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.parts.push(self.buf);
        self.parts
    }
}

/// Returns true if the byte cannot appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b >= 0x7F
}

/// Returns true if the byte cannot appear in a quoted string (RFC 3501 `QUOTED-CHAR`).
const fn needs_literal(b: u8) -> bool {
    b == b'\r' || b == b'\n' || b == 0 || b >= 0x80
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Uid;

    fn set(uids: &[u32]) -> UidSet {
        UidSet::from_uids(uids.iter().map(|&n| Uid::new(n).unwrap()))
    }

    #[test]
    fn tags_are_sequential() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0000");
        assert_eq!(tags.next(), "A0001");
    }

    #[test]
    fn login_quotes_special_characters() {
        let cmd = Command::Login {
            username: "user@example.com".into(),
            password: "p\"ss word".into(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 LOGIN user@example.com \"p\\\"ss word\"\r\n"
        );
    }

    #[test]
    fn eight_bit_password_is_sent_as_literal() {
        let cmd = Command::Login {
            username: "jörg".into(),
            password: "Grüße".into(),
        };
        let parts = cmd.serialize_parts("A0001");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], b"A0001 LOGIN {5}\r\n");
        assert_eq!(parts[1], "jörg {7}\r\n".as_bytes());
        assert_eq!(parts[2], "Grüße\r\n".as_bytes());
    }

    #[test]
    fn line_break_in_password_cannot_split_the_command() {
        let cmd = Command::Login {
            username: "user".into(),
            password: "a\r\nA0002 LOGOUT".into(),
        };
        let parts = cmd.serialize_parts("A0001");
        assert_eq!(
            parts,
            vec![
                b"A0001 LOGIN user {15}\r\n".to_vec(),
                b"a\r\nA0002 LOGOUT\r\n".to_vec(),
            ]
        );
    }

    #[test]
    fn plain_commands_are_one_part() {
        assert_eq!(Command::Noop.serialize_parts("A0009"), vec![b"A0009 NOOP\r\n".to_vec()]);
    }

    #[test]
    fn uid_fetch_items() {
        let cmd = Command::UidFetch {
            uids: set(&[1, 2, 3, 8]),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::BodyPeek,
            ],
        };
        assert_eq!(
            cmd.serialize("A0002"),
            b"A0002 UID FETCH 1:3,8 (UID FLAGS BODY.PEEK[])\r\n"
        );
    }

    #[test]
    fn uid_store_adds_silently() {
        let cmd = Command::UidStore {
            uids: set(&[5]),
            action: StoreAction::Add(vec![Flag::Seen, Flag::Deleted]),
        };
        assert_eq!(
            cmd.serialize("A0003"),
            b"A0003 UID STORE 5 +FLAGS.SILENT (\\Seen \\Deleted)\r\n"
        );
    }

    #[test]
    fn append_announces_literal() {
        let cmd = Command::Append {
            mailbox: "Sent Items".into(),
            flags: vec![Flag::Seen],
            size: 42,
        };
        assert_eq!(
            cmd.serialize("A0004"),
            b"A0004 APPEND \"Sent Items\" (\\Seen) {42}\r\n"
        );
    }

    #[test]
    fn list_quotes_both_arguments() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".into(),
        };
        assert_eq!(cmd.serialize("A0005"), b"A0005 LIST \"\" \"*\"\r\n");
    }
}
