//! Core IMAP types.

use std::fmt;

/// Unique identifier of a message within a mailbox (RFC 9051 §2.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(u32);

impl Uid {
    /// Creates a UID. Returns `None` for zero, which is not a valid UID.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of UIDs, serialized in compact range form (`1:3,7,9:10`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UidSet {
    uids: Vec<Uid>,
}

impl UidSet {
    /// Creates a set holding a single UID.
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self { uids: vec![uid] }
    }

    /// Creates a set from arbitrary UIDs; duplicates are dropped.
    #[must_use]
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Self {
        let mut uids: Vec<Uid> = uids.into_iter().collect();
        uids.sort_unstable();
        uids.dedup();
        Self { uids }
    }

    /// Returns true if the set holds no UIDs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Number of UIDs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uids.len()
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.uids.iter().map(|u| u.get()).peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while let Some(&next) = iter.peek() {
                if next == end + 1 {
                    end = next;
                    iter.next();
                } else {
                    break;
                }
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}

/// Message flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent (first session to see it).
    Recent,
    /// Keyword or any other server-defined flag.
    Keyword(String),
}

impl Flag {
    /// Parses a flag string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the flag in wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(s) => s,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered collection of message flags without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag if not already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Iterates over the flags in server order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.into_iter()
    }
}

/// Status of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed.
    Bad,
    /// Greeting: connection is already authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

/// One mailbox returned by LIST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Mailbox attributes such as `\Noselect` or `\HasChildren`.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter, if the server uses one.
    pub delimiter: Option<char>,
    /// Full mailbox name.
    pub name: String,
}

impl ListEntry {
    /// Returns false for `\Noselect` / `\NonExistent` entries.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|a| {
            a.eq_ignore_ascii_case("\\Noselect") || a.eq_ignore_ascii_case("\\NonExistent")
        })
    }
}

/// Mailbox state reported by SELECT/EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Predicted next UID.
    pub uid_next: Option<u32>,
    /// True when opened with EXAMINE or the server forced read-only.
    pub read_only: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn zero_is_not_a_uid() {
        assert!(Uid::new(0).is_none());
        assert_eq!(uid(7).get(), 7);
    }

    #[test]
    fn uid_set_compacts_ranges() {
        let set = UidSet::from_uids([uid(3), uid(1), uid(2), uid(7), uid(9), uid(10), uid(2)]);
        assert_eq!(set.to_string(), "1:3,7,9:10");
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn uid_set_single() {
        assert_eq!(UidSet::single(uid(42)).to_string(), "42");
        assert!(UidSet::default().is_empty());
    }

    #[test]
    fn flag_parse_is_case_insensitive() {
        assert_eq!(Flag::parse("\\seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\FLAGGED"), Flag::Flagged);
        assert_eq!(Flag::parse("$Forwarded"), Flag::Keyword("$Forwarded".into()));
        assert_eq!(Flag::Draft.as_str(), "\\Draft");
    }

    #[test]
    fn flags_deduplicate() {
        let flags: Flags = [Flag::Seen, Flag::Seen, Flag::Flagged].into_iter().collect();
        assert_eq!(flags.len(), 2);
        assert!(flags.contains(&Flag::Flagged));
    }

    #[test]
    fn noselect_is_not_selectable() {
        let entry = ListEntry {
            attributes: vec!["\\NoSelect".into()],
            delimiter: Some('/'),
            name: "[Gmail]".into(),
        };
        assert!(!entry.is_selectable());
    }
}
