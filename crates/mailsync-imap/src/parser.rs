//! IMAP response parser.
//!
//! Parses one complete server response, as assembled by
//! [`FramedStream::read_response`](crate::FramedStream::read_response), into a
//! [`Response`]. Literals appear inline as `{n}\r\n` followed by `n` bytes.

#![allow(clippy::missing_errors_doc)]

use crate::types::{Flag, Flags, ListEntry, Status, Uid};
use crate::{Error, Result};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: String,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Text after the `+`.
        text: String,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|BYE|PREAUTH [code] text`
    Status {
        /// Condition.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<String>),
    /// `* LIST (attrs) delim name`
    List(ListEntry),
    /// `* SEARCH n n n`
    Search(Vec<u32>),
    /// `* FLAGS (...)`
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Returned data items.
        items: Vec<FetchItem>,
    },
    /// Anything not modelled above.
    Other(String),
}

/// Response code inside `[...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `ALERT`
    Alert,
    /// `CAPABILITY ...`
    Capability(Vec<String>),
    /// `READ-ONLY`
    ReadOnly,
    /// `READ-WRITE`
    ReadWrite,
    /// `TRYCREATE`
    TryCreate,
    /// `UIDVALIDITY n`
    UidValidity(u32),
    /// `UIDNEXT n`
    UidNext(u32),
    /// `APPENDUID validity uid` (RFC 4315)
    AppendUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u32,
        /// UID assigned to the appended message.
        uid: u32,
    },
    /// `COPYUID validity source dest` (RFC 4315)
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u32,
        /// Source UIDs, expanded.
        source: Vec<u32>,
        /// Destination UIDs, expanded and positionally matching `source`.
        dest: Vec<u32>,
    },
    /// Any other code, by name.
    Other(String),
}

/// One data item from a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID n`
    Uid(Uid),
    /// `FLAGS (...)`
    Flags(Flags),
    /// `INTERNALDATE "..."`, unparsed.
    InternalDate(String),
    /// `RFC822.SIZE n`
    Rfc822Size(u32),
    /// `BODY[section] nstring`
    Body {
        /// Section specifier; empty for the full message.
        section: String,
        /// Content, or `None` for NIL.
        data: Option<Vec<u8>>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut cur = Cursor::new(input);
        match cur.peek() {
            Some(b'*') => {
                cur.advance(1);
                cur.expect(b' ')?;
                parse_untagged(&mut cur).map(Response::Untagged)
            }
            Some(b'+') => {
                cur.advance(1);
                cur.eat(b' ');
                Ok(Response::Continuation {
                    text: cur.rest_of_line(),
                })
            }
            Some(_) => {
                let tag = cur.atom()?.to_string();
                cur.expect(b' ')?;
                let status = parse_status(cur.atom()?)
                    .ok_or_else(|| Error::parse(cur.pos, "expected OK, NO or BAD"))?;
                let (code, text) = parse_resp_text(&mut cur)?;
                Ok(Response::Tagged {
                    tag,
                    status,
                    code,
                    text,
                })
            }
            None => Err(Error::parse(0, "empty response")),
        }
    }
}

fn parse_status(word: &str) -> Option<Status> {
    match word.to_ascii_uppercase().as_str() {
        "OK" => Some(Status::Ok),
        "NO" => Some(Status::No),
        "BAD" => Some(Status::Bad),
        "PREAUTH" => Some(Status::PreAuth),
        "BYE" => Some(Status::Bye),
        _ => None,
    }
}

fn parse_untagged(cur: &mut Cursor<'_>) -> Result<UntaggedResponse> {
    if cur.peek().is_some_and(|b| b.is_ascii_digit()) {
        let n = cur.number()?;
        cur.expect(b' ')?;
        let kind = cur.atom()?.to_ascii_uppercase();
        return match kind.as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "RECENT" => Ok(UntaggedResponse::Recent(n)),
            "EXPUNGE" => Ok(UntaggedResponse::Expunge(n)),
            "FETCH" => {
                cur.expect(b' ')?;
                let items = parse_fetch_items(cur)?;
                Ok(UntaggedResponse::Fetch { seq: n, items })
            }
            _ => Ok(UntaggedResponse::Other(format!("{n} {kind}"))),
        };
    }

    let word = cur.atom()?.to_ascii_uppercase();
    if let Some(status) = parse_status(&word) {
        let (code, text) = parse_resp_text(cur)?;
        return Ok(UntaggedResponse::Status { status, code, text });
    }

    match word.as_str() {
        "CAPABILITY" => Ok(UntaggedResponse::Capability(parse_atoms_until(cur, None)?)),
        "LIST" | "LSUB" => {
            cur.expect(b' ')?;
            parse_list(cur).map(UntaggedResponse::List)
        }
        "SEARCH" => {
            let mut ids = Vec::new();
            while cur.eat(b' ') {
                if cur.peek().is_some_and(|b| b.is_ascii_digit()) {
                    ids.push(cur.number()?);
                } else {
                    break;
                }
            }
            Ok(UntaggedResponse::Search(ids))
        }
        "FLAGS" => {
            cur.expect(b' ')?;
            parse_flag_list(cur).map(UntaggedResponse::Flags)
        }
        _ => Ok(UntaggedResponse::Other(word)),
    }
}

/// Parses `[SP "[" code "]"] [SP text]` up to the end of the line.
fn parse_resp_text(cur: &mut Cursor<'_>) -> Result<(Option<ResponseCode>, String)> {
    cur.eat(b' ');
    let code = if cur.eat(b'[') {
        let code = parse_response_code(cur)?;
        cur.eat(b' ');
        Some(code)
    } else {
        None
    };
    Ok((code, cur.rest_of_line()))
}

fn parse_response_code(cur: &mut Cursor<'_>) -> Result<ResponseCode> {
    let name = cur.atom()?.to_ascii_uppercase();
    let code = match name.as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDVALIDITY" => {
            cur.expect(b' ')?;
            ResponseCode::UidValidity(cur.number()?)
        }
        "UIDNEXT" => {
            cur.expect(b' ')?;
            ResponseCode::UidNext(cur.number()?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_atoms_until(cur, Some(b']'))?),
        "APPENDUID" => {
            cur.expect(b' ')?;
            let uid_validity = cur.number()?;
            cur.expect(b' ')?;
            match expand_set(cur.set_token(), cur.pos)? {
                Some(uids) => {
                    let uid = uids
                        .first()
                        .copied()
                        .ok_or_else(|| Error::parse(cur.pos, "empty APPENDUID set"))?;
                    ResponseCode::AppendUid { uid_validity, uid }
                }
                None => ResponseCode::Other(name),
            }
        }
        "COPYUID" => {
            cur.expect(b' ')?;
            let uid_validity = cur.number()?;
            cur.expect(b' ')?;
            let source = expand_set(cur.set_token(), cur.pos)?;
            cur.expect(b' ')?;
            let dest = expand_set(cur.set_token(), cur.pos)?;
            match (source, dest) {
                (Some(source), Some(dest)) => ResponseCode::CopyUid {
                    uid_validity,
                    source,
                    dest,
                },
                _ => ResponseCode::Other(name),
            }
        }
        _ => {
            cur.skip_until(b']');
            ResponseCode::Other(name)
        }
    };
    cur.expect(b']')?;
    Ok(code)
}

/// Reads space-separated atoms until end of line or `stop`.
fn parse_atoms_until(cur: &mut Cursor<'_>, stop: Option<u8>) -> Result<Vec<String>> {
    let mut atoms = Vec::new();
    loop {
        match cur.peek() {
            Some(b' ') => cur.advance(1),
            Some(b'\r' | b'\n') | None => break,
            Some(b) if Some(b) == stop => break,
            Some(_) => atoms.push(cur.atom()?.to_string()),
        }
    }
    Ok(atoms)
}

fn parse_list(cur: &mut Cursor<'_>) -> Result<ListEntry> {
    cur.expect(b'(')?;
    let mut attributes = Vec::new();
    loop {
        match cur.peek() {
            Some(b')') => {
                cur.advance(1);
                break;
            }
            Some(b' ') => cur.advance(1),
            Some(_) => attributes.push(cur.atom()?.to_string()),
            None => return Err(Error::parse(cur.pos, "unterminated LIST attributes")),
        }
    }
    cur.expect(b' ')?;
    let delimiter = match cur.nstring()? {
        Some(bytes) => String::from_utf8_lossy(&bytes).chars().next(),
        None => None,
    };
    cur.expect(b' ')?;
    let name = cur.astring()?;
    Ok(ListEntry {
        attributes,
        delimiter,
        name,
    })
}

fn parse_flag_list(cur: &mut Cursor<'_>) -> Result<Flags> {
    cur.expect(b'(')?;
    let mut flags = Flags::new();
    loop {
        match cur.peek() {
            Some(b')') => {
                cur.advance(1);
                return Ok(flags);
            }
            Some(b' ') => cur.advance(1),
            Some(_) => flags.insert(Flag::parse(cur.atom()?)),
            None => return Err(Error::parse(cur.pos, "unterminated flag list")),
        }
    }
}

fn parse_fetch_items(cur: &mut Cursor<'_>) -> Result<Vec<FetchItem>> {
    cur.expect(b'(')?;
    let mut items = Vec::new();
    loop {
        match cur.peek() {
            Some(b')') => {
                cur.advance(1);
                return Ok(items);
            }
            Some(b' ') => cur.advance(1),
            Some(_) => {
                let name = cur.atom()?.to_ascii_uppercase();
                match name.as_str() {
                    "UID" => {
                        cur.expect(b' ')?;
                        let n = cur.number()?;
                        let uid = Uid::new(n).ok_or_else(|| Error::parse(cur.pos, "UID 0"))?;
                        items.push(FetchItem::Uid(uid));
                    }
                    "FLAGS" => {
                        cur.expect(b' ')?;
                        items.push(FetchItem::Flags(parse_flag_list(cur)?));
                    }
                    "INTERNALDATE" => {
                        cur.expect(b' ')?;
                        let raw = cur.nstring()?.unwrap_or_default();
                        items.push(FetchItem::InternalDate(
                            String::from_utf8_lossy(&raw).into_owned(),
                        ));
                    }
                    "RFC822.SIZE" => {
                        cur.expect(b' ')?;
                        items.push(FetchItem::Rfc822Size(cur.number()?));
                    }
                    "BODY" | "BODY.PEEK" | "BINARY" if cur.peek() == Some(b'[') => {
                        cur.advance(1);
                        let start = cur.pos;
                        cur.skip_until(b']');
                        let section = String::from_utf8_lossy(&cur.input[start..cur.pos]).into_owned();
                        cur.expect(b']')?;
                        if cur.eat(b'<') {
                            cur.skip_until(b'>');
                            cur.expect(b'>')?;
                        }
                        cur.expect(b' ')?;
                        let data = cur.nstring()?;
                        items.push(FetchItem::Body { section, data });
                    }
                    _ => {
                        cur.expect(b' ')?;
                        cur.skip_value()?;
                    }
                }
            }
            None => return Err(Error::parse(cur.pos, "unterminated FETCH")),
        }
    }
}

/// Largest UID set a response code may expand to.
const MAX_SET_MEMBERS: u64 = 100_000;

/// Expands a sequence set such as `3:5,9` into `[3, 4, 5, 9]`.
///
/// Returns `None` when the set has more than [`MAX_SET_MEMBERS`] members.
fn expand_set(token: &str, position: usize) -> Result<Option<Vec<u32>>> {
    let parse = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| Error::parse(position, format!("invalid set member {s:?}")))
    };
    let mut ranges = Vec::new();
    let mut members = 0u64;
    for part in token.split(',') {
        let (lo, hi) = match part.split_once(':') {
            Some((a, b)) => {
                let (a, b) = (parse(a)?, parse(b)?);
                (a.min(b), a.max(b))
            }
            None => {
                let n = parse(part)?;
                (n, n)
            }
        };
        members += u64::from(hi - lo) + 1;
        if members > MAX_SET_MEMBERS {
            tracing::debug!(set = token, "UID set too large, ignoring");
            return Ok(None);
        }
        ranges.push((lo, hi));
    }
    Ok(Some(ranges.into_iter().flat_map(|(lo, hi)| lo..=hi).collect()))
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(Error::parse(self.pos, format!("expected {:?}", b as char)))
        }
    }

    fn skip_until(&mut self, b: u8) {
        while let Some(c) = self.peek() {
            if c == b || c == b'\r' {
                break;
            }
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        // Predicates only admit ASCII.
        std::str::from_utf8(&self.input[start..self.pos]).unwrap_or_default()
    }

    fn atom(&mut self) -> Result<&'a str> {
        let atom = self.take_while(|b| {
            b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'[' | b']' | b'"' | b'{')
        });
        if atom.is_empty() {
            Err(Error::parse(self.pos, "expected atom"))
        } else {
            Ok(atom)
        }
    }

    fn number(&mut self) -> Result<u32> {
        let digits = self.take_while(|b| b.is_ascii_digit());
        digits
            .parse()
            .map_err(|_| Error::parse(self.pos, "expected number"))
    }

    fn set_token(&mut self) -> &'a str {
        self.take_while(|b| b.is_ascii_digit() || matches!(b, b':' | b',' | b'*'))
    }

    fn quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| Error::parse(self.pos, "dangling escape"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(b'\r' | b'\n') | None => {
                    return Err(Error::parse(self.pos, "unterminated quoted string"));
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn literal(&mut self) -> Result<&'a [u8]> {
        self.expect(b'{')?;
        let len = self.number()? as usize;
        self.eat(b'+');
        self.expect(b'}')?;
        self.expect(b'\r')?;
        self.expect(b'\n')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| Error::parse(self.pos, "truncated literal"))?;
        let data = &self.input[self.pos..end];
        self.pos = end;
        Ok(data)
    }

    fn nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'"') => self.quoted().map(Some),
            Some(b'{') => self.literal().map(|d| Some(d.to_vec())),
            _ => {
                let word = self.atom()?;
                if word.eq_ignore_ascii_case("NIL") {
                    Ok(None)
                } else {
                    Err(Error::parse(self.pos, "expected string or NIL"))
                }
            }
        }
    }

    fn astring(&mut self) -> Result<String> {
        let bytes = match self.peek() {
            Some(b'"') => self.quoted()?,
            Some(b'{') => self.literal()?.to_vec(),
            _ => self.atom()?.as_bytes().to_vec(),
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Skips one value of any shape: atom, number, string, literal or list.
    fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'"') => self.quoted().map(drop),
            Some(b'{') => self.literal().map(drop),
            Some(b'(') => {
                self.pos += 1;
                loop {
                    match self.peek() {
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(());
                        }
                        Some(b' ') => self.pos += 1,
                        Some(_) => self.skip_value()?,
                        None => return Err(Error::parse(self.pos, "unterminated list")),
                    }
                }
            }
            _ => {
                self.atom()?;
                if self.eat(b'[') {
                    self.skip_until(b']');
                    self.expect(b']')?;
                }
                Ok(())
            }
        }
    }

    fn rest_of_line(&mut self) -> String {
        let start = self.pos;
        let end = self.input[start..]
            .windows(2)
            .position(|w| w == b"\r\n")
            .map_or(self.input.len(), |p| start + p);
        self.pos = end;
        String::from_utf8_lossy(&self.input[start..end]).into_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(u) => u,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    #[test]
    fn tagged_ok_with_code() {
        let response = ResponseParser::parse(b"A0003 OK [READ-ONLY] EXAMINE completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: "A0003".into(),
                status: Status::Ok,
                code: Some(ResponseCode::ReadOnly),
                text: "EXAMINE completed".into(),
            }
        );
    }

    #[test]
    fn tagged_no_without_text() {
        let response = ResponseParser::parse(b"A0001 NO\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Tagged { status: Status::No, code: None, ref text, .. } if text.is_empty()
        ));
    }

    #[test]
    fn greeting_with_capabilities() {
        let u = untagged(b"* OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] ready\r\n");
        assert_eq!(
            u,
            UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::Capability(vec![
                    "IMAP4rev1".into(),
                    "MOVE".into(),
                    "UIDPLUS".into()
                ])),
                text: "ready".into(),
            }
        );
    }

    #[test]
    fn list_with_quoted_and_literal_names() {
        let u = untagged(b"* LIST (\\HasNoChildren) \"/\" \"Sent Items\"\r\n");
        assert_eq!(
            u,
            UntaggedResponse::List(ListEntry {
                attributes: vec!["\\HasNoChildren".into()],
                delimiter: Some('/'),
                name: "Sent Items".into(),
            })
        );

        let u = untagged(b"* LIST () NIL {5}\r\nInbox\r\n");
        let UntaggedResponse::List(entry) = u else {
            panic!("expected LIST");
        };
        assert_eq!(entry.delimiter, None);
        assert_eq!(entry.name, "Inbox");
    }

    #[test]
    fn search_results() {
        assert_eq!(
            untagged(b"* SEARCH 4 7 19\r\n"),
            UntaggedResponse::Search(vec![4, 7, 19])
        );
        assert_eq!(untagged(b"* SEARCH\r\n"), UntaggedResponse::Search(vec![]));
    }

    #[test]
    fn fetch_with_body_literal() {
        let input = b"* 2 FETCH (UID 44 FLAGS (\\Seen \\Flagged) INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" BODY[] {11}\r\nHello World)\r\n";
        let UntaggedResponse::Fetch { seq, items } = untagged(input) else {
            panic!("expected FETCH");
        };
        assert_eq!(seq, 2);
        assert_eq!(items[0], FetchItem::Uid(Uid::new(44).unwrap()));
        let FetchItem::Flags(flags) = &items[1] else {
            panic!("expected FLAGS");
        };
        assert!(flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::Flagged));
        assert_eq!(
            items[2],
            FetchItem::InternalDate("17-Jul-1996 02:44:25 -0700".into())
        );
        assert_eq!(
            items[3],
            FetchItem::Body {
                section: String::new(),
                data: Some(b"Hello World".to_vec()),
            }
        );
    }

    #[test]
    fn fetch_skips_unknown_items() {
        let input = b"* 1 FETCH (MODSEQ (12) ENVELOPE (NIL \"x\" (a b)) UID 3)\r\n";
        let UntaggedResponse::Fetch { items, .. } = untagged(input) else {
            panic!("expected FETCH");
        };
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(3).unwrap())]);
    }

    #[test]
    fn copyuid_expands_ranges() {
        let response =
            ResponseParser::parse(b"A0007 OK [COPYUID 38505 304,319:320 3956:3958] Done\r\n")
                .unwrap();
        let Response::Tagged {
            code: Some(ResponseCode::CopyUid { source, dest, .. }),
            ..
        } = response
        else {
            panic!("expected COPYUID");
        };
        assert_eq!(source, vec![304, 319, 320]);
        assert_eq!(dest, vec![3956, 3957, 3958]);
    }

    #[test]
    fn oversized_uid_sets_are_ignored() {
        let response =
            ResponseParser::parse(b"A0008 OK [COPYUID 1 1:4294967295 1:4294967295] Done\r\n")
                .unwrap();
        let Response::Tagged { status, code, .. } = response else {
            panic!("expected tagged response");
        };
        assert_eq!(status, Status::Ok);
        assert_eq!(code, Some(ResponseCode::Other("COPYUID".into())));

        let response =
            ResponseParser::parse(b"A0009 OK [APPENDUID 1 5,1:4294967295] Done\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Tagged { code: Some(ResponseCode::Other(_)), .. }
        ));

        assert_eq!(expand_set("1:100000", 0).unwrap().map(|v| v.len()), Some(100_000));
        assert_eq!(expand_set("0:100000", 0).unwrap(), None);
    }

    #[test]
    fn continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal data\r\n").unwrap(),
            Response::Continuation {
                text: "Ready for literal data".into()
            }
        );
    }

    #[test]
    fn exists_and_uidvalidity() {
        assert_eq!(untagged(b"* 17 EXISTS\r\n"), UntaggedResponse::Exists(17));
        assert_eq!(
            untagged(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n"),
            UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::UidValidity(3_857_529_045)),
                text: "UIDs valid".into(),
            }
        );
    }

    #[test]
    fn truncated_literal_is_an_error() {
        assert!(ResponseParser::parse(b"* 1 FETCH (BODY[] {50}\r\nshort)\r\n").is_err());
    }

    proptest::proptest! {
        #[test]
        fn parser_never_panics(input in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let _ = ResponseParser::parse(&input);
        }
    }
}
