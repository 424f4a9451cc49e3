//! Parsing fetched messages into the cache shape.

use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail, SingleInfo};

use crate::cache::AttachmentMeta;

/// A message as fetched from the remote mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    /// Remote identifier within the fetched folder.
    pub uid: u32,
    /// Raw protocol flags.
    pub flags: Vec<String>,
    /// `Message-ID` header.
    pub message_id: Option<String>,
    /// Sender.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind-copy recipients, when the header survived.
    pub bcc: Vec<String>,
    /// `Reply-To` header.
    pub reply_to: Option<String>,
    /// Decoded subject.
    pub subject: String,
    /// `Date` header, else the server's INTERNALDATE, else the epoch.
    pub date: DateTime<Utc>,
    /// First `text/plain` part.
    pub text_body: Option<String>,
    /// First `text/html` part.
    pub html_body: Option<String>,
    /// Attachment metadata.
    pub attachments: Vec<AttachmentMeta>,
}

impl RemoteMessage {
    /// Returns true if `\Seen` is set.
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.has_flag("\\Seen")
    }

    /// Returns true if `\Flagged` is set.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.has_flag("\\Flagged")
    }

    fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }
}

/// Parses a raw RFC 5322 message.
///
/// # Errors
///
/// Returns an error if the MIME structure cannot be parsed.
pub fn parse_message(
    uid: u32,
    raw: &[u8],
    flags: Vec<String>,
    internal_date: Option<&str>,
) -> Result<RemoteMessage, mailparse::MailParseError> {
    let parsed = mailparse::parse_mail(raw)?;
    let headers = &parsed.headers;

    let date = headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| internal_date.and_then(parse_internal_date))
        .unwrap_or_default();

    let mut text_body = None;
    let mut html_body = None;
    let mut attachments = Vec::new();
    walk_parts(&parsed, &mut text_body, &mut html_body, &mut attachments)?;

    Ok(RemoteMessage {
        uid,
        flags,
        message_id: headers
            .get_first_value("Message-ID")
            .map(|v| v.trim().to_string()),
        from: addresses(&parsed, "From").into_iter().next().unwrap_or_default(),
        to: addresses(&parsed, "To"),
        cc: addresses(&parsed, "Cc"),
        bcc: addresses(&parsed, "Bcc"),
        reply_to: addresses(&parsed, "Reply-To").into_iter().next(),
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        date,
        text_body,
        html_body,
        attachments,
    })
}

/// Parses INTERNALDATE (`17-Jul-1996 02:44:25 -0700`).
fn parse_internal_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), "%d-%b-%Y %H:%M:%S %z")
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn walk_parts(
    part: &ParsedMail<'_>,
    text: &mut Option<String>,
    html: &mut Option<String>,
    attachments: &mut Vec<AttachmentMeta>,
) -> Result<(), mailparse::MailParseError> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            walk_parts(sub, text, html, attachments)?;
        }
        return Ok(());
    }

    let ctype = part.ctype.mimetype.to_lowercase();
    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned());

    let is_attachment =
        matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some();

    if is_attachment {
        attachments.push(AttachmentMeta {
            filename,
            content_type: ctype,
            size: part.get_body_raw()?.len(),
        });
    } else if ctype == "text/plain" && text.is_none() {
        *text = Some(part.get_body()?);
    } else if ctype == "text/html" && html.is_none() {
        *html = Some(part.get_body()?);
    }
    Ok(())
}

fn addresses(parsed: &ParsedMail<'_>, name: &str) -> Vec<String> {
    let Some(header) = parsed.headers.get_first_header(name) else {
        return Vec::new();
    };
    match mailparse::addrparse_header(header) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(info) => vec![format_single(info)],
                MailAddr::Group(group) => group.addrs.iter().map(format_single).collect(),
            })
            .collect(),
        Err(_) => vec![header.get_value()],
    }
}

fn format_single(info: &SingleInfo) -> String {
    match info.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("{name} <{}>", info.addr),
        _ => info.addr.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const MULTIPART: &[u8] = b"From: Alice Example <alice@example.com>\r\n\
To: bob@example.com, Carol <carol@example.com>\r\n\
Cc: dave@example.com\r\n\
Reply-To: replies@example.com\r\n\
Subject: =?UTF-8?B?SGVsbG8gd8O2cmxk?=\r\n\
Date: Tue, 02 Jan 2024 10:30:00 +0000\r\n\
Message-ID: <abc@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain body\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Html body</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVsbG8=\r\n\
--outer--\r\n";

    #[test]
    fn parses_envelope_bodies_and_attachments() {
        let msg = parse_message(7, MULTIPART, vec!["\\Seen".into()], None).unwrap();
        assert_eq!(msg.uid, 7);
        assert_eq!(msg.from, "Alice Example <alice@example.com>");
        assert_eq!(
            msg.to,
            vec!["bob@example.com".to_string(), "Carol <carol@example.com>".to_string()]
        );
        assert_eq!(msg.cc, vec!["dave@example.com".to_string()]);
        assert_eq!(msg.reply_to.as_deref(), Some("replies@example.com"));
        assert_eq!(msg.subject, "Hello wörld");
        assert_eq!(msg.message_id.as_deref(), Some("<abc@example.com>"));
        assert_eq!(msg.date, Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap());
        assert_eq!(msg.text_body.as_deref().map(str::trim), Some("Plain body"));
        assert_eq!(msg.html_body.as_deref().map(str::trim), Some("<p>Html body</p>"));
        assert_eq!(
            msg.attachments,
            vec![AttachmentMeta {
                filename: Some("report.pdf".into()),
                content_type: "application/pdf".into(),
                size: 5,
            }]
        );
        assert!(msg.is_read());
        assert!(!msg.is_flagged());
    }

    #[test]
    fn date_falls_back_to_internal_date() {
        let raw = b"From: a@example.com\r\nSubject: x\r\n\r\nbody\r\n";
        let msg = parse_message(1, raw, Vec::new(), Some("17-Jul-1996 02:44:25 -0700")).unwrap();
        assert_eq!(msg.date, Utc.with_ymd_and_hms(1996, 7, 17, 9, 44, 25).unwrap());
        assert_eq!(msg.text_body.as_deref().map(str::trim), Some("body"));
    }

    #[test]
    fn date_is_stable_without_any_source() {
        let raw = b"Subject: x\r\n\r\nbody\r\n";
        let a = parse_message(1, raw, Vec::new(), None).unwrap();
        let b = parse_message(1, raw, Vec::new(), None).unwrap();
        assert_eq!(a.date, DateTime::<Utc>::default());
        assert_eq!(a, b);
        assert_eq!(a.from, "");
    }
}
