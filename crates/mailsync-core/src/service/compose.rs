//! Outgoing message construction.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::account::Signature;

/// Base64 line length for MIME bodies (RFC 2045).
const BASE64_LINE: usize = 76;

/// Max raw bytes per RFC 2047 encoded word, keeping each word under 75 chars.
const ENCODED_WORD_BYTES: usize = 45;

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// Media type, e.g. `application/pdf`.
    pub content_type: String,
    /// Raw content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// An email message to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender address; filled from account settings when empty.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    pub cc: Vec<String>,
    /// BCC addresses. Never written into headers.
    pub bcc: Vec<String>,
    /// Reply-To address.
    pub reply_to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text_body: Option<String>,
    /// Markup body.
    pub html_body: Option<String>,
    /// Attachments.
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Adds a BCC recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: impl Into<String>) -> Self {
        self.bcc.push(recipient.into());
        self
    }

    /// Sets Reply-To.
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Sets the markup body.
    #[must_use]
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Appends the signature to the markup body if there is one, otherwise
    /// to the plain text body. Disabled or empty signatures change nothing.
    #[must_use]
    pub fn with_signature(mut self, signature: &Signature) -> Self {
        if !signature.is_usable() {
            return self;
        }
        let sig_html = signature.html.as_deref().filter(|s| !s.is_empty());
        let sig_text = signature.text.as_deref().filter(|s| !s.is_empty());

        if let Some(html) = self.html_body.as_mut() {
            let block = sig_html.map_or_else(
                || text_to_html(sig_text.unwrap_or_default()),
                str::to_string,
            );
            html.push_str("<br><br>");
            html.push_str(&block);
        } else {
            let block = sig_text.map_or_else(
                || html_to_text(sig_html.unwrap_or_default()),
                str::to_string,
            );
            let text = self.text_body.get_or_insert_with(String::new);
            text.push_str("\n\n-- \n");
            text.push_str(&block);
        }
        self
    }

    /// Envelope recipients (To, Cc, Bcc) without duplicates.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for addr in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            let addr = envelope_address(addr);
            if !addr.is_empty() && !out.contains(&addr) {
                out.push(addr);
            }
        }
        out
    }

    /// Builds the full MIME message for transmission.
    ///
    /// Both bodies become `multipart/alternative`; attachments wrap the body
    /// in `multipart/mixed`.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut out = String::new();
        self.write_address_headers(&mut out);
        if let Some(reply_to) = &self.reply_to {
            header(&mut out, "Reply-To", reply_to);
        }
        header(&mut out, "Subject", &encode_header_value(&self.subject));
        header(&mut out, "Date", &Utc::now().to_rfc2822());
        header(&mut out, "Message-ID", &generate_message_id(&self.from));
        out.push_str("MIME-Version: 1.0\r\n");

        if self.attachments.is_empty() {
            self.write_body(&mut out);
        } else {
            let boundary = generate_boundary();
            let _ = write!(
                out,
                "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
            );
            let _ = write!(out, "--{boundary}\r\n");
            self.write_body(&mut out);
            for attachment in &self.attachments {
                let _ = write!(out, "\r\n--{boundary}\r\n");
                write_attachment(&mut out, attachment);
            }
            let _ = write!(out, "\r\n--{boundary}--\r\n");
        }
        out
    }

    /// Builds the single-part copy stored in the sent or drafts folder.
    ///
    /// The markup body is preferred. Drafts carry an `X-Unsent: 1` marker.
    #[must_use]
    pub fn to_folder_copy(&self, date: DateTime<Utc>, draft: bool) -> String {
        let mut out = String::new();
        self.write_address_headers(&mut out);
        header(&mut out, "Subject", &encode_header_value(&self.subject));
        header(&mut out, "Date", &date.to_rfc2822());
        out.push_str("MIME-Version: 1.0\r\n");
        if draft {
            out.push_str("X-Unsent: 1\r\n");
        }
        let (content_type, body) = match (&self.html_body, &self.text_body) {
            (Some(html), _) => ("text/html", html.as_str()),
            (None, Some(text)) => ("text/plain", text.as_str()),
            (None, None) => ("text/plain", ""),
        };
        let _ = write!(out, "Content-Type: {content_type}; charset=UTF-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
        out.push_str(&normalize_newlines(body));
        out
    }

    fn write_address_headers(&self, out: &mut String) {
        header(out, "From", &self.from);
        if !self.to.is_empty() {
            header(out, "To", &self.to.join(", "));
        }
        if !self.cc.is_empty() {
            header(out, "Cc", &self.cc.join(", "));
        }
    }

    fn write_body(&self, out: &mut String) {
        match (&self.text_body, &self.html_body) {
            (Some(text), Some(html)) => {
                let boundary = generate_boundary();
                let _ = write!(
                    out,
                    "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\r\n"
                );
                let _ = write!(out, "--{boundary}\r\n");
                write_text_part(out, "text/plain", text);
                let _ = write!(out, "\r\n--{boundary}\r\n");
                write_text_part(out, "text/html", html);
                let _ = write!(out, "\r\n--{boundary}--\r\n");
            }
            (None, Some(html)) => write_text_part(out, "text/html", html),
            (Some(text), None) => write_text_part(out, "text/plain", text),
            (None, None) => write_text_part(out, "text/plain", ""),
        }
    }
}

/// Extracts `addr` from `Name <addr>`; other input is returned trimmed.
#[must_use]
pub fn envelope_address(value: &str) -> &str {
    let value = value.trim();
    match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => value[start + 1..end].trim(),
        _ => value,
    }
}

fn header(out: &mut String, name: &str, value: &str) {
    let clean: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    let _ = write!(out, "{name}: {clean}\r\n");
}

fn write_text_part(out: &mut String, content_type: &str, body: &str) {
    let _ = write!(out, "Content-Type: {content_type}; charset=utf-8\r\n");
    out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
    out.push_str(&normalize_newlines(body));
    if !body.is_empty() && !body.ends_with('\n') {
        out.push_str("\r\n");
    }
}

fn write_attachment(out: &mut String, attachment: &Attachment) {
    let name = attachment.filename.replace(['"', '\r', '\n'], "_");
    let _ = write!(
        out,
        "Content-Type: {}; name=\"{name}\"\r\n",
        attachment.content_type
    );
    let _ = write!(
        out,
        "Content-Disposition: attachment; filename=\"{name}\"\r\n"
    );
    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");

    let encoded = STANDARD.encode(&attachment.data);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
}

/// RFC 2047 `B` encoding for non-ASCII header values.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
    }
    words.join(" ")
}

fn normalize_newlines(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}

fn generate_boundary() -> String {
    format!("=_mailsync_{:016x}", OsRng.next_u64())
}

fn generate_message_id(from: &str) -> String {
    let domain = envelope_address(from)
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain);
    format!("<{:016x}.{:x}@{domain}>", OsRng.next_u64(), Utc::now().timestamp())
}

fn text_to_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>")
}

fn html_to_text(html: &str) -> String {
    let html = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
