//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::AuthMechanism;

/// What the server announced in its greeting and EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from the greeting.
    pub hostname: String,
    /// EHLO keywords, uppercased (`STARTTLS`, `8BITMIME`, ...).
    pub keywords: Vec<String>,
    /// Advertised SASL mechanisms.
    pub auth_mechanisms: Vec<AuthMechanism>,
    /// `SIZE` limit, if advertised with a value.
    pub max_size: Option<usize>,
}

impl ServerInfo {
    /// Replaces the extension data with what an EHLO reply advertises.
    ///
    /// The first line is the server's greeting and is skipped.
    pub fn apply_ehlo(&mut self, lines: &[String]) {
        self.keywords.clear();
        self.auth_mechanisms.clear();
        self.max_size = None;

        for line in lines.iter().skip(1) {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };
            let keyword = keyword.to_ascii_uppercase();
            match keyword.as_str() {
                "AUTH" => self
                    .auth_mechanisms
                    .extend(words.map(AuthMechanism::parse)),
                "SIZE" => self.max_size = words.next().and_then(|s| s.parse().ok()),
                _ => {}
            }
            self.keywords.push(keyword);
        }
    }

    /// Checks an EHLO keyword.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    /// Returns true if STARTTLS is advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports("STARTTLS")
    }

    /// Returns true if the mechanism is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &AuthMechanism) -> bool {
        self.auth_mechanisms.contains(mechanism)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ehlo_extensions() {
        let lines: Vec<String> = [
            "mx.example.com greets you",
            "PIPELINING",
            "SIZE 35882577",
            "AUTH LOGIN PLAIN XOAUTH2",
            "starttls",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();

        let mut info = ServerInfo::default();
        info.apply_ehlo(&lines);

        assert!(info.supports_starttls());
        assert!(info.supports("pipelining"));
        assert_eq!(info.max_size, Some(35_882_577));
        assert!(info.supports_auth(&AuthMechanism::Plain));
        assert!(info.supports_auth(&AuthMechanism::Login));
        assert!(!info.supports("8BITMIME"));
    }
}
