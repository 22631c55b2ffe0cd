//! Mailbox address extraction from `From:` and `To:` headers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

#[allow(clippy::expect_used)]
static BRACKETED_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*<([^>]+)>.*$").expect("valid bracket pattern"));

#[allow(clippy::expect_used)]
static VALID_EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid address pattern")
});

/// A validated `local@domain` mailbox address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(String);

impl Mailbox {
    /// Creates a mailbox from a bare address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressParseFailed`] if the address does not match the
    /// mailbox pattern.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        if VALID_EMAIL_ADDRESS.is_match(&addr) {
            Ok(Self(addr))
        } else {
            Err(Error::AddressParseFailed(addr))
        }
    }

    /// Extracts the mailbox from a raw header line such as
    /// `From: Jane Doe <jane@example.com>`.
    ///
    /// The value after the first `:` is trimmed; if it contains a `<...>` pair
    /// the bracketed text is used, otherwise the whole value. The result is
    /// lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressParseFailed`] carrying the original line if no
    /// valid address can be extracted.
    pub fn from_header(line: &str) -> Result<Self> {
        let candidate = bracketed_text(header_value(line)).to_lowercase();
        if VALID_EMAIL_ADDRESS.is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(Error::AddressParseFailed(line.to_string()))
        }
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Mailbox {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns the trimmed value after the first `:` of a header line, or an
/// empty string if the line has no colon.
#[must_use]
pub fn header_value(line: &str) -> &str {
    line.split_once(':').map_or("", |(_, value)| value.trim())
}

/// Returns the text inside the last `<...>` pair, or the input unchanged.
#[must_use]
pub fn bracketed_text(value: &str) -> &str {
    BRACKETED_TEXT
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map_or(value, |m| m.as_str())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_address() {
        let mailbox = Mailbox::from_header("From: Jane Doe <jane@example.com>").unwrap();
        assert_eq!(mailbox.as_str(), "jane@example.com");
    }

    #[test]
    fn test_bare_address() {
        let mailbox = Mailbox::from_header("From: jane@example.com").unwrap();
        assert_eq!(mailbox.as_str(), "jane@example.com");
    }

    #[test]
    fn test_invalid_address() {
        let err = Mailbox::from_header("From: not-an-address").unwrap_err();
        assert!(matches!(err, Error::AddressParseFailed(line) if line == "From: not-an-address"));
    }

    #[test]
    fn test_address_is_lowercased() {
        let mailbox = Mailbox::from_header("To: \"Big Boss\" <Boss@Example.COM>").unwrap();
        assert_eq!(mailbox.as_str(), "boss@example.com");
    }

    #[test]
    fn test_last_bracket_pair_wins() {
        let mailbox = Mailbox::from_header("From: <old@example.com> via <new@example.org>").unwrap();
        assert_eq!(mailbox.as_str(), "new@example.org");
    }

    #[test]
    fn test_surrounding_whitespace() {
        let mailbox = Mailbox::from_header("To:\t  user@example.com   ").unwrap();
        assert_eq!(mailbox.as_str(), "user@example.com");
    }

    #[test]
    fn test_rejects_short_tld_and_missing_domain() {
        assert!(Mailbox::from_header("To: user@example.c").is_err());
        assert!(Mailbox::from_header("To: user@").is_err());
        assert!(Mailbox::from_header("To: @example.com").is_err());
        assert!(Mailbox::from_header("To:").is_err());
        assert!(Mailbox::from_header("To: <>").is_err());
    }

    #[test]
    fn test_rejects_multiple_addresses() {
        assert!(Mailbox::from_header("To: a@example.com, b@example.com").is_err());
    }

    #[test]
    fn test_plus_and_percent_local_part() {
        let mailbox = Mailbox::from_header("From: <first.last+tag%x@mail.example.co.uk>").unwrap();
        assert_eq!(mailbox.as_str(), "first.last+tag%x@mail.example.co.uk");
    }

    #[test]
    fn test_mailbox_new() {
        assert_eq!(Mailbox::new("user@example.com").unwrap().to_string(), "user@example.com");
        assert!(Mailbox::new("MAILER-DAEMON").is_err());
    }

    #[test]
    fn test_header_value() {
        assert_eq!(header_value("Message-Id: <abc@host>"), "<abc@host>");
        assert_eq!(header_value("Subject: a: b"), "a: b");
        assert_eq!(header_value("no colon here"), "");
    }

    #[test]
    fn test_bracketed_text() {
        assert_eq!(bracketed_text("<abc@host>"), "abc@host");
        assert_eq!(bracketed_text("abc@host"), "abc@host");
        assert_eq!(bracketed_text("<>"), "<>");
    }
}
