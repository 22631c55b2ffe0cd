//! Scan configuration.

use crate::address::Mailbox;
use crate::error::{Error, Result};

/// Envelope sender prefixes whose messages pass through untouched.
pub const SKIP_SENDERS: [&str; 2] = ["MAILER-DAEMON@", "SIEVE-DAEMON@"];

/// Validated settings for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Fully qualified host name of the delivering server.
    pub host: String,
    /// Local user the message is delivered to.
    pub user: String,
    /// Envelope sender.
    pub sender: String,
    /// Recipient mailbox derived from `user` and the domain of `host`.
    pub recipient: Mailbox,
}

impl ScanConfig {
    /// Validates the settings and derives the recipient mailbox.
    ///
    /// The recipient is `user@domain`, where `domain` is everything after the
    /// first `.` of `host`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigMissing`] if a setting is absent or empty, and
    /// [`Error::ConfigInvalid`] if the host has no domain part or the derived
    /// recipient is not a valid mailbox.
    pub fn new(host: Option<&str>, user: Option<&str>, sender: Option<&str>) -> Result<Self> {
        let host = required("host", host)?;
        let user = required("user", user)?;
        let sender = required("sender", sender)?;

        let domain = match host.split_once('.') {
            Some((_, domain)) if !domain.is_empty() => domain,
            _ => {
                return Err(Error::ConfigInvalid(format!(
                    "failed parsing domain from host: {host}"
                )));
            }
        };

        let recipient = Mailbox::new(format!("{user}@{domain}"))
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            user: user.to_string(),
            sender: sender.to_string(),
            recipient,
        })
    }

    /// Returns true if the envelope sender starts with one of
    /// [`SKIP_SENDERS`].
    ///
    /// Matching is case-sensitive.
    #[must_use]
    pub fn skips_sender(&self) -> bool {
        SKIP_SENDERS
            .iter()
            .any(|prefix| self.sender.starts_with(prefix))
    }
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::ConfigMissing(name)),
    }
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
    fn test_recipient_from_host_domain() {
        let config =
            ScanConfig::new(Some("mx1.example.com"), Some("alice"), Some("bob@other.org")).unwrap();
        assert_eq!(config.recipient.as_str(), "alice@example.com");
        assert_eq!(config.sender, "bob@other.org");
    }

    #[test]
    fn test_missing_settings() {
        assert!(matches!(
            ScanConfig::new(None, Some("alice"), Some("bob@other.org")),
            Err(Error::ConfigMissing("host"))
        ));
        assert!(matches!(
            ScanConfig::new(Some("mx.example.com"), Some(""), Some("bob@other.org")),
            Err(Error::ConfigMissing("user"))
        ));
        assert!(matches!(
            ScanConfig::new(Some("mx.example.com"), Some("alice"), Some("  ")),
            Err(Error::ConfigMissing("sender"))
        ));
    }

    #[test]
    fn test_host_without_domain() {
        assert!(matches!(
            ScanConfig::new(Some("localhost"), Some("alice"), Some("bob@other.org")),
            Err(Error::ConfigInvalid(_))
        ));
        assert!(matches!(
            ScanConfig::new(Some("localhost."), Some("alice"), Some("bob@other.org")),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_invalid_recipient() {
        assert!(matches!(
            ScanConfig::new(Some("mx.example.com"), Some("al ice"), Some("bob@other.org")),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_skip_senders() {
        let config = ScanConfig::new(
            Some("mx.example.com"),
            Some("alice"),
            Some("MAILER-DAEMON@mx.example.com"),
        )
        .unwrap();
        assert!(config.skips_sender());

        let config =
            ScanConfig::new(Some("mx.example.com"), Some("alice"), Some("SIEVE-DAEMON@x")).unwrap();
        assert!(config.skips_sender());

        let config = ScanConfig::new(
            Some("mx.example.com"),
            Some("alice"),
            Some("mailer-daemon@mx.example.com"),
        )
        .unwrap();
        assert!(!config.skips_sender());
    }
}
