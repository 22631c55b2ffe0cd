//! Single-message scan.

use std::io::{BufReader, Read, Write};

use tracing::{debug, info};

use crate::address::Mailbox;
use crate::assemble::{assemble, copy_body, injected_headers};
use crate::block::HeaderBlock;
use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::line::LineReader;
use crate::lookup::Lookup;

/// Input buffer size.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The envelope sender matched the skip list; input copied unchanged.
    Skipped,
    /// The control marker was present; no lookup was made.
    Disabled,
    /// The lookup ran and its headers were injected.
    Annotated,
}

/// Summary of one scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// How the scan ended.
    pub outcome: Outcome,
    /// `Message-Id` of the message, if present.
    pub message_id: Option<String>,
    /// Injected header lines, terminators excluded.
    pub injected: Vec<String>,
    /// Number of stale injected headers removed.
    pub removed: usize,
    /// Bytes copied after the header block.
    pub body_bytes: u64,
}

impl ScanReport {
    const fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            message_id: None,
            injected: Vec::new(),
            removed: 0,
            body_bytes: 0,
        }
    }
}

/// Rewrites the headers of one message at a time.
///
/// The header block is read and classified, and the lookup made, before the
/// first output byte is written. A header or lookup failure therefore leaves
/// the output untouched.
#[derive(Debug)]
pub struct Scanner<L> {
    config: ScanConfig,
    lookup: L,
}

impl<L: Lookup> Scanner<L> {
    /// Creates a scanner.
    pub const fn new(config: ScanConfig, lookup: L) -> Self {
        Self { config, lookup }
    }

    /// Returns the lookup service.
    pub const fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Scans one message from `input` to `output`.
    ///
    /// # Errors
    ///
    /// Returns any line, address or lookup error before output starts, or an
    /// I/O error while writing. A message without a `From:` header fails
    /// with [`Error::AddressParseFailed`] unless the control marker is set.
    pub fn scan<R: Read, W: Write>(&self, input: R, mut output: W) -> Result<ScanReport> {
        let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, input);

        if self.config.skips_sender() {
            info!(sender = %self.config.sender, "ignoring message");
            let mut report = ScanReport::new(Outcome::Skipped);
            report.body_bytes = copy_body(&mut reader, &mut output)?;
            output.flush()?;
            return Ok(report);
        }

        let mut lines = LineReader::new(reader);
        let headers = HeaderBlock::read_from(&mut lines)?;

        let mut report = ScanReport::new(Outcome::Annotated);
        report.message_id = headers.message_id().map(ToString::to_string);
        report.removed = headers.dropped();

        if headers.processing_enabled() {
            let sender = headers
                .from_address()
                .ok_or_else(|| Error::AddressParseFailed("missing From header".to_string()))?;
            debug!(
                recipient = %self.config.recipient,
                from = %sender,
                to = ?headers.to_address().map(Mailbox::as_str),
                "looking up sender"
            );
            let response = self.lookup.scan(&self.config.recipient, sender)?.into_result()?;
            info!(
                message_id = ?report.message_id,
                from = %sender,
                whitelisted = response.whitelisted,
                book = %response.book,
                books = ?response.books,
                "filterbook"
            );
            report.injected = injected_headers(&response);
        } else {
            info!(message_id = ?report.message_id, "ignoring filterctl request");
            report.outcome = Outcome::Disabled;
        }

        for line in &report.injected {
            debug!(header = %line, "adding");
        }

        let block = assemble(&report.injected, headers.retained(), headers.line_ending());
        output.write_all(&block)?;
        report.body_bytes = copy_body(lines.get_mut(), &mut output)?;
        output.flush()?;

        Ok(report)
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
    use crate::lookup::ScanResponse;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Lookup for Recorder {
        fn scan(&self, recipient: &Mailbox, sender: &Mailbox) -> Result<ScanResponse> {
            self.calls
                .borrow_mut()
                .push((recipient.to_string(), sender.to_string()));
            Ok(ScanResponse {
                success: true,
                book: "friends".to_string(),
                books: vec!["friends".to_string()],
                ..ScanResponse::default()
            })
        }
    }

    fn scanner(sender: &str) -> Scanner<Recorder> {
        let config = ScanConfig::new(Some("mx.example.com"), Some("user"), Some(sender)).unwrap();
        Scanner::new(config, Recorder::default())
    }

    #[test]
    fn test_lookup_keyed_by_recipient_and_from() {
        let scanner = scanner("bounce@lists.other.com");
        let mut out = Vec::new();
        let report = scanner
            .scan(&b"From: Sender <Sender@Other.com>\n\nhi\n"[..], &mut out)
            .unwrap();

        assert_eq!(report.outcome, Outcome::Annotated);
        assert_eq!(
            scanner.lookup.calls.borrow().as_slice(),
            &[("user@example.com".to_string(), "sender@other.com".to_string())]
        );
        assert_eq!(
            out,
            b"X-FilterBook: friends\nX-FilterBooks: friends\nFrom: Sender <Sender@Other.com>\n\nhi\n"
        );
    }

    #[test]
    fn test_missing_from_is_fatal() {
        let scanner = scanner("envelope@other.com");
        let mut out = Vec::new();
        let err = scanner.scan(&b"Subject: x\n\nbody"[..], &mut out).unwrap_err();
        assert!(matches!(err, Error::AddressParseFailed(_)));
        assert!(scanner.lookup.calls.borrow().is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_from_allowed_when_disabled() {
        let scanner = scanner("envelope@other.com");
        let mut out = Vec::new();
        let report = scanner
            .scan(&b"X-Filterctl-Request-Id: 1\n\nbody"[..], &mut out)
            .unwrap();
        assert_eq!(report.outcome, Outcome::Disabled);
        assert_eq!(out, b"X-Filterctl-Request-Id: 1\n\nbody");
    }

    #[test]
    fn test_skipped_sender_is_identity() {
        let scanner = scanner("MAILER-DAEMON@mx.example.com");
        let input = b"From: not-an-address\r\nX-FilterBook: old\n\nbody".to_vec();
        let mut out = Vec::new();
        let report = scanner.scan(input.as_slice(), &mut out).unwrap();
        assert_eq!(report.outcome, Outcome::Skipped);
        assert_eq!(report.body_bytes, input.len() as u64);
        assert_eq!(out, input);
        assert!(scanner.lookup.calls.borrow().is_empty());
    }

    #[test]
    fn test_header_error_writes_nothing() {
        let scanner = scanner("sender@other.com");
        let mut out = Vec::new();
        let err = scanner
            .scan(&b"Subject: ok\nFrom: broken\n\nbody"[..], &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::AddressParseFailed(_)));
        assert!(out.is_empty());
    }
}
