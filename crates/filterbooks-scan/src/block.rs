//! Header block state machine.
//!
//! A [`HeaderBlock`] is fed raw header lines one at a time until the blank
//! line that ends the header block. It records the line ending of the first
//! line, keeps every retained line in input order, drops stale injected
//! headers, and extracts the few fields the scan needs.

use std::io::BufRead;

use tracing::debug;

use crate::address::{Mailbox, bracketed_text, header_value};
use crate::error::{Error, Result};
use crate::header::{self, Disposition, Field, Flag};
use crate::line::{LineEnding, LineReader};

/// Header reading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Still inside the header block.
    ReadingHeaders,
    /// The header block is complete.
    HeadersDone,
}

/// Header lines and extracted fields of one message.
#[derive(Debug, Clone)]
pub struct HeaderBlock {
    state: ScanState,
    line_ending: Option<LineEnding>,
    retained: Vec<Vec<u8>>,
    dropped: usize,
    processing_enabled: bool,
    from: Option<Mailbox>,
    to: Option<Mailbox>,
    message_id: Option<String>,
}

impl Default for HeaderBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderBlock {
    /// Creates an empty header block.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ScanState::ReadingHeaders,
            line_ending: None,
            retained: Vec::new(),
            dropped: 0,
            processing_enabled: true,
            from: None,
            to: None,
            message_id: None,
        }
    }

    /// Reads header lines until the blank line that ends the header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEndOfInput`] if the input ends before the
    /// blank line, or any line reading, line ending or address error.
    pub fn read_from<R: BufRead>(reader: &mut LineReader<R>) -> Result<Self> {
        let mut block = Self::new();
        while block.state == ScanState::ReadingHeaders {
            let line = reader.read_line()?.ok_or(Error::UnexpectedEndOfInput)?;
            block.feed(&line)?;
        }
        Ok(block)
    }

    /// Processes one raw header line, terminator included.
    ///
    /// Lines fed after the block is complete are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnrecognizedLineEnding`] for a line without a
    /// terminator, or [`crate::Error::AddressParseFailed`] for an invalid
    /// `From:`/`To:` value.
    pub fn feed(&mut self, raw: &[u8]) -> Result<ScanState> {
        if self.state == ScanState::HeadersDone {
            return Ok(self.state);
        }

        let (line, ending) = LineEnding::split(raw)?;
        if self.line_ending.is_none() {
            debug!(line_ending = ending.name(), "line ending locked");
            self.line_ending = Some(ending);
        }

        if header::is_blank(line) {
            self.retained.push(line.to_vec());
            self.state = ScanState::HeadersDone;
            return Ok(self.state);
        }

        let disposition = header::classify(line);
        match disposition {
            Disposition::Retain => {}
            Disposition::Drop => {
                debug!(header = %String::from_utf8_lossy(line), "removing");
                self.dropped += 1;
            }
            Disposition::ExtractAndRetain(field) => self.extract(field, line)?,
            Disposition::SetFlagAndRetain(Flag::DisableProcessing) => {
                debug!("ignoring filterctl request");
                self.processing_enabled = false;
            }
        }

        if disposition.retains() {
            self.retained.push(line.to_vec());
        }
        Ok(self.state)
    }

    fn extract(&mut self, field: Field, line: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(line);
        match field {
            Field::MessageId => {
                let id = bracketed_text(header_value(&text)).to_string();
                debug!(message_id = %id, "Message-Id");
                self.message_id = Some(id);
            }
            Field::To => self.to = Some(Mailbox::from_header(&text)?),
            Field::From => self.from = Some(Mailbox::from_header(&text)?),
        }
        Ok(())
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    /// Returns the line ending of the first header line, or LF if no line
    /// has been read.
    #[must_use]
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending.unwrap_or_default()
    }

    /// Returns the retained lines, terminators stripped, in input order.
    #[must_use]
    pub fn retained(&self) -> &[Vec<u8>] {
        &self.retained
    }

    /// Returns how many stale injected headers were dropped.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns false if the control marker was present.
    #[must_use]
    pub const fn processing_enabled(&self) -> bool {
        self.processing_enabled
    }

    /// Returns the address of the last `From:` header.
    #[must_use]
    pub const fn from_address(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    /// Returns the address of the last `To:` header.
    #[must_use]
    pub const fn to_address(&self) -> Option<&Mailbox> {
        self.to.as_ref()
    }

    /// Returns the `Message-Id` value, brackets removed.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
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
    use std::io::Cursor;

    fn read(input: &[u8]) -> Result<HeaderBlock> {
        HeaderBlock::read_from(&mut LineReader::new(Cursor::new(input.to_vec())))
    }

    #[test]
    fn test_extracts_fields() {
        let block = read(
            b"Message-Id: <abc@host.example>\nTo: User <user@example.com>\nFrom: sender@other.com\nSubject: hi\n\nbody\n",
        )
        .unwrap();
        assert_eq!(block.state(), ScanState::HeadersDone);
        assert_eq!(block.message_id(), Some("abc@host.example"));
        assert_eq!(block.to_address().unwrap().as_str(), "user@example.com");
        assert_eq!(block.from_address().unwrap().as_str(), "sender@other.com");
        assert!(block.processing_enabled());
        assert_eq!(block.retained().len(), 5);
        assert_eq!(block.retained()[4], b"");
    }

    #[test]
    fn test_drops_stale_headers() {
        let block = read(
            b"X-Whitelisted: yes\nX-FilterBook: old\nSubject: hi\nx-filterbooks: old,older\n\n",
        )
        .unwrap();
        assert_eq!(block.dropped(), 3);
        assert_eq!(block.retained(), &[b"Subject: hi".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_control_marker_disables() {
        let block = read(b"X-Filterctl-Request-Id: 7\nSubject: hi\n\n").unwrap();
        assert!(!block.processing_enabled());
        assert_eq!(block.retained()[0], b"X-Filterctl-Request-Id: 7");
    }

    #[test]
    fn test_first_line_locks_line_ending() {
        let block = read(b"Subject: a\r\nTo: u@example.com\n\n").unwrap();
        assert_eq!(block.line_ending(), LineEnding::CrLf);
        assert_eq!(block.retained()[1], b"To: u@example.com");
    }

    #[test]
    fn test_whitespace_only_line_ends_block() {
        let block = read(b"Subject: a\n \t\nnot: a header\n").unwrap();
        assert_eq!(block.state(), ScanState::HeadersDone);
        assert_eq!(block.retained(), &[b"Subject: a".to_vec(), b" \t".to_vec()]);
    }

    #[test]
    fn test_last_from_wins() {
        let block = read(b"From: a@example.com\nFrom: b@example.com\n\n").unwrap();
        assert_eq!(block.from_address().unwrap().as_str(), "b@example.com");
    }

    #[test]
    fn test_invalid_from_is_fatal() {
        assert!(matches!(
            read(b"From: not-an-address\n\n"),
            Err(Error::AddressParseFailed(_))
        ));
    }

    #[test]
    fn test_invalid_to_is_fatal() {
        assert!(matches!(
            read(b"To: undisclosed-recipients:;\n\n"),
            Err(Error::AddressParseFailed(_))
        ));
    }

    #[test]
    fn test_eof_before_separator_is_fatal() {
        assert!(matches!(
            read(b"Subject: a\n"),
            Err(Error::UnexpectedEndOfInput)
        ));
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert!(matches!(read(b""), Err(Error::UnexpectedEndOfInput)));
    }

    #[test]
    fn test_eof_mid_line_is_fatal() {
        assert!(matches!(
            read(b"Subject: a\nTo: u@exa"),
            Err(Error::UnexpectedEndOfInput)
        ));
    }

    #[test]
    fn test_feed_unterminated_line() {
        let mut block = HeaderBlock::new();
        assert!(matches!(
            block.feed(b"Subject: a"),
            Err(Error::UnrecognizedLineEnding)
        ));
    }

    #[test]
    fn test_feed_after_done_is_ignored() {
        let mut block = HeaderBlock::new();
        assert_eq!(block.feed(b"\n").unwrap(), ScanState::HeadersDone);
        assert_eq!(block.feed(b"From: bad\n").unwrap(), ScanState::HeadersDone);
        assert_eq!(block.retained().len(), 1);
    }

    #[test]
    fn test_bare_cr_line_ending() {
        let mut block = HeaderBlock::new();
        block.feed(b"Subject: a\r").unwrap();
        assert_eq!(block.line_ending(), LineEnding::Cr);
    }
}
