//! Bounded line reading for the header block.
//!
//! Header lines are read one at a time from a buffered source. A line may be
//! at most [`MAX_LINE_LENGTH`] bytes including its terminator; anything longer
//! is rejected instead of growing the buffer. The reader never consumes bytes
//! past the end of the line it returns, so the body copy resumes at exactly
//! the next input byte.

use std::io::{self, BufRead};

use crate::error::{Error, Result};

/// Maximum header line length, terminator included.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Line terminator style of a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r`
    Cr,
}

impl LineEnding {
    /// Splits a raw line into its content and terminator style.
    ///
    /// The longest terminator wins, so `\r\n` is never read as `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedLineEnding`] if the line has no
    /// recognized terminator.
    pub fn split(line: &[u8]) -> Result<(&[u8], Self)> {
        if let Some(content) = line.strip_suffix(b"\r\n") {
            Ok((content, Self::CrLf))
        } else if let Some(content) = line.strip_suffix(b"\n") {
            Ok((content, Self::Lf))
        } else if let Some(content) = line.strip_suffix(b"\r") {
            Ok((content, Self::Cr))
        } else {
            Err(Error::UnrecognizedLineEnding)
        }
    }

    /// Returns the terminator bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
            Self::Cr => b"\r",
        }
    }

    /// Returns a short name for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lf => "LF",
            Self::CrLf => "CRLF",
            Self::Cr => "CR",
        }
    }
}

/// Reads `\n`-terminated lines from a buffered source.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
}

impl<R: BufRead> LineReader<R> {
    /// Creates a new line reader.
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads one raw line, terminator included.
    ///
    /// Returns `Ok(None)` when the input ends cleanly on a line boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`] if no `\n` appears within
    /// [`MAX_LINE_LENGTH`] bytes, [`Error::UnexpectedEndOfInput`] if the input
    /// ends mid-line, or [`Error::Io`] if the source fails.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();

        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if buf.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(Error::UnexpectedEndOfInput);
            }

            // Never look past the remaining room, so the bound holds exactly.
            let room = MAX_LINE_LENGTH - line.len();
            let window = &buf[..buf.len().min(room)];

            if let Some(pos) = window.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&window[..=pos]);
                self.reader.consume(pos + 1);
                return Ok(Some(line));
            }

            let len = window.len();
            line.extend_from_slice(window);
            self.reader.consume(len);

            if line.len() >= MAX_LINE_LENGTH {
                return Err(Error::LineTooLong {
                    limit: MAX_LINE_LENGTH,
                });
            }
        }
    }

    /// Gets a mutable reference to the underlying reader.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consumes the line reader and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
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
    use std::io::{BufReader, Cursor, Read};

    #[test]
    fn test_split_line_endings() {
        assert_eq!(
            LineEnding::split(b"Subject: hi\r\n").unwrap(),
            (&b"Subject: hi"[..], LineEnding::CrLf)
        );
        assert_eq!(
            LineEnding::split(b"Subject: hi\n").unwrap(),
            (&b"Subject: hi"[..], LineEnding::Lf)
        );
        assert_eq!(
            LineEnding::split(b"Subject: hi\r").unwrap(),
            (&b"Subject: hi"[..], LineEnding::Cr)
        );
        assert_eq!(
            LineEnding::split(b"\r\n").unwrap(),
            (&b""[..], LineEnding::CrLf)
        );
    }

    #[test]
    fn test_split_unrecognized_ending() {
        assert!(matches!(
            LineEnding::split(b"Subject: hi"),
            Err(Error::UnrecognizedLineEnding)
        ));
        assert!(matches!(
            LineEnding::split(b""),
            Err(Error::UnrecognizedLineEnding)
        ));
    }

    #[test]
    fn test_as_bytes() {
        assert_eq!(LineEnding::Lf.as_bytes(), b"\n");
        assert_eq!(LineEnding::CrLf.as_bytes(), b"\r\n");
        assert_eq!(LineEnding::Cr.as_bytes(), b"\r");
    }

    #[test]
    fn test_read_lines() {
        let mut reader = LineReader::new(Cursor::new(b"To: a@b.cc\r\nFrom: x@y.zz\n\n".to_vec()));
        assert_eq!(reader.read_line().unwrap().unwrap(), b"To: a@b.cc\r\n");
        assert_eq!(reader.read_line().unwrap().unwrap(), b"From: x@y.zz\n");
        assert_eq!(reader.read_line().unwrap().unwrap(), b"\n");
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn test_bare_cr_does_not_end_line() {
        let mut reader = LineReader::new(Cursor::new(b"A: 1\rB: 2\n".to_vec()));
        assert_eq!(reader.read_line().unwrap().unwrap(), b"A: 1\rB: 2\n");
    }

    #[test]
    fn test_clean_eof() {
        let mut reader = LineReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn test_eof_mid_line() {
        let mut reader = LineReader::new(Cursor::new(b"Subject: trunc".to_vec()));
        assert!(matches!(
            reader.read_line(),
            Err(Error::UnexpectedEndOfInput)
        ));
    }

    #[test]
    fn test_line_at_limit_is_accepted() {
        let mut data = vec![b'A'; MAX_LINE_LENGTH - 1];
        data.push(b'\n');
        let mut reader = LineReader::new(Cursor::new(data.clone()));
        assert_eq!(reader.read_line().unwrap().unwrap(), data);
    }

    #[test]
    fn test_line_too_long() {
        let mut data = vec![b'A'; MAX_LINE_LENGTH];
        data.push(b'\n');
        let mut reader = LineReader::new(Cursor::new(data));
        assert!(matches!(
            reader.read_line(),
            Err(Error::LineTooLong { limit: MAX_LINE_LENGTH })
        ));
    }

    #[test]
    fn test_small_buffer_keeps_bound_and_position() {
        // A tiny buffer forces the line to be assembled over many fills.
        let input = b"X-Long: 0123456789abcdef\nbody".to_vec();
        let mut reader = LineReader::new(BufReader::with_capacity(4, Cursor::new(input)));
        assert_eq!(
            reader.read_line().unwrap().unwrap(),
            b"X-Long: 0123456789abcdef\n"
        );

        let mut rest = Vec::new();
        reader.into_inner().read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"body");
    }

    #[test]
    fn test_does_not_consume_past_line() {
        let mut reader = LineReader::new(Cursor::new(b"A: 1\n\nbody\r\nmore".to_vec()));
        reader.read_line().unwrap();
        reader.read_line().unwrap();

        let mut rest = Vec::new();
        reader.get_mut().read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"body\r\nmore");
    }
}
