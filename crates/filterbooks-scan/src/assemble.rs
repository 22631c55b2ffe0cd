//! Header block assembly and body pass-through.

use std::io::{self, Read, Write};

use crate::header::{FILTER_BOOK, FILTER_BOOKS, WHITELISTED};
use crate::line::LineEnding;
use crate::lookup::ScanResponse;

/// Builds the header lines to inject for a successful lookup.
///
/// The order is fixed: whitelist marker if whitelisted, primary book marker
/// if a book was returned, then the book list, always. Book names keep the
/// order the service returned them in.
#[must_use]
pub fn injected_headers(response: &ScanResponse) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if response.whitelisted {
        lines.push(format!("{WHITELISTED}: yes"));
    }
    if !response.book.is_empty() {
        lines.push(format!("{FILTER_BOOK}: {}", response.book));
    }
    lines.push(format!("{FILTER_BOOKS}: {}", response.books.join(",")));
    lines
}

/// Renders the final header block: injected lines first, then the retained
/// lines, each terminated with `line_ending`.
#[must_use]
pub fn assemble(injected: &[String], retained: &[Vec<u8>], line_ending: LineEnding) -> Vec<u8> {
    let eol = line_ending.as_bytes();
    let size = injected
        .iter()
        .map(String::len)
        .chain(retained.iter().map(Vec::len))
        .map(|len| len + eol.len())
        .sum();

    let mut block = Vec::with_capacity(size);
    for line in injected {
        block.extend_from_slice(line.as_bytes());
        block.extend_from_slice(eol);
    }
    for line in retained {
        block.extend_from_slice(line);
        block.extend_from_slice(eol);
    }
    block
}

/// Copies the rest of the input to the output unchanged.
///
/// # Errors
///
/// Returns any read or write error.
pub fn copy_body<R, W>(reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    io::copy(reader, writer)
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

    fn response(whitelisted: bool, book: &str, books: &[&str]) -> ScanResponse {
        ScanResponse {
            success: true,
            message: String::new(),
            whitelisted,
            book: book.to_string(),
            books: books.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_all_markers_in_order() {
        let lines = injected_headers(&response(true, "family", &["family", "work"]));
        assert_eq!(
            lines,
            vec![
                "X-Whitelisted: yes",
                "X-FilterBook: family",
                "X-FilterBooks: family,work",
            ]
        );
    }

    #[test]
    fn test_service_order_is_kept() {
        let lines = injected_headers(&response(false, "zoo", &["zoo", "alpha", "mid"]));
        assert_eq!(lines, vec!["X-FilterBook: zoo", "X-FilterBooks: zoo,alpha,mid"]);
    }

    #[test]
    fn test_book_list_always_present() {
        let lines = injected_headers(&response(false, "", &[]));
        assert_eq!(lines, vec!["X-FilterBooks: "]);
    }

    #[test]
    fn test_assemble_prepends_with_line_ending() {
        let injected = vec!["X-FilterBooks: a".to_string()];
        let retained = vec![b"Subject: hi".to_vec(), Vec::new()];
        assert_eq!(
            assemble(&injected, &retained, LineEnding::CrLf),
            b"X-FilterBooks: a\r\nSubject: hi\r\n\r\n"
        );
        assert_eq!(
            assemble(&[], &retained, LineEnding::Lf),
            b"Subject: hi\n\n"
        );
    }

    #[test]
    fn test_copy_body_is_verbatim() {
        let body = b"line one\r\nline two\nline three\rno newline".to_vec();
        let mut out = Vec::new();
        let copied = copy_body(&mut body.as_slice(), &mut out).unwrap();
        assert_eq!(copied, body.len() as u64);
        assert_eq!(out, body);
    }
}
