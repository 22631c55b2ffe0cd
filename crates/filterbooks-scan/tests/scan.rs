//! End-to-end scan tests.
//!
//! These drive whole messages through the scanner with in-memory input and
//! output and a canned lookup service.

#![allow(clippy::unwrap_used)]

use std::cell::Cell;

use proptest::prelude::*;

use filterbooks_scan::{
    Error, Lookup, MAX_LINE_LENGTH, Mailbox, Outcome, ScanConfig, ScanResponse, Scanner,
};

/// Lookup that always returns the same response and counts calls.
struct FixedLookup {
    response: ScanResponse,
    calls: Cell<usize>,
}

impl FixedLookup {
    fn new(whitelisted: bool, book: &str, books: &[&str]) -> Self {
        Self {
            response: ScanResponse {
                success: true,
                message: String::new(),
                whitelisted,
                book: book.to_string(),
                books: books.iter().map(ToString::to_string).collect(),
            },
            calls: Cell::new(0),
        }
    }

    fn rejecting(message: &str) -> Self {
        let mut lookup = Self::new(false, "", &[]);
        lookup.response.success = false;
        lookup.response.message = message.to_string();
        lookup
    }
}

impl Lookup for FixedLookup {
    fn scan(&self, _recipient: &Mailbox, _sender: &Mailbox) -> filterbooks_scan::Result<ScanResponse> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.response.clone())
    }
}

/// Lookup whose transport always fails.
struct Unreachable;

impl Lookup for Unreachable {
    fn scan(&self, _recipient: &Mailbox, _sender: &Mailbox) -> filterbooks_scan::Result<ScanResponse> {
        Err(Error::lookup_unavailable("connection refused"))
    }
}

fn config(sender: &str) -> ScanConfig {
    ScanConfig::new(Some("mail.example.com"), Some("user"), Some(sender)).unwrap()
}

fn run<L: Lookup>(scanner: &Scanner<L>, input: &[u8]) -> (filterbooks_scan::Result<Outcome>, Vec<u8>) {
    let mut out = Vec::new();
    let result = scanner.scan(input, &mut out).map(|report| report.outcome);
    (result, out)
}

#[test]
fn test_end_to_end_annotation() {
    let scanner = Scanner::new(
        config("sender@other.com"),
        FixedLookup::new(true, "family", &["family", "work"]),
    );
    let (result, out) = run(
        &scanner,
        b"To: user@example.com\nFrom: sender@other.com\n\nhello\n",
    );

    assert_eq!(result.unwrap(), Outcome::Annotated);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "X-Whitelisted: yes\n\
         X-FilterBook: family\n\
         X-FilterBooks: family,work\n\
         To: user@example.com\n\
         From: sender@other.com\n\
         \n\
         hello\n"
    );
    assert_eq!(scanner.lookup().calls.get(), 1);
}

#[test]
fn test_rescan_replaces_stale_headers() {
    let scanner = Scanner::new(
        config("sender@other.com"),
        FixedLookup::new(false, "work", &["work"]),
    );
    let (result, out) = run(
        &scanner,
        b"X-Whitelisted: yes\nX-FilterBook: family\nSubject: hi\nX-FilterBooks: family,work\nFrom: sender@other.com\n\nbody\n",
    );

    assert_eq!(result.unwrap(), Outcome::Annotated);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "X-FilterBook: work\nX-FilterBooks: work\nSubject: hi\nFrom: sender@other.com\n\nbody\n"
    );
}

#[test]
fn test_crlf_headers_keep_crlf() {
    let scanner = Scanner::new(
        config("sender@other.com"),
        FixedLookup::new(true, "", &["a"]),
    );
    let (result, out) = run(
        &scanner,
        b"From: sender@other.com\r\nSubject: hi\r\n\r\nbody\nstays\r\n",
    );

    result.unwrap();
    assert_eq!(
        out,
        b"X-Whitelisted: yes\r\nX-FilterBooks: a\r\nFrom: sender@other.com\r\nSubject: hi\r\n\r\nbody\nstays\r\n"
    );
}

#[test]
fn test_mixed_endings_follow_first_line() {
    let scanner = Scanner::new(
        config("sender@other.com"),
        FixedLookup::new(false, "", &[]),
    );
    let (result, out) = run(&scanner, b"Subject: hi\nFrom: sender@other.com\r\n\r\nbody\r\n");

    result.unwrap();
    assert_eq!(
        out,
        b"X-FilterBooks: \nSubject: hi\nFrom: sender@other.com\n\nbody\r\n"
    );
}

#[test]
fn test_control_header_disables_lookup() {
    let scanner = Scanner::new(
        config("sender@other.com"),
        FixedLookup::new(true, "family", &["family"]),
    );
    let (result, out) = run(
        &scanner,
        b"X-Filterctl-Request-Id: anything\nX-FilterBook: stale\nFrom: sender@other.com\n\nbody",
    );

    assert_eq!(result.unwrap(), Outcome::Disabled);
    assert_eq!(scanner.lookup().calls.get(), 0);
    assert_eq!(
        out,
        b"X-Filterctl-Request-Id: anything\nFrom: sender@other.com\n\nbody"
    );
}

#[test]
fn test_long_header_line_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(true, "", &[]));
    let mut input = b"Subject: ".to_vec();
    input.extend(std::iter::repeat_n(b'x', MAX_LINE_LENGTH + 16));
    input.extend_from_slice(b"\n\nbody");

    let (result, out) = run(&scanner, &input);

    assert!(matches!(result, Err(Error::LineTooLong { .. })));
    assert!(out.is_empty());
    assert_eq!(scanner.lookup().calls.get(), 0);
}

#[test]
fn test_truncated_header_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(true, "", &[]));
    let (result, out) = run(&scanner, b"Subject: hi\nFrom: sender@oth");

    assert!(matches!(result, Err(Error::UnexpectedEndOfInput)));
    assert!(out.is_empty());
}

#[test]
fn test_missing_separator_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(true, "", &["a"]));
    let (result, out) = run(&scanner, b"From: sender@other.com\nSubject: cut\n");

    assert!(matches!(result, Err(Error::UnexpectedEndOfInput)));
    assert!(out.is_empty());
    assert_eq!(scanner.lookup().calls.get(), 0);
}

#[test]
fn test_empty_input_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(true, "", &["a"]));
    let (result, out) = run(&scanner, b"");

    assert!(matches!(result, Err(Error::UnexpectedEndOfInput)));
    assert!(out.is_empty());
    assert_eq!(scanner.lookup().calls.get(), 0);
}

#[test]
fn test_missing_from_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(true, "", &["a"]));
    let (result, out) = run(&scanner, b"To: user@example.com\nSubject: hi\n\nbody");

    assert!(matches!(result, Err(Error::AddressParseFailed(_))));
    assert!(out.is_empty());
    assert_eq!(scanner.lookup().calls.get(), 0);
}

#[test]
fn test_rejected_lookup_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::rejecting("no such user"));
    let (result, out) = run(&scanner, b"From: sender@other.com\n\nbody");

    match result {
        Err(Error::LookupRejected(message)) => assert_eq!(message, "no such user"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(out.is_empty());
}

#[test]
fn test_unavailable_lookup_fails_without_output() {
    let scanner = Scanner::new(config("sender@other.com"), Unreachable);
    let (result, out) = run(&scanner, b"From: sender@other.com\n\nbody");

    assert!(matches!(result, Err(Error::LookupUnavailable(_))));
    assert!(out.is_empty());
}

#[test]
fn test_message_id_reported() {
    let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(false, "", &[]));
    let mut out = Vec::new();
    let report = scanner
        .scan(
            &b"Message-ID: <1234@mail.other.com>\nFrom: sender@other.com\n\n"[..],
            &mut out,
        )
        .unwrap();

    assert_eq!(report.message_id.as_deref(), Some("1234@mail.other.com"));
    assert_eq!(report.injected, vec!["X-FilterBooks: "]);
    assert_eq!(report.body_bytes, 0);
}

fn header_line() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => ("[A-Z][a-z]{1,8}", "[ -~]{0,40}").prop_map(|(name, value)| format!("X-Gen-{name}: {value}")),
        1 => Just("X-Whitelisted: yes".to_string()),
        1 => "[a-z]{1,10}".prop_map(|book| format!("X-FilterBook: {book}")),
        1 => "[a-z,]{0,20}".prop_map(|books| format!("x-filterbooks: {books}")),
    ]
}

fn message(eol: &'static str) -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(header_line(), 0..12),
        prop::collection::vec(any::<u8>(), 0..256),
    )
        .prop_map(move |(headers, body)| {
            let mut message = Vec::new();
            for line in headers {
                message.extend_from_slice(line.as_bytes());
                message.extend_from_slice(eol.as_bytes());
            }
            message.extend_from_slice(b"From: sender@other.com");
            message.extend_from_slice(eol.as_bytes());
            message.extend_from_slice(eol.as_bytes());
            message.extend_from_slice(&body);
            message
        })
}

fn count_lines_starting_with(haystack: &[u8], prefix: &str) -> usize {
    haystack
        .split(|&b| b == b'\n')
        .filter(|line| {
            line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        })
        .count()
}

proptest! {
    #[test]
    fn prop_skipped_sender_is_identity(input in prop::collection::vec(any::<u8>(), 0..2048)) {
        let scanner = Scanner::new(config("MAILER-DAEMON@mail.example.com"), Unreachable);
        let (result, out) = run(&scanner, &input);
        prop_assert_eq!(result.unwrap(), Outcome::Skipped);
        prop_assert_eq!(out, input);
    }

    #[test]
    fn prop_rescan_is_idempotent(input in prop_oneof![message("\n"), message("\r\n")]) {
        let scanner = Scanner::new(
            config("sender@other.com"),
            FixedLookup::new(true, "family", &["family", "work"]),
        );
        let (first, once) = run(&scanner, &input);
        first.unwrap();
        let (second, twice) = run(&scanner, &once);
        second.unwrap();

        prop_assert_eq!(&once, &twice);
        let headers = &twice[..headers_len(&twice)];
        prop_assert_eq!(count_lines_starting_with(headers, "X-Whitelisted:"), 1);
        prop_assert_eq!(count_lines_starting_with(headers, "X-FilterBook:"), 1);
        prop_assert_eq!(count_lines_starting_with(headers, "X-FilterBooks:"), 1);
    }

    #[test]
    fn prop_body_bytes_unchanged(
        body in prop::collection::vec(any::<u8>(), 0..1024),
        crlf in any::<bool>(),
    ) {
        let eol: &[u8] = if crlf { b"\r\n" } else { b"\n" };
        let mut input = b"Subject: body test".to_vec();
        input.extend_from_slice(eol);
        input.extend_from_slice(b"From: sender@other.com");
        input.extend_from_slice(eol);
        input.extend_from_slice(eol);
        let header_len = input.len();
        input.extend_from_slice(&body);

        let scanner = Scanner::new(config("sender@other.com"), FixedLookup::new(false, "", &["x"]));
        let (result, out) = run(&scanner, &input);
        result.unwrap();

        prop_assert!(out.ends_with(&body));
        prop_assert_eq!(&out[out.len() - body.len() - header_len..out.len() - body.len()], &input[..header_len]);
    }
}

/// Length of the header block including the blank separator line.
fn headers_len(message: &[u8]) -> usize {
    let mut offset = 0;
    for line in message.split_inclusive(|&b| b == b'\n') {
        offset += line.len();
        if line == b"\n" || line == b"\r\n" {
            break;
        }
    }
    offset
}
