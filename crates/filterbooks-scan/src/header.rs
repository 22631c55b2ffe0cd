//! Header line classification.
//!
//! Each header line maps to exactly one [`Disposition`]. The recognized field
//! names are matched case-insensitively on their `name:` prefix; since every
//! prefix ends in `:`, no two can match the same line.

/// Name of the whitelist marker this filter injects.
pub const WHITELISTED: &str = "X-Whitelisted";
/// Name of the primary address-book marker this filter injects.
pub const FILTER_BOOK: &str = "X-FilterBook";
/// Name of the full address-book list marker this filter injects.
pub const FILTER_BOOKS: &str = "X-FilterBooks";
/// Name of the control header that disables annotation.
pub const FILTERCTL_REQUEST_ID: &str = "X-Filterctl-Request-Id";

/// Structured fields extracted from retained header lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `Message-Id:`
    MessageId,
    /// `To:`
    To,
    /// `From:`
    From,
}

/// Flags set by retained header lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// The control marker: skip lookup and injection.
    DisableProcessing,
}

/// What to do with one header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Re-emit the line unchanged.
    Retain,
    /// Drop the line; it is a stale injected header.
    Drop,
    /// Extract a field, then re-emit the line unchanged.
    ExtractAndRetain(Field),
    /// Set a flag, then re-emit the line unchanged.
    SetFlagAndRetain(Flag),
}

impl Disposition {
    /// Returns true if the line is re-emitted.
    #[must_use]
    pub const fn retains(self) -> bool {
        !matches!(self, Self::Drop)
    }
}

const RULES: [(&str, Disposition); 7] = [
    (WHITELISTED, Disposition::Drop),
    (FILTER_BOOK, Disposition::Drop),
    (FILTER_BOOKS, Disposition::Drop),
    ("Message-Id", Disposition::ExtractAndRetain(Field::MessageId)),
    ("To", Disposition::ExtractAndRetain(Field::To)),
    (
        FILTERCTL_REQUEST_ID,
        Disposition::SetFlagAndRetain(Flag::DisableProcessing),
    ),
    ("From", Disposition::ExtractAndRetain(Field::From)),
];

/// Classifies a header line with its terminator already stripped.
#[must_use]
pub fn classify(line: &[u8]) -> Disposition {
    RULES
        .iter()
        .find(|(name, _)| has_field_name(line, name))
        .map_or(Disposition::Retain, |&(_, disposition)| disposition)
}

/// Returns true if `line` starts with `name:`, ignoring ASCII case.
#[must_use]
pub fn has_field_name(line: &[u8], name: &str) -> bool {
    let name = name.as_bytes();
    line.len() > name.len()
        && line[..name.len()].eq_ignore_ascii_case(name)
        && line[name.len()] == b':'
}

/// Returns true if the line separates the header block from the body.
#[must_use]
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
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
    fn test_stale_injected_headers_dropped() {
        assert_eq!(classify(b"X-Whitelisted: yes"), Disposition::Drop);
        assert_eq!(classify(b"x-filterbook: family"), Disposition::Drop);
        assert_eq!(classify(b"X-FILTERBOOKS: family,work"), Disposition::Drop);
        assert_eq!(classify(b"X-FilterBooks:"), Disposition::Drop);
    }

    #[test]
    fn test_extracted_fields() {
        assert_eq!(
            classify(b"Message-ID: <abc@host>"),
            Disposition::ExtractAndRetain(Field::MessageId)
        );
        assert_eq!(
            classify(b"to: user@example.com"),
            Disposition::ExtractAndRetain(Field::To)
        );
        assert_eq!(
            classify(b"FROM: sender@example.com"),
            Disposition::ExtractAndRetain(Field::From)
        );
    }

    #[test]
    fn test_control_marker() {
        assert_eq!(
            classify(b"X-Filterctl-Request-Id: 42"),
            Disposition::SetFlagAndRetain(Flag::DisableProcessing)
        );
    }

    #[test]
    fn test_generic_headers_retained() {
        assert_eq!(classify(b"Subject: hello"), Disposition::Retain);
        assert_eq!(classify(b"Reply-To: a@example.com"), Disposition::Retain);
        assert_eq!(classify(b"Tox: nope"), Disposition::Retain);
        assert_eq!(classify(b"X-FilterBookish: nope"), Disposition::Retain);
        assert_eq!(classify(b" continuation from: here"), Disposition::Retain);
    }

    #[test]
    fn test_name_requires_colon() {
        assert!(has_field_name(b"To: x", "to"));
        assert!(!has_field_name(b"To", "to"));
        assert!(!has_field_name(b"To x", "to"));
        assert!(!has_field_name(b"", "to"));
    }

    #[test]
    fn test_retains() {
        assert!(Disposition::Retain.retains());
        assert!(Disposition::ExtractAndRetain(Field::To).retains());
        assert!(Disposition::SetFlagAndRetain(Flag::DisableProcessing).retains());
        assert!(!Disposition::Drop.retains());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(b""));
        assert!(is_blank(b"  \t"));
        assert!(!is_blank(b" x"));
    }
}
