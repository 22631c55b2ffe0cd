//! Error types for scan operations.

use std::io;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Scan error types.
///
/// Every variant is fatal to the scan. Header problems are detected before
/// the first output byte is written, so a failed scan leaves the output empty
/// unless the failure happened while copying the body.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error while writing output or copying the body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A required setting is absent.
    #[error("missing {0}")]
    ConfigMissing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// No line terminator within the line length limit.
    #[error("header line exceeds {limit} bytes")]
    LineTooLong {
        /// Maximum line length, terminator included.
        limit: usize,
    },

    /// The input ended in the middle of a header line.
    #[error("unexpected end of input inside header line")]
    UnexpectedEndOfInput,

    /// A header line ended with something other than LF, CRLF or CR.
    #[error("unrecognized line ending")]
    UnrecognizedLineEnding,

    /// A `From:` or `To:` header did not contain a valid mailbox address, or
    /// the `From:` header needed for the lookup is absent.
    #[error("failed address parse: {0}")]
    AddressParseFailed(String),

    /// The lookup service could not be reached or its reply not decoded.
    #[error("lookup unavailable: {0}")]
    LookupUnavailable(String),

    /// The lookup service answered with `success: false`.
    #[error("scan request failed: {0}")]
    LookupRejected(String),
}

impl Error {
    /// Creates a lookup-unavailable error from any displayable cause.
    #[must_use]
    pub fn lookup_unavailable(reason: impl std::fmt::Display) -> Self {
        Self::LookupUnavailable(reason.to_string())
    }

    /// Returns true if the error came from the lookup step.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::LookupUnavailable(_) | Self::LookupRejected(_))
    }
}
