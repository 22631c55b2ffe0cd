//! Error types for lookup client operations.

use std::io;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Client error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error reading certificate or key files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// JSON parsing error.
    #[error("failed decoding response: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<Error> for filterbooks_scan::Error {
    fn from(err: Error) -> Self {
        Self::lookup_unavailable(err)
    }
}
