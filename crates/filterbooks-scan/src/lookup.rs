//! Address-book lookup contract.

use serde::Deserialize;

use crate::address::Mailbox;
use crate::error::{Error, Result};

/// Reply from the classification service's scan endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScanResponse {
    /// Whether the service handled the request.
    pub success: bool,
    /// Service message, explains a failure.
    #[serde(default)]
    pub message: String,
    /// Whether the sender is whitelisted for the recipient.
    #[serde(default)]
    pub whitelisted: bool,
    /// Primary book the sender belongs to, empty if none.
    #[serde(default, alias = "Book")]
    pub book: String,
    /// Every book containing the sender, in service order.
    #[serde(default, alias = "Books")]
    pub books: Vec<String>,
}

impl ScanResponse {
    /// Turns a `success: false` reply into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LookupRejected`] with the service message if the
    /// reply reports failure.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::LookupRejected(self.message))
        }
    }
}

/// A classification service that can be asked which books hold a sender.
///
/// Implementations perform one blocking request per call, with no retry.
pub trait Lookup {
    /// Looks up `sender` in the address books of `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LookupUnavailable`] on transport or decoding failure.
    fn scan(&self, recipient: &Mailbox, sender: &Mailbox) -> Result<ScanResponse>;
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
    fn test_decode_full_response() {
        let json = r#"{"success":true,"message":"ok","whitelisted":true,"book":"family","books":["family","work"]}"#;
        let response: ScanResponse = serde_json::from_str(json).unwrap();
        assert!(response.success);
        assert!(response.whitelisted);
        assert_eq!(response.book, "family");
        assert_eq!(response.books, vec!["family", "work"]);
    }

    #[test]
    fn test_decode_minimal_response() {
        let response: ScanResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(!response.whitelisted);
        assert!(response.book.is_empty());
        assert!(response.books.is_empty());
    }

    #[test]
    fn test_decode_capitalised_books() {
        let response: ScanResponse =
            serde_json::from_str(r#"{"success":true,"Books":["b","a"]}"#).unwrap();
        assert_eq!(response.books, vec!["b", "a"]);
    }

    #[test]
    fn test_decode_requires_success() {
        assert!(serde_json::from_str::<ScanResponse>(r#"{"books":[]}"#).is_err());
    }

    #[test]
    fn test_into_result_rejected() {
        let response = ScanResponse {
            success: false,
            message: "unknown user".to_string(),
            ..ScanResponse::default()
        };
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::LookupRejected(ref m) if m == "unknown user"));
        assert!(err.is_lookup());
    }

    #[test]
    fn test_into_result_success() {
        let response = ScanResponse {
            success: true,
            ..ScanResponse::default()
        };
        assert!(response.into_result().is_ok());
    }
}
